// src/actions/services.rs

//! Long-lived and side-effecting actions: the development server, reload
//! broadcasts and the file watcher.

use anyhow::{Context, Result, anyhow};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::actions::ActionContext;
use crate::config::WatchRule;
use crate::engine::RuntimeEvent;
use crate::serve::{launch_browsers, start_server};
use crate::watch::{build_watch_profiles, spawn_watcher};

/// Aborts the server task when the serve action is dropped (cancelled).
struct ServerTask(JoinHandle<Result<()>>);

impl Drop for ServerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn report_progress(ctx: &ActionContext, task: &str) -> Result<()> {
    ctx.runtime_tx()
        .send(RuntimeEvent::TaskProgressed {
            task: task.to_string(),
        })
        .await
        .with_context(|| format!("runtime stopped before '{task}' came up"))
}

/// Start the development server, publish its session, report progress and
/// open the configured browsers. Runs until the server stops.
pub async fn serve(
    ctx: &ActionContext,
    task: &str,
    base_dir: &str,
    browsers: &[String],
    host: &str,
    port: u16,
) -> Result<()> {
    let running = start_server(ctx.resolve(base_dir), host, port).await?;
    let session = running.session;
    let mut server = ServerTask(running.handle);

    ctx.set_session(Some(session.clone()));
    report_progress(ctx, task).await?;

    info!(task = %task, url = %session.url(), "development server ready");
    launch_browsers(browsers, &session.url());

    let result = (&mut server.0).await;
    ctx.set_session(None);

    match result {
        Ok(served) => served,
        Err(join) if join.is_cancelled() => Ok(()),
        Err(join) => Err(anyhow!("development server task failed: {join}")),
    }
}

/// Ask connected browsers to reload. Without a running server this is a
/// successful no-op. Returns how many clients were notified.
pub fn reload(ctx: &ActionContext) -> usize {
    match ctx.session() {
        Some(session) => {
            let clients = session.reload();
            info!(clients, "reload broadcast");
            clients
        }
        None => {
            debug!("no development server running; reload skipped");
            0
        }
    }
}

/// Register watch rules and keep triggering their tasks until the runtime
/// goes away.
pub async fn watch(ctx: &ActionContext, task: &str, rules: &[WatchRule]) -> Result<()> {
    let profiles = build_watch_profiles(rules)?;
    let handle = spawn_watcher(ctx.root().to_path_buf(), profiles, ctx.runtime_tx().clone())?;

    debug!(task = %task, roots = ?handle.roots(), "watch rules registered");
    report_progress(ctx, task).await?;

    handle.closed().await;
    Ok(())
}
