// src/exec/executor_loop.rs

//! Main executor loop that manages running task bodies.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::actions::ActionContext;
use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::exec::task_runner::run_task;

/// Internal handle for a currently-running task body.
///
/// - `cancel` asks the runner to drop the body (used when a short task is
///   scheduled again while its previous instance is still running).
/// - `handle` is the Tokio task running the body.
struct ActiveTask {
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// Each scheduled task runs in its own Tokio task, and **per task name there
/// is never more than one instance running at the same time**:
///
/// - If a task is already running and `rerun = true`, the previous instance
///   is cancelled before a new one starts.
/// - If a long-lived task is already running, the request is answered with a
///   synthesized progress event: the live service satisfies the new run.
pub fn spawn_executor(ctx: ActionContext) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        // At most one ActiveTask per task name.
        let mut active: HashMap<String, ActiveTask> = HashMap::new();

        while let Some(task) = rx.recv().await {
            handle_scheduled_task(task, &mut active, &ctx).await;
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

async fn handle_scheduled_task(
    task: ScheduledTask,
    active: &mut HashMap<String, ActiveTask>,
    ctx: &ActionContext,
) {
    let name = task.name.clone();

    // Forget instances that already finished (short tasks, stopped services).
    active.retain(|_, entry| !entry.handle.is_finished());

    if let Some(existing) = active.get_mut(&name) {
        if task.rerun {
            cancel_existing_task(&task, existing);
        } else if task.long_lived {
            // The live service already satisfies this run.
            debug!(
                task = %name,
                run_id = task.run_id,
                "service already running; synthesizing progress event"
            );
            if ctx
                .runtime_tx()
                .send(RuntimeEvent::TaskProgressed { task: name.clone() })
                .await
                .is_err()
            {
                debug!(task = %name, "runtime closed before progress could be reported");
            }
            return;
        } else {
            warn!(
                task = %name,
                run_id = task.run_id,
                "task still running and may not be restarted; ignoring request"
            );
            return;
        }
    }

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let task_ctx = ctx.clone();
    let spawn_name = name.clone();

    let handle = tokio::spawn(async move {
        run_task(task, task_ctx, cancel_rx).await;
        debug!(task = %spawn_name, "task runner future finished");
    });

    active.insert(
        name,
        ActiveTask {
            cancel: Some(cancel_tx),
            handle,
        },
    );
}

fn cancel_existing_task(task: &ScheduledTask, existing: &mut ActiveTask) {
    info!(
        task = %task.name,
        run_id = task.run_id,
        "rerun requested; cancelling previous instance"
    );

    if let Some(cancel) = existing.cancel.take() {
        if cancel.send(()).is_err() {
            debug!(
                task = %task.name,
                run_id = task.run_id,
                "previous instance already finished while cancelling"
            );
        }
    }
}
