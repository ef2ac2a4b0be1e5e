// src/actions/mod.rs

//! Task bodies.
//!
//! Every [`TaskAction`] variant maps to one async function here. Actions get
//! an [`ActionContext`] holding the project root, the filesystem, the
//! development server session (shared by `serve` and `reload`) and the
//! runtime channel (used by long-lived actions to report progress and by the
//! watcher to send triggers).

pub mod pipeline;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::TaskAction;
use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::fs::{FileSystem, RealFileSystem};
use crate::serve::ServerSession;

pub use pipeline::{compile_less, copy_files, minify_css, minify_stylesheet};
pub use services::{reload, serve, watch};

/// Shared state handed to every action.
#[derive(Debug, Clone)]
pub struct ActionContext {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    session: Arc<RwLock<Option<ServerSession>>>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl ActionContext {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            root: root.into(),
            fs,
            session: Arc::new(RwLock::new(None)),
            runtime_tx,
        }
    }

    /// Context backed by the real filesystem.
    pub fn with_real_fs(root: impl Into<PathBuf>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self::new(root, Arc::new(RealFileSystem), runtime_tx)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn runtime_tx(&self) -> &mpsc::Sender<RuntimeEvent> {
        &self.runtime_tx
    }

    /// Path relative to the project root.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// The active development server session, if `serve` is running.
    pub fn session(&self) -> Option<ServerSession> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn set_session(&self, session: Option<ServerSession>) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = session;
    }
}

/// Run the body of `task` to completion.
///
/// Long-lived actions (`serve`, `watch`) report progress through the runtime
/// channel once they are up and only return when their service ends.
pub async fn run_action(ctx: &ActionContext, task: &ScheduledTask) -> Result<()> {
    match &task.action {
        TaskAction::CompileLess { src, dest } => {
            compile_less(ctx, src, dest).await?;
        }
        TaskAction::Serve {
            base_dir,
            browsers,
            port,
            host,
        } => serve(ctx, &task.name, base_dir, browsers, host, *port).await?,
        TaskAction::Reload => {
            reload(ctx);
        }
        TaskAction::Watch { rules } => watch(ctx, &task.name, rules).await?,
        TaskAction::Copy { src, dest } => {
            copy_files(ctx, src, dest).await?;
        }
        TaskAction::MinifyCss { src, dest } => {
            minify_css(ctx, src, dest).await?;
        }
        TaskAction::Notice { message } => notice(&task.name, message),
    }
    Ok(())
}

/// Print a user-facing message. Stdout is reserved for output like this.
pub fn notice(task: &str, message: &str) {
    info!(task = %task, "{message}");
    println!("{message}");
}
