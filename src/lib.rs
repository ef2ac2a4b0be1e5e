// src/lib.rs

pub mod actions;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod less;
pub mod logging;
pub mod serve;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actions::ActionContext;
use crate::cli::CliArgs;
use crate::config::load_or_builtin;
use crate::config::model::ConfigFile;
use crate::dag::{DagGraph, Scheduler};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use crate::errors::StylepipeError;
use crate::exec::RealExecutorBackend;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file or built-in pipeline)
/// - project root resolution
/// - scheduler / queue / runtime
/// - executor with the shared action context
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let search_dir = args.root.clone().unwrap_or_else(|| cwd.clone());

    let (cfg, config_path) = load_or_builtin(args.config.as_deref(), &search_dir)?;
    let root = project_root(args.root.as_deref(), config_path.as_deref(), &cwd)?;
    debug!(root = %root.display(), "project root resolved");

    let requested = args.requested_tasks();
    check_requested(&cfg, &requested)?;

    if args.list {
        print_task_list(&cfg, &requested);
        return Ok(());
    }

    let scheduler = Scheduler::from_config(&cfg);
    let behaviour = cfg.config_section().triggered_while_running_behaviour;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let ctx = ActionContext::with_real_fs(root, rt_tx.clone());
    let executor = RealExecutorBackend::new(ctx);

    // Ctrl-C -> graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    info!(tasks = ?requested, "requested tasks");
    for task in requested {
        rt_tx
            .send(RuntimeEvent::TaskTriggered {
                task,
                reason: TriggerReason::Requested,
            })
            .await?;
    }
    // Watchers and services hold their own senders.
    drop(rt_tx);

    let options = RuntimeOptions {
        exit_when_idle: true,
    };

    let core = CoreRuntime::new(scheduler, behaviour, options);
    let summary = Runtime::new(core, rt_rx, executor).run().await?;

    if summary.interrupted {
        info!(failed = ?summary.failed, "session interrupted");
        return Ok(());
    }
    if !summary.is_success() {
        bail!("task(s) failed: {}", summary.failed.join(", "));
    }
    Ok(())
}

/// Figure out the project root all task paths are relative to.
///
/// - `--root` wins.
/// - Otherwise the directory of the loaded config file; a bare file name
///   like `Stylepipe.toml` (parent = "") means the current directory.
/// - Without a config file, the current directory.
fn project_root(explicit: Option<&Path>, config_path: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    let root = match (explicit, config_path.and_then(Path::parent)) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(parent)) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => cwd.to_path_buf(),
    };
    root.canonicalize()
        .with_context(|| format!("project root {} is not accessible", root.display()))
}

fn check_requested(cfg: &ConfigFile, requested: &[String]) -> Result<(), StylepipeError> {
    match requested.iter().find(|name| cfg.task(name).is_none()) {
        Some(unknown) => Err(StylepipeError::TaskNotFound(unknown.clone())),
        None => Ok(()),
    }
}

/// `--list` output: every task with its action and prerequisites, then the
/// order the requested tasks would start in.
fn print_task_list(cfg: &ConfigFile, requested: &[String]) {
    println!("tasks ({}):", cfg.tasks().len());
    for (name, task) in cfg.tasks() {
        if task.after.is_empty() {
            println!("  - {name} [{}]", task.action.kind());
        } else {
            println!(
                "  - {name} [{}] after: {}",
                task.action.kind(),
                task.after.join(", ")
            );
        }
    }

    let plan = DagGraph::from_config(cfg).execution_plan(requested);
    println!();
    println!("plan for {}: {}", requested.join(", "), plan.join(" -> "));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_requested_task_is_rejected() {
        let cfg = ConfigFile::builtin();
        let err = check_requested(&cfg, &["build".into(), "deploy".into()]).unwrap_err();
        assert!(matches!(err, StylepipeError::TaskNotFound(name) if name == "deploy"));
        assert!(check_requested(&cfg, &["watch".into()]).is_ok());
    }

    #[test]
    fn root_prefers_flag_then_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("site");
        std::fs::create_dir(&nested).unwrap();
        let config = nested.join("Stylepipe.toml");

        let root = project_root(Some(dir.path()), Some(&config), Path::new("/")).unwrap();
        assert_eq!(root, dir.path().canonicalize().unwrap());

        let root = project_root(None, Some(&config), Path::new("/")).unwrap();
        assert_eq!(root, nested.canonicalize().unwrap());

        let root = project_root(None, Some(Path::new("Stylepipe.toml")), dir.path()).unwrap();
        assert_eq!(root, dir.path().canonicalize().unwrap());
    }
}
