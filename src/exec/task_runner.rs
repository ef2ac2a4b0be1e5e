// src/exec/task_runner.rs

//! Runs one task body and reports its outcome.

use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::actions::{ActionContext, run_action};
use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};

/// Run the action of `task` and send `TaskCompleted` with its outcome.
///
/// If the cancel channel fires first, the action future is dropped and
/// **no** `TaskCompleted` event is sent for that instance, so completions of
/// superseded instances never reach the scheduler.
pub async fn run_task(task: ScheduledTask, ctx: ActionContext, mut cancel_rx: oneshot::Receiver<()>) {
    info!(
        task = %task.name,
        run_id = task.run_id,
        kind = task.action.kind(),
        "starting task"
    );

    // Cancellation wins when both are ready.
    let outcome = tokio::select! {
        biased;

        cancel = &mut cancel_rx => {
            match cancel {
                Ok(()) => info!(
                    task = %task.name,
                    run_id = task.run_id,
                    "cancellation requested; dropping running instance"
                ),
                Err(_) => debug!(
                    task = %task.name,
                    run_id = task.run_id,
                    "executor went away; dropping running instance"
                ),
            }
            return;
        }
        result = run_action(&ctx, &task) => match result {
            Ok(()) => {
                info!(task = %task.name, run_id = task.run_id, "task finished");
                TaskOutcome::Success
            }
            Err(err) => {
                let message = format!("{err:#}");
                error!(task = %task.name, run_id = task.run_id, error = %message, "task failed");
                TaskOutcome::Failed(message)
            }
        },
    };

    if ctx
        .runtime_tx()
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            outcome,
        })
        .await
        .is_err()
    {
        debug!(task = %task.name, "runtime closed before completion could be reported");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use crate::config::TaskAction;
    use crate::fs::mock::MockFileSystem;

    fn scheduled(name: &str, action: TaskAction) -> ScheduledTask {
        ScheduledTask {
            name: name.to_string(),
            action,
            long_lived: false,
            rerun: true,
            run_id: 1,
        }
    }

    #[tokio::test]
    async fn failure_is_reported_with_error_chain() {
        let (tx, mut rx) = mpsc::channel(4);
        let ctx = ActionContext::new("", Arc::new(MockFileSystem::new()), tx);
        let (_cancel_tx, cancel_rx) = oneshot::channel();

        let task = scheduled(
            "minify-css",
            TaskAction::MinifyCss {
                src: "app/css/style.css".into(),
                dest: "dist/css".into(),
            },
        );
        run_task(task, ctx, cancel_rx).await;

        match rx.recv().await {
            Some(RuntimeEvent::TaskCompleted {
                task,
                outcome: TaskOutcome::Failed(message),
            }) => {
                assert_eq!(task, "minify-css");
                assert!(message.contains("app/css/style.css"), "{message}");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_instance_sends_nothing() {
        let (tx, mut rx) = mpsc::channel(4);
        let ctx = ActionContext::new("", Arc::new(MockFileSystem::new()), tx);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        cancel_tx.send(()).unwrap();

        let mut task = scheduled("watch", TaskAction::Watch { rules: Vec::new() });
        task.long_lived = true;
        run_task(task, ctx, cancel_rx).await;

        assert!(rx.try_recv().is_err());
    }
}
