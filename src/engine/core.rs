// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and produces an updated state plus a
//! list of commands describing what the IO shell should do next. It has no
//! channels, no Tokio types and performs no IO, so it can be unit tested
//! step by step.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    CoreStep, handle_task_completion, handle_task_progress, handle_task_trigger,
};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RunSummary, RuntimeEvent, RuntimeOptions};
use crate::types::TriggerWhileRunningBehaviour;

/// Pure core runtime state: scheduler, trigger queue, options, and the
/// running failure summary.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    options: RuntimeOptions,
    summary: RunSummary,
}

impl CoreRuntime {
    pub fn new(
        scheduler: Scheduler,
        behaviour: TriggerWhileRunningBehaviour,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            scheduler,
            queue: TriggerQueue::new(behaviour),
            options,
            summary: RunSummary::default(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn into_summary(self) -> RunSummary {
        self.summary
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        let step = match event {
            RuntimeEvent::TaskTriggered { task, reason } => handle_task_trigger(
                &mut self.scheduler,
                &mut self.queue,
                &self.options,
                task,
                reason,
            ),
            RuntimeEvent::TaskProgressed { task } => {
                handle_task_progress(&mut self.scheduler, &mut self.queue, task)
            }
            RuntimeEvent::TaskCompleted { task, outcome } => handle_task_completion(
                &mut self.scheduler,
                &mut self.queue,
                &self.options,
                task,
                outcome,
            ),
            RuntimeEvent::ShutdownRequested => {
                self.summary.interrupted = true;
                CoreStep {
                    commands: Vec::new(),
                    newly_failed: Vec::new(),
                    keep_running: false,
                }
            }
        };

        self.summary.failed.extend(step.newly_failed.iter().cloned());
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::engine::{CoreCommand, TaskOutcome, TriggerReason};

    fn core() -> CoreRuntime {
        CoreRuntime::new(
            Scheduler::from_config(&ConfigFile::builtin()),
            TriggerWhileRunningBehaviour::Queue,
            RuntimeOptions::default(),
        )
    }

    fn dispatched(step: &CoreStep) -> Vec<String> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchTasks(tasks) => Some(tasks.iter().map(|t| t.name.clone())),
                CoreCommand::RequestExit => None,
            })
            .flatten()
            .collect()
    }

    fn trigger(task: &str, reason: TriggerReason) -> RuntimeEvent {
        RuntimeEvent::TaskTriggered {
            task: task.to_string(),
            reason,
        }
    }

    fn completed(task: &str) -> RuntimeEvent {
        RuntimeEvent::TaskCompleted {
            task: task.to_string(),
            outcome: TaskOutcome::Success,
        }
    }

    #[test]
    fn build_session_exits_when_idle() {
        let mut core = core();
        let step = core.step(trigger("build", TriggerReason::Requested));
        assert_eq!(dispatched(&step), vec!["minify-css", "move-html"]);

        assert!(core.step(completed("minify-css")).keep_running);
        let step = core.step(completed("move-html"));
        assert_eq!(dispatched(&step), vec!["build"]);

        let step = core.step(completed("build"));
        assert!(!step.keep_running);
        assert!(core.summary().is_success());
    }

    #[test]
    fn watch_session_stays_alive_and_queues_retriggers() {
        let mut core = core();
        core.step(trigger("watch", TriggerReason::Requested));
        core.step(RuntimeEvent::TaskProgressed {
            task: "browser-sync".into(),
        });
        let step = core.step(completed("less"));
        assert_eq!(dispatched(&step), vec!["watch"]);
        let step = core.step(RuntimeEvent::TaskProgressed {
            task: "watch".into(),
        });
        assert!(step.keep_running);
        assert!(core.is_idle());

        // Stylesheet saved: recompile.
        let step = core.step(trigger("less", TriggerReason::FileWatch));
        assert_eq!(dispatched(&step), vec!["less"]);

        // Saved twice more while compiling: queued once, run once afterwards.
        for _ in 0..2 {
            let step = core.step(trigger("less", TriggerReason::FileWatch));
            assert!(dispatched(&step).is_empty());
        }
        assert!(!core.queue_is_empty());

        let step = core.step(completed("less"));
        assert_eq!(dispatched(&step), vec!["less"]);
        assert!(step.keep_running);
        assert!(core.queue_is_empty());

        let step = core.step(completed("less"));
        assert!(dispatched(&step).is_empty());
        assert!(core.is_idle());
    }

    #[test]
    fn failures_are_collected_in_summary() {
        let mut core = core();
        core.step(trigger("build", TriggerReason::Requested));
        core.step(RuntimeEvent::TaskCompleted {
            task: "minify-css".into(),
            outcome: TaskOutcome::Failed("no such file".into()),
        });
        let step = core.step(completed("move-html"));
        assert!(!step.keep_running);
        assert_eq!(core.summary().failed, vec!["minify-css", "build"]);
    }
}
