// src/engine/mod.rs

//! Orchestration engine for stylepipe.
//!
//! This module ties together:
//! - the DAG scheduler
//! - the trigger queue (what happens when watch triggers arrive while a run
//!   is active)
//! - the main runtime event loop that reacts to:
//!   - requested tasks and file-watch triggers
//!   - long-lived progress events
//!   - task completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task body for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// The task failed; the string is the rendered error chain.
    Failed(String),
}

/// Why a task was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Requested on the command line.
    Requested,
    /// Triggered by a watch rule.
    FileWatch,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Exit once the DAG is idle, nothing is queued and no long-lived
    /// service is alive.
    pub exit_when_idle: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            exit_when_idle: true,
        }
    }
}

/// Events flowing into the runtime from the CLI, watchers and the executor.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task should be run (together with its prerequisites).
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    /// A long-lived task is up and satisfies its dependents.
    TaskProgressed { task: TaskName },
    /// A task body finished with a concrete outcome.
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// What happened over the lifetime of a runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tasks that failed (or were aborted by a failed prerequisite), in the
    /// order they were reported.
    pub failed: Vec<TaskName>,
    /// Whether the runtime stopped because of a shutdown request.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use crate::types::TriggerWhileRunningBehaviour;
pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::TriggerQueue;
pub use runtime::Runtime;
