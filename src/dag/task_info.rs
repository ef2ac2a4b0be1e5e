// src/dag/task_info.rs

//! Task metadata and per-run state management.

use crate::config::model::{TaskAction, TaskConfig};
use crate::engine::TaskName;

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Task was requested for this run but is waiting on prerequisites.
    Pending,
    /// Task has been dispatched to the executor and is currently running.
    Running,
    /// Task finished successfully for this run (or, for long-lived tasks,
    /// reported progress).
    DoneSuccess,
    /// Task failed in this run (or was blocked by a failed prerequisite).
    DoneFailed,
}

/// Public, read-only view of a task's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task is not currently participating in this run.
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneFailed,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::DoneSuccess) => TaskRunState::DoneSuccess,
            Some(RunState::DoneFailed) => TaskRunState::DoneFailed,
        }
    }
}

/// Static task information derived from config, plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    pub action: TaskAction,
    pub long_lived: bool,
    /// Direct prerequisites for this task (names in `after = [...]`).
    pub deps: Vec<TaskName>,

    /// Per-run state (None if not participating in the current run).
    pub run_state: Option<RunState>,

    /// Last run ID in which this task succeeded.
    pub last_successful_run: Option<u64>,

    /// Last run ID in which this task failed.
    pub last_failed_run: Option<u64>,

    /// Long-lived task that reported progress and has not exited since.
    pub service_alive: bool,
}

impl TaskInfo {
    pub fn from_config(name: TaskName, cfg: &TaskConfig, deps: Vec<TaskName>) -> Self {
        Self {
            name,
            long_lived: cfg.action.is_long_lived(),
            action: cfg.action.clone(),
            deps,
            run_state: None,
            last_successful_run: None,
            last_failed_run: None,
            service_alive: false,
        }
    }
}

/// Description of a task that the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub action: TaskAction,
    pub long_lived: bool,
    /// Whether a still-running previous instance should be cancelled and
    /// replaced. Long-lived services are never restarted.
    pub rerun: bool,
    /// Monotonically increasing run identifier shared by all tasks of a run.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64) -> Self {
        Self {
            name: info.name.clone(),
            action: info.action.clone(),
            long_lived: info.long_lived,
            rerun: !info.long_lived,
            run_id,
        }
    }
}
