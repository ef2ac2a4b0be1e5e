// src/dag/state_manager.rs

//! Per-run state management for tasks in the scheduler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::DagGraph;
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::engine::TaskName;

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            tasks,
            current_run_id,
        }
    }

    /// Include a requested task and all its transitive prerequisites in this
    /// run.
    ///
    /// - Tasks not yet part of the run are marked `Pending`.
    /// - Tasks already participating keep their current state.
    /// - Long-lived services that are still alive are left out of the run;
    ///   they count as satisfied prerequisites.
    pub fn mark_task_and_prerequisites_pending(&mut self, target: &str) {
        let mut stack: Vec<TaskName> = vec![target.to_string()];
        let mut visited: HashSet<TaskName> = HashSet::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }

            let Some(info) = self.tasks.get_mut(&name) else {
                warn!(task = %name, "node in DAG not present in tasks map");
                continue;
            };

            if info.service_alive && info.run_state.is_none() {
                debug!(task = %info.name, "long-lived task already alive; not re-running");
                continue;
            }

            if info.run_state.is_none() {
                info.run_state = Some(RunState::Pending);
                debug!(task = %info.name, "marked Pending for this run");
            }

            stack.extend(self.graph.dependencies_of(&name).iter().cloned());
        }
    }

    /// Whether all prerequisites of the given task are satisfied for the
    /// current run.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        ReadOnlyStateManager::new(self.tasks).deps_satisfied_for_info(info)
    }

    /// Mark all dependents participating in this run (transitively) of a
    /// failed task as `DoneFailed`.
    ///
    /// Returns the tasks newly marked as failed, excluding the root task.
    pub fn mark_dependents_failed(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self
            .graph
            .dependents_of(failed_task)
            .iter()
            .cloned()
            .collect();

        let mut newly_failed = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(info) = self.tasks.get_mut(&name) {
                match info.run_state {
                    Some(RunState::Pending) | Some(RunState::Running) => {
                        info.run_state = Some(RunState::DoneFailed);
                        info.last_failed_run = self.current_run_id;
                        warn!(
                            task = %info.name,
                            upstream = %failed_task,
                            "aborting task because a prerequisite failed"
                        );
                        newly_failed.push(info.name.clone());
                        stack.extend(self.graph.dependents_of(&name).iter().cloned());
                    }
                    Some(RunState::DoneSuccess) | Some(RunState::DoneFailed) | None => {
                        // Already terminal or not participating in this run.
                    }
                }
            }
        }

        newly_failed
    }

    /// Collect tasks that are `Pending` and whose prerequisites are
    /// satisfied, mark them `Running`, and return them as `ScheduledTask`s.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let mut ready = Vec::new();

        let mut candidates: Vec<TaskName> = self
            .tasks
            .values()
            .filter(|info| {
                matches!(info.run_state, Some(RunState::Pending))
                    && self.deps_satisfied_for_info(info)
            })
            .map(|info| info.name.clone())
            .collect();
        candidates.sort();

        let run_id = self.current_run_id.unwrap_or(0);
        for name in candidates {
            let Some(info) = self.tasks.get_mut(&name) else {
                continue;
            };
            let rerun = info.last_successful_run.is_some() || info.last_failed_run.is_some();
            info!(task = %info.name, run_id, rerun, long_lived = info.long_lived, "starting task");

            info.run_state = Some(RunState::Running);
            ready.push(ScheduledTask::from_task_info(info, run_id));
        }

        ready
    }

    /// Check if all tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        !self.tasks.values().any(|info| {
            matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        })
    }
}

/// Read-only view over the tasks map for prerequisite checks.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// A prerequisite is satisfied when it succeeded in this run, or when it
    /// is a live long-lived service that was left out of the run.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep_name| {
            let Some(dep) = self.tasks.get(dep_name) else {
                warn!(
                    task = %info.name,
                    dep = %dep_name,
                    "dependency missing from tasks map"
                );
                return false;
            };

            match dep.run_state {
                Some(RunState::DoneSuccess) => true,
                Some(RunState::DoneFailed) | Some(RunState::Pending) | Some(RunState::Running) => {
                    false
                }
                None => dep.service_alive,
            }
        })
    }
}
