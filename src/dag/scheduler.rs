use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::model::ConfigFile;
use crate::dag::graph::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which tasks are part of the current run
/// - pulling the prerequisites of a requested task into the run
/// - deciding when a task is ready (prerequisites satisfied)
/// - marking tasks as succeeded/failed/progressed
/// - failing dependents when a task fails
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: HashMap<TaskName, TaskInfo>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    /// Construct a scheduler from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let graph = DagGraph::from_config(cfg);

        let tasks = cfg
            .tasks()
            .iter()
            .map(|(name, tc)| {
                let deps = graph.dependencies_of(name).to_vec();
                (name.clone(), TaskInfo::from_config(name.clone(), tc, deps))
            })
            .collect();

        Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// Whether the given task is a long-lived service that is still alive.
    pub fn is_service_alive(&self, task: &str) -> bool {
        self.tasks.get(task).is_some_and(|info| info.service_alive)
    }

    /// Whether any long-lived service is alive.
    pub fn any_service_alive(&self) -> bool {
        self.tasks.values().any(|info| info.service_alive)
    }

    /// Start a new run, resetting per-run state but keeping history and
    /// service liveness.
    pub fn start_new_run(&mut self) {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.tasks.values_mut() {
            info.run_state = None;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new run");
    }

    /// Request a task (and its prerequisites) in the current run.
    pub fn handle_trigger(&mut self, task: &str) -> Vec<ScheduledTask> {
        self.trigger_step_internal(task).newly_scheduled
    }

    /// Handle "progress" from a long-lived task.
    pub fn handle_progress(&mut self, task: &str) -> Vec<ScheduledTask> {
        self.progress_step_internal(task).newly_scheduled
    }

    /// Handle completion of a task with a concrete outcome.
    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome) -> Vec<ScheduledTask> {
        self.completion_step_internal(task, outcome).newly_scheduled
    }

    /// Like `handle_progress`, also reporting whether the run finished.
    pub fn step_progress(&mut self, task: &str) -> SchedulerStep {
        self.progress_step_internal(task)
    }

    /// Like `handle_completion`, also reporting dependents aborted by a
    /// failure and whether the run finished.
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        self.completion_step_internal(task, outcome)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.graph.tasks()
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Clear `current_run_id` if every task is terminal.
    ///
    /// Returns `true` if this call transitioned the scheduler to idle.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);

        if manager.all_tasks_terminal() {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; run finished"
            );
            self.current_run_id = None;
            true
        } else {
            false
        }
    }

    fn trigger_step_internal(&mut self, task: &str) -> SchedulerStep {
        if !self.tasks.contains_key(task) {
            warn!(task = %task, "trigger for unknown task; ignoring");
            return SchedulerStep::default();
        }

        if self.current_run_id.is_none() {
            debug!(task = %task, "trigger with no active run; starting a new run");
            self.start_new_run();
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        manager.mark_task_and_prerequisites_pending(task);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished,
        }
    }

    fn progress_step_internal(&mut self, task: &str) -> SchedulerStep {
        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "progress from unknown task; ignoring");
            return SchedulerStep::default();
        };

        if info.long_lived {
            info.service_alive = true;
        }

        let Some(run_id) = self.current_run_id else {
            debug!(task = %task, "progress with no active run; recorded liveness only");
            return SchedulerStep::default();
        };

        if info.run_state == Some(RunState::Running) {
            debug!(
                task = %info.name,
                run_id,
                "task reported progress; marking DoneSuccess for this run"
            );
            info.run_state = Some(RunState::DoneSuccess);
            info.last_successful_run = Some(run_id);
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished,
        }
    }

    fn completion_step_internal(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "completion for unknown task; ignoring");
            return SchedulerStep::default();
        };

        if info.service_alive {
            info!(task = %info.name, "long-lived task exited");
            info.service_alive = false;
        }

        let Some(run_id) = self.current_run_id else {
            debug!(task = %task, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        if info.run_state != Some(RunState::Running) {
            // A service from an earlier run, or a task already failed by an
            // upstream abort.
            debug!(task = %task, run_id, "completion for task not running in this run");
            let run_just_finished = self.maybe_finish_run();
            return SchedulerStep {
                run_just_finished,
                ..SchedulerStep::default()
            };
        }

        let mut newly_scheduled = Vec::new();
        let mut newly_failed = Vec::new();

        match outcome {
            TaskOutcome::Success => {
                info.run_state = Some(RunState::DoneSuccess);
                info.last_successful_run = Some(run_id);
                debug!(task = %info.name, run_id, "task completed successfully");
                let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                newly_scheduled.extend(manager.collect_new_ready_tasks());
            }
            TaskOutcome::Failed(reason) => {
                info.run_state = Some(RunState::DoneFailed);
                info.last_failed_run = Some(run_id);
                warn!(
                    task = %info.name,
                    run_id,
                    %reason,
                    "task failed; aborting dependents in this run"
                );
                newly_failed.push(info.name.clone());
                let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                newly_failed.append(&mut manager.mark_dependents_failed(task));
            }
        }

        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed,
            run_just_finished,
        }
    }
}
