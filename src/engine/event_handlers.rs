// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::BTreeSet;

use tracing::debug;

use crate::dag::{ScheduledTask, Scheduler, TaskRunState};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeOptions, TaskName, TaskOutcome, TriggerReason};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Request that the process exits (idle, nothing queued, no services).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Tasks that failed or were aborted while handling this event.
    pub newly_failed: Vec<TaskName>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            newly_failed: Vec::new(),
            keep_running: true,
        }
    }

    /// Close out a step, appending `RequestExit` when the session is done.
    fn settle(
        mut commands: Vec<CoreCommand>,
        newly_failed: Vec<TaskName>,
        scheduler: &Scheduler,
        queue: &TriggerQueue,
        options: &RuntimeOptions,
    ) -> Self {
        let keep_running = !should_exit(scheduler, queue, options);
        if !keep_running {
            commands.push(CoreCommand::RequestExit);
        }
        Self {
            commands,
            newly_failed,
            keep_running,
        }
    }
}

/// Handle a task trigger event.
///
/// - If the scheduler is idle, start a new run seeded with this trigger plus
///   anything already queued.
/// - If a run is active:
///   - a task not yet in the run is merged into it immediately;
///   - a task already in the run is recorded in the queue for a future run.
pub fn handle_task_trigger(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    options: &RuntimeOptions,
    task: TaskName,
    reason: TriggerReason,
) -> CoreStep {
    debug!(task = %task, ?reason, "task triggered");
    let mut commands = Vec::new();

    if scheduler.is_idle() {
        let mut triggers: BTreeSet<TaskName> = queue.drain_pending().into_iter().collect();
        triggers.insert(task);

        let mut step = start_new_run_from_triggers(scheduler, triggers.into_iter().collect());
        commands.append(&mut step.commands);
    } else {
        match scheduler.run_state_of(&task) {
            None => {
                // Unknown task (rejected by validation); ignore.
            }
            Some(TaskRunState::NotInRun) => {
                let newly_ready = scheduler.handle_trigger(&task);
                if !newly_ready.is_empty() {
                    commands.push(CoreCommand::DispatchTasks(newly_ready));
                }
            }
            Some(_already_in_run) => {
                queue.record_trigger(&task);
            }
        }
    }

    CoreStep::settle(commands, Vec::new(), scheduler, queue, options)
}

/// Handle a progress event from a long-lived task.
pub fn handle_task_progress(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    task: TaskName,
) -> CoreStep {
    let mut commands = Vec::new();

    let newly_ready = scheduler.handle_progress(&task);
    if !newly_ready.is_empty() {
        commands.push(CoreCommand::DispatchTasks(newly_ready));
    }

    commands.append(&mut maybe_start_queued_run(scheduler, queue));

    // A service is alive now, so there is never a reason to exit here.
    CoreStep::running(commands)
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    options: &RuntimeOptions,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let mut commands = Vec::new();

    let step = scheduler.step_completion(&task, outcome);
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }

    commands.append(&mut maybe_start_queued_run(scheduler, queue));

    CoreStep::settle(commands, step.newly_failed, scheduler, queue, options)
}

/// Seed a new run from a set of triggers.
pub fn start_new_run_from_triggers(scheduler: &mut Scheduler, triggers: Vec<TaskName>) -> CoreStep {
    if triggers.is_empty() {
        return CoreStep::running(Vec::new());
    }

    scheduler.start_new_run();

    let mut all_ready = Vec::new();
    for task in triggers {
        all_ready.extend(scheduler.handle_trigger(&task));
    }

    let mut commands = Vec::new();
    if !all_ready.is_empty() {
        commands.push(CoreCommand::DispatchTasks(all_ready));
    }

    CoreStep::running(commands)
}

/// If the scheduler is idle and there are queued triggers, start a new run.
fn maybe_start_queued_run(scheduler: &mut Scheduler, queue: &mut TriggerQueue) -> Vec<CoreCommand> {
    if !scheduler.is_idle() {
        return Vec::new();
    }

    let triggers = queue.drain_pending();
    if triggers.is_empty() {
        return Vec::new();
    }

    start_new_run_from_triggers(scheduler, triggers).commands
}

fn should_exit(scheduler: &Scheduler, queue: &TriggerQueue, options: &RuntimeOptions) -> bool {
    options.exit_when_idle
        && scheduler.is_idle()
        && queue.is_empty()
        && !scheduler.any_service_alive()
}
