// src/engine/queue.rs

use std::collections::BTreeSet;

use tracing::debug;

use super::TaskName;
use crate::types::TriggerWhileRunningBehaviour;

/// Tasks triggered while a run already contains them.
///
/// Everything waiting here starts together in the next run once the current
/// one is idle. A task is held at most once: its outputs are rebuilt from
/// whatever is on disk when it starts, so a burst of change events for the
/// same stylesheet collapses into a single recompile after the current one.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    pending: BTreeSet<TaskName>,
}

impl TriggerQueue {
    pub fn new(behaviour: TriggerWhileRunningBehaviour) -> Self {
        Self {
            behaviour,
            pending: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn behaviour(&self) -> TriggerWhileRunningBehaviour {
        self.behaviour
    }

    /// Record that a task was triggered while a run is in progress.
    ///
    /// - `Queue`: add it to the waiting set.
    /// - `Cancel`: forget everything waiting and keep only this task.
    pub fn record_trigger(&mut self, task: &str) {
        if self.behaviour == TriggerWhileRunningBehaviour::Cancel && !self.pending.is_empty() {
            debug!(task, dropped = ?self.pending, "dropping earlier queued triggers");
            self.pending.clear();
        }

        if self.pending.insert(task.to_string()) {
            debug!(task, "queued trigger for next run");
        } else {
            debug!(task, "trigger already queued; coalesced");
        }
    }

    /// Take every waiting task, sorted by name.
    pub fn drain_pending(&mut self) -> Vec<TaskName> {
        let tasks: Vec<TaskName> = std::mem::take(&mut self.pending).into_iter().collect();
        if !tasks.is_empty() {
            debug!(tasks = ?tasks, "starting queued run");
        }
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_triggers_coalesce() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue);
        q.record_trigger("less");
        q.record_trigger("less");
        q.record_trigger("browser-sync-reload");
        assert_eq!(q.drain_pending(), vec!["browser-sync-reload", "less"]);
        assert!(q.is_empty());
        assert!(q.drain_pending().is_empty());
    }

    #[test]
    fn cancel_keeps_only_latest_trigger() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Cancel);
        q.record_trigger("less");
        q.record_trigger("browser-sync-reload");
        assert_eq!(q.drain_pending(), vec!["browser-sync-reload"]);
    }
}
