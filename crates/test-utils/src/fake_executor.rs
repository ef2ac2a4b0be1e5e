use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use stylepipe::dag::ScheduledTask;
use stylepipe::engine::{RuntimeEvent, TaskOutcome};
use stylepipe::errors::Result;
use stylepipe::exec::ExecutorBackend;
use tokio::sync::mpsc;

/// A fake executor that:
/// - records which tasks were "run", in dispatch order
/// - reports `TaskProgressed` for long-lived tasks
/// - reports `TaskCompleted` for the rest: `Failed` for names registered
///   with [`FakeExecutor::failing`], `Success` otherwise.
///
/// Completions of one dispatch batch are sent in reverse order when
/// [`FakeExecutor::reversed`] is set, to exercise order independence.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: BTreeSet<String>,
    reversed: bool,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: BTreeSet::new(),
            reversed: false,
        }
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();
        let reversed = self.reversed;

        Box::pin(async move {
            {
                let mut guard = executed.lock().unwrap();
                guard.extend(tasks.iter().map(|t| t.name.clone()));
            }

            let mut events: Vec<RuntimeEvent> = tasks
                .into_iter()
                .map(|t| {
                    if t.long_lived {
                        RuntimeEvent::TaskProgressed { task: t.name }
                    } else if failing.contains(&t.name) {
                        let message = format!("{} failed", t.name);
                        RuntimeEvent::TaskCompleted {
                            task: t.name,
                            outcome: TaskOutcome::Failed(message),
                        }
                    } else {
                        RuntimeEvent::TaskCompleted {
                            task: t.name,
                            outcome: TaskOutcome::Success,
                        }
                    }
                })
                .collect();
            if reversed {
                events.reverse();
            }

            for event in events {
                tx.send(event).await.map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
