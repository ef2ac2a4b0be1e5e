// src/watch/event_handler.rs

//! Turns a single filesystem change into task triggers.

use std::collections::BTreeSet;
use std::path::Path;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{RuntimeEvent, TaskName, TriggerReason};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchProfile;

/// Tasks to trigger for a path relative to the project root, deduplicated
/// and in name order.
pub fn tasks_for_path(profiles: &[WatchProfile], rel_path: &str) -> Vec<TaskName> {
    profiles
        .iter()
        .filter(|p| p.matches(rel_path))
        .flat_map(|p| p.run().iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Process one changed path: find the rules whose glob matches it and send a
/// trigger for every task they name.
///
/// Returns `false` once the runtime channel is closed.
pub async fn process_file_change(
    root: &Path,
    path: &Path,
    profiles: &[WatchProfile],
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> bool {
    let Some(rel_str) = relative_str(root, path) else {
        warn!("could not relativize path {:?} against root {:?}", path, root);
        return true;
    };

    let tasks = tasks_for_path(profiles, &rel_str);
    if tasks.is_empty() {
        return true;
    }

    debug!(path = %rel_str, ?tasks, "watch match -> triggering tasks");

    for task in tasks {
        if let Err(err) = runtime_tx
            .send(RuntimeEvent::TaskTriggered {
                task,
                reason: TriggerReason::FileWatch,
            })
            .await
        {
            warn!("failed to send RuntimeEvent::TaskTriggered: {err}");
            return false;
        }
    }

    true
}
