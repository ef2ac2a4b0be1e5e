// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::RuntimeEvent;
use crate::watch::event_handler::process_file_change;
use crate::watch::patterns::WatchProfile;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping the handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    event_loop: JoinHandle<()>,
    roots: Vec<PathBuf>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl WatcherHandle {
    /// Directories registered with the OS watcher.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Wait until the event loop ends (the runtime channel closed). The
    /// watcher stays registered until then.
    pub async fn closed(self) {
        let WatcherHandle {
            _inner, event_loop, ..
        } = self;
        let _ = event_loop.await;
    }
}

/// Spawn a filesystem watcher for the given rules and send
/// `RuntimeEvent::TaskTriggered` for every task bound to a changed path.
///
/// - `root` is the project root against which all globs are evaluated.
/// - Only the static base directory of each glob is registered (recursively),
///   not the whole project.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    profiles: Vec<WatchProfile>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    let profiles = Arc::new(profiles);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // Not inside the runtime here; fall back to stderr.
                    eprintln!("stylepipe: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("stylepipe: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    let roots = watch_roots(&root, &profiles);
    for dir in &roots {
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .with_context(|| format!("watching {:?}", dir))?;
        info!("file watcher started on {:?}", dir);
    }

    let async_root = root.clone();
    let async_profiles = Arc::clone(&profiles);
    let event_loop = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if !is_content_change(&event.kind) {
                continue;
            }
            debug!(?event, "received notify event");

            for path in &event.paths {
                if !process_file_change(&async_root, path, &async_profiles, &runtime_tx).await {
                    debug!("runtime channel closed; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        event_loop,
        roots,
    })
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Existing directories to register: the base of every rule (or its nearest
/// existing ancestor), minus those already covered by another root.
fn watch_roots(root: &Path, profiles: &[WatchProfile]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = profiles
        .iter()
        .map(|p| {
            let mut dir = root.join(p.base());
            while !dir.is_dir() && dir != root {
                if !dir.pop() {
                    break;
                }
            }
            dir
        })
        .collect();

    dirs.sort();
    dirs.dedup();

    let mut roots: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if !roots.iter().any(|r| dir.starts_with(r)) {
            roots.push(dir);
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::WatchRule;
    use crate::watch::patterns::build_watch_profiles;

    #[test]
    fn nested_bases_collapse_into_one_root() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("app/less")).unwrap();
        std::fs::create_dir_all(tmp.path().join("app/css")).unwrap();

        let profiles = build_watch_profiles(&[
            WatchRule::new("app/less/style.less", ["less"]),
            WatchRule::new("app/css/*.css", ["reload"]),
            WatchRule::new("app/**/*.html", ["reload"]),
        ])
        .unwrap();

        let roots = watch_roots(tmp.path(), &profiles);
        assert_eq!(roots, vec![tmp.path().join("app")]);
    }

    #[test]
    fn missing_base_falls_back_to_existing_ancestor() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("app")).unwrap();

        let profiles =
            build_watch_profiles(&[WatchRule::new("app/css/*.css", ["reload"])]).unwrap();
        assert_eq!(watch_roots(tmp.path(), &profiles), vec![tmp.path().join("app")]);
    }
}
