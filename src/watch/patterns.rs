// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};

use crate::config::model::WatchRule;
use crate::engine::TaskName;
use crate::fs::{EntryKind, FileSystem};

/// A compiled watch rule: changes to paths matching `glob` trigger `run`.
///
/// Patterns are relative to the project root; the watcher passes
/// forward-slash relative paths (e.g. `"app/css/style.css"`) into `matches`.
#[derive(Clone)]
pub struct WatchProfile {
    pattern: String,
    matcher: GlobMatcher,
    run: Vec<TaskName>,
}

impl fmt::Debug for WatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchProfile")
            .field("pattern", &self.pattern)
            .field("run", &self.run)
            .finish_non_exhaustive()
    }
}

impl WatchProfile {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Tasks to trigger on a match.
    pub fn run(&self) -> &[TaskName] {
        &self.run
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.matcher.is_match(rel_path)
    }

    /// Directory (relative to the root) that has to be watched for this rule.
    pub fn base(&self) -> PathBuf {
        glob_base(&self.pattern)
    }
}

/// Compile the watch rules of a `watch` task.
pub fn build_watch_profiles(rules: &[WatchRule]) -> Result<Vec<WatchProfile>> {
    rules
        .iter()
        .map(|rule| {
            Ok(WatchProfile {
                pattern: rule.glob.clone(),
                matcher: compile_glob(&rule.glob)?,
                run: rule.run.clone(),
            })
        })
        .collect()
}

/// Compile a single glob pattern. `*` does not cross `/`; use `**` for that.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))?;
    Ok(glob.compile_matcher())
}

/// The leading path components of `pattern` that contain no glob
/// metacharacters.
///
/// `app/**/*.html` -> `app`, `app/css/*.css` -> `app/css`,
/// `app/less/style.less` -> `app/less`, `*.html` -> ``.
pub fn glob_base(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern.split('/').collect();
    let mut base = PathBuf::new();

    // The last component is the file part, even when it is a literal name.
    let dir_components = &components[..components.len().saturating_sub(1)];
    for component in dir_components {
        if component.is_empty() || component.contains(['*', '?', '[', '{']) {
            break;
        }
        base.push(component);
    }
    base
}

/// Collect files below `root.join(start)` whose path relative to `root`
/// matches `matcher`. The result is sorted.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    start: &Path,
    matcher: &GlobMatcher,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let start_dir = root.join(start);
    if fs.kind(&start_dir) != Some(EntryKind::Dir) {
        return Ok(files);
    }

    let mut stack = vec![start_dir];
    while let Some(dir) = stack.pop() {
        for path in fs.list_dir(&dir)? {
            match fs.kind(&path) {
                Some(EntryKind::Dir) => stack.push(path),
                Some(EntryKind::File) => {
                    if let Ok(rel) = path.strip_prefix(root) {
                        let rel_str = rel.to_string_lossy().replace('\\', "/");
                        if matcher.is_match(&rel_str) {
                            files.push(path);
                        }
                    }
                }
                None => {}
            }
        }
    }

    files.sort();
    Ok(files)
}
