// src/fs/mock.rs

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use super::{EntryKind, FileSystem};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
}

/// In-memory filesystem for tests.
///
/// Paths are normalised by dropping `.` components, so `./app/a.html` and
/// `app/a.html` name the same entry. The root is the empty path.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    read_only: Arc<Mutex<Vec<PathBuf>>>,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(PathBuf::new(), MockEntry::Dir(Vec::new()));

        Self {
            entries: Arc::new(Mutex::new(entries)),
            read_only: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalize(path.as_ref());
        let mut entries = self.lock();
        if let Some(parent) = path.parent() {
            ensure_dir(&mut entries, parent);
            link_child(&mut entries, parent, &path);
        }
        entries.insert(path, MockEntry::File(content.into()));
    }

    /// Contents of a file, if it exists.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().get(&normalize(path.as_ref())) {
            Some(MockEntry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    /// Make every write below `dir` fail.
    pub fn deny_writes_under(&self, dir: impl AsRef<Path>) {
        let dir = normalize(dir.as_ref());
        self.read_only
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(dir);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn ensure_dir(entries: &mut HashMap<PathBuf, MockEntry>, dir: &Path) {
    if entries.contains_key(dir) {
        return;
    }
    entries.insert(dir.to_path_buf(), MockEntry::Dir(Vec::new()));
    if let Some(parent) = dir.parent() {
        ensure_dir(entries, parent);
        link_child(entries, parent, dir);
    }
}

fn link_child(entries: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
    let Some(name) = child.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    if let Some(MockEntry::Dir(children)) = entries.get_mut(parent) {
        if !children.iter().any(|c| c == name) {
            children.push(name.to_string());
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        match self.lock().get(&normalize(path)) {
            Some(MockEntry::File(content)) => Ok(content.clone()),
            Some(MockEntry::Dir(_)) => Err(anyhow!("{} is a directory", path.display())),
            None => Err(anyhow!("{} does not exist", path.display())),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let key = normalize(path);
        let denied = self
            .read_only
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|dir| key.starts_with(dir));
        if denied {
            return Err(anyhow!("permission denied: {}", path.display()));
        }
        self.add_file(key, contents);
        Ok(())
    }

    fn kind(&self, path: &Path) -> Option<EntryKind> {
        match self.lock().get(&normalize(path))? {
            MockEntry::File(_) => Some(EntryKind::File),
            MockEntry::Dir(_) => Some(EntryKind::Dir),
        }
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        match self.lock().get(&normalize(dir)) {
            Some(MockEntry::Dir(children)) => Ok(children.iter().map(|name| dir.join(name)).collect()),
            _ => Err(anyhow!("{} is not a directory", dir.display())),
        }
    }
}
