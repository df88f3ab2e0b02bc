//! Frame-Graph Directory Watcher
//!
//! Polls the frame-graph directory for changes and flips a dirty flag.
//! The flag is consumed by the next requested build; nothing is rebuilt
//! behind the renderer's back while frames are in flight.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rustc_hash::FxHashMap;

use crate::errors::Result;

/// Mtime-snapshot watcher over one directory.
pub struct FrameGraphWatcher {
    dir: PathBuf,
    snapshot: FxHashMap<PathBuf, SystemTime>,
    dirty: bool,
}

impl FrameGraphWatcher {
    /// Creates the watcher and takes the initial snapshot. The first
    /// build is always considered dirty.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let snapshot = scan(&dir)?;
        Ok(Self {
            dir,
            snapshot,
            dirty: true,
        })
    }

    /// Rescans the directory; any added, removed or modified file flips
    /// the dirty flag.
    pub fn poll(&mut self) -> Result<()> {
        let current = scan(&self.dir)?;
        if current != self.snapshot {
            log::info!(
                "frame-graph directory {} changed, marking dirty",
                self.dir.display()
            );
            self.snapshot = current;
            self.dirty = true;
        }
        Ok(())
    }

    /// Forces a rebuild on the next request.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the dirty flag and resets it.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

fn scan(dir: &Path) -> Result<FxHashMap<PathBuf, SystemTime>> {
    let mut snapshot = FxHashMap::default();
    if !dir.is_dir() {
        return Ok(snapshot);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            snapshot.insert(entry.path(), modified);
        }
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_watcher_starts_dirty() {
        let dir = std::env::temp_dir().join("cinder-watcher-test-empty");
        let _ = std::fs::create_dir_all(&dir);
        let mut watcher = FrameGraphWatcher::new(&dir).unwrap();
        assert!(watcher.take_dirty());
        assert!(!watcher.is_dirty());
    }

    #[test]
    fn file_change_flips_dirty() {
        let dir = std::env::temp_dir().join(format!(
            "cinder-watcher-test-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let mut watcher = FrameGraphWatcher::new(&dir).unwrap();
        watcher.take_dirty();

        watcher.poll().unwrap();
        assert!(!watcher.is_dirty());

        std::fs::write(dir.join("ui.pass"), "input UI").unwrap();
        watcher.poll().unwrap();
        assert!(watcher.take_dirty());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
