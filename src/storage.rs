// SPDX-License-Identifier: GPL-3.0-only

//! Temp-file registry
//!
//! Every file the session writes for a "save to file" capture or a recording
//! is registered here before the first byte is written. Files are tagged
//! with the session generation that created them so that stopping a session
//! removes exactly the files it left behind. Files already handed to a
//! caller stay on disk until a stale sweep or process termination.

use crate::constants::TEMP_FILE_PREFIX;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// What a temp file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TempFileKind {
    Photo,
    Sample,
    Video,
}

impl TempFileKind {
    pub fn extension(&self) -> &'static str {
        match self {
            TempFileKind::Photo | TempFileKind::Sample => "jpg",
            TempFileKind::Video => "mp4",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TempFileKind::Photo => "photo",
            TempFileKind::Sample => "sample",
            TempFileKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone)]
struct TempFileEntry {
    created: SystemTime,
    session: u64,
    handed_off: bool,
    /// A recorder is still writing to the file
    in_flight: bool,
}

/// Process-wide set of temp files created by the session
pub struct TempFileRegistry {
    dir: PathBuf,
    entries: Mutex<HashMap<PathBuf, TempFileEntry>>,
}

static GLOBAL: OnceLock<Arc<TempFileRegistry>> = OnceLock::new();

impl TempFileRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Registry in the system temp directory, created on first use
    pub fn global() -> Arc<TempFileRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TempFileRegistry::new(std::env::temp_dir()))))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, TempFileEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve and register a fresh path; nothing is written yet
    pub fn allocate(&self, kind: TempFileKind, session: u64) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!(
            "{}{}-{}-{}.{}",
            TEMP_FILE_PREFIX,
            kind.label(),
            timestamp,
            uuid::Uuid::new_v4().simple(),
            kind.extension()
        );
        let path = self.dir.join(filename);
        self.entries().insert(
            path.clone(),
            TempFileEntry {
                created: SystemTime::now(),
                session,
                handed_off: false,
                in_flight: false,
            },
        );
        debug!(path = %path.display(), session, "Registered temp file");
        path
    }

    /// Register a path and write `data` to it
    ///
    /// On failure the partial file is removed and unregistered.
    pub fn write_new(&self, kind: TempFileKind, session: u64, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.allocate(kind, session);
        if let Err(e) = std::fs::create_dir_all(&self.dir).and_then(|_| std::fs::write(&path, data))
        {
            warn!(path = %path.display(), error = %e, "Failed to write temp file");
            self.discard(&path);
            return Err(e);
        }
        Ok(path)
    }

    /// The caller now owns the file; session cleanup leaves it alone
    pub fn mark_handed_off(&self, path: &Path) {
        if let Some(entry) = self.entries().get_mut(path) {
            entry.handed_off = true;
            entry.in_flight = false;
        }
    }

    /// Flag a file that is still being written; stale sweeps skip it
    pub fn set_in_flight(&self, path: &Path, in_flight: bool) {
        if let Some(entry) = self.entries().get_mut(path) {
            entry.in_flight = in_flight;
        }
    }

    /// Remove a file and forget it
    pub fn discard(&self, path: &Path) {
        self.entries().remove(path);
        remove_quietly(path);
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    pub fn tracked_count(&self) -> usize {
        self.entries().len()
    }

    /// Remove files created during `session` that no caller received
    pub fn cleanup_session_files(&self, session: u64) -> usize {
        let doomed: Vec<PathBuf> = {
            let mut entries = self.entries();
            let doomed: Vec<PathBuf> = entries
                .iter()
                .filter(|(_, e)| e.session == session && !e.handed_off)
                .map(|(p, _)| p.clone())
                .collect();
            for path in &doomed {
                entries.remove(path);
            }
            doomed
        };
        for path in &doomed {
            remove_quietly(path);
        }
        if !doomed.is_empty() {
            info!(session, removed = doomed.len(), "Cleaned up session temp files");
        }
        doomed.len()
    }

    /// Remove tracked and untracked session files older than `max_age`
    ///
    /// Files a recorder is still writing are never stale. Untracked files
    /// are leftovers from earlier processes; only names carrying the
    /// session prefix are touched.
    pub fn cleanup_stale_files(&self, max_age: Duration) -> usize {
        let now = SystemTime::now();
        let is_stale = |created: SystemTime| {
            now.duration_since(created)
                .map(|age| age >= max_age)
                .unwrap_or(false)
        };

        let mut removed = {
            let mut entries = self.entries();
            let doomed: Vec<PathBuf> = entries
                .iter()
                .filter(|(_, e)| !e.in_flight && is_stale(e.created))
                .map(|(p, _)| p.clone())
                .collect();
            for path in &doomed {
                entries.remove(path);
                remove_quietly(path);
            }
            doomed.len()
        };

        if let Ok(dir) = std::fs::read_dir(&self.dir) {
            for entry in dir.flatten() {
                let path = entry.path();
                let prefixed = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(TEMP_FILE_PREFIX));
                if !prefixed || self.is_tracked(&path) {
                    continue;
                }
                let modified = entry.metadata().and_then(|m| m.modified());
                if let Ok(modified) = modified
                    && is_stale(modified)
                {
                    remove_quietly(&path);
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            info!(removed, "Swept stale temp files");
        }
        removed
    }

    /// Remove every tracked file (process termination)
    pub fn cleanup_all(&self) -> usize {
        let doomed: Vec<PathBuf> = self.entries().drain().map(|(p, _)| p).collect();
        for path in &doomed {
            remove_quietly(path);
        }
        if !doomed.is_empty() {
            info!(removed = doomed.len(), "Removed all tracked temp files");
        }
        doomed.len()
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed temp file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cleanup_spares_handed_off_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TempFileRegistry::new(dir.path());

        let kept = registry.write_new(TempFileKind::Photo, 1, b"kept").unwrap();
        let orphan = registry.write_new(TempFileKind::Sample, 1, b"orphan").unwrap();
        let other = registry.write_new(TempFileKind::Photo, 2, b"other").unwrap();
        registry.mark_handed_off(&kept);

        assert_eq!(registry.cleanup_session_files(1), 1);
        assert!(kept.exists());
        assert!(!orphan.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_failed_write_is_unregistered() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"").unwrap();
        let registry = TempFileRegistry::new(&file);

        assert!(registry.write_new(TempFileKind::Photo, 1, b"x").is_err());
        assert_eq!(registry.tracked_count(), 0);
    }

    #[test]
    fn test_stale_sweep_covers_untracked_prefixed_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TempFileRegistry::new(dir.path());
        let leftover = dir.path().join(format!("{}video-old.mp4", TEMP_FILE_PREFIX));
        let foreign = dir.path().join("unrelated.txt");
        std::fs::write(&leftover, b"").unwrap();
        std::fs::write(&foreign, b"").unwrap();
        let fresh = registry.write_new(TempFileKind::Photo, 1, b"fresh").unwrap();

        assert_eq!(registry.cleanup_stale_files(Duration::from_secs(3600)), 0);
        assert_eq!(registry.cleanup_stale_files(Duration::ZERO), 2);
        assert!(!leftover.exists());
        assert!(!fresh.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn test_stale_sweep_skips_files_being_written() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TempFileRegistry::new(dir.path());
        let movie = registry.write_new(TempFileKind::Video, 1, b"partial").unwrap();
        registry.set_in_flight(&movie, true);

        assert_eq!(registry.cleanup_stale_files(Duration::ZERO), 0);
        assert!(movie.exists());
        assert!(registry.is_tracked(&movie));

        registry.mark_handed_off(&movie);
        assert_eq!(registry.cleanup_stale_files(Duration::ZERO), 1);
        assert!(!movie.exists());
    }

    #[test]
    fn test_cleanup_all_removes_handed_off_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TempFileRegistry::new(dir.path());
        let path = registry.write_new(TempFileKind::Video, 3, b"movie").unwrap();
        registry.mark_handed_off(&path);

        assert_eq!(registry.cleanup_all(), 1);
        assert!(!path.exists());
        assert_eq!(registry.tracked_count(), 0);
    }

    #[test]
    fn test_file_names_carry_prefix_and_extension() {
        let registry = TempFileRegistry::new("/tmp");
        let path = registry.allocate(TempFileKind::Video, 0);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("camera-session-video-"));
        assert!(name.ends_with(".mp4"));
    }
}
