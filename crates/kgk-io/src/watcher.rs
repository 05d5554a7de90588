// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A polling file watcher for development-time hot reload.
//!
//! The watcher owns no thread. Its owner calls [`FileWatcher::update`]
//! periodically; each call compares current modification times against the
//! stored baselines and invokes the registered callback once per change.

use kgk_core::{ResourceError, ResourceResult};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use walkdir::WalkDir;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    /// The file's modification time changed.
    Modified,
    /// A file appeared (inside a watched directory, or a watched file came back).
    Created,
    /// The file disappeared.
    Removed,
}

/// A single detected change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// The file that changed.
    pub path: PathBuf,
    /// The registered path (the file itself, or its watched directory).
    pub watched: PathBuf,
    /// The kind of change.
    pub kind: WatchEventKind,
}

/// Callback invoked for each detected change.
pub type WatchCallback = Arc<dyn Fn(&WatchEvent) + Send + Sync>;

struct WatchEntry {
    callback: WatchCallback,
    is_directory: bool,
    recursive: bool,
    /// Baseline for a file watch; `None` while the file is missing.
    last_modified: Option<SystemTime>,
    /// Baselines of every file observed inside a directory watch.
    files: HashMap<PathBuf, SystemTime>,
}

/// Polls modification times of registered files and directories.
///
/// Every method takes `&self`; the watch table is guarded by a mutex that is
/// never held while callbacks run, so a callback may freely add or remove
/// watches (including its own).
#[derive(Default)]
pub struct FileWatcher {
    entries: Mutex<HashMap<PathBuf, WatchEntry>>,
}

impl FileWatcher {
    /// Creates a watcher with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, WatchEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts watching a single file. Watching it again replaces the callback
    /// and rebases the stored timestamp.
    pub fn watch_file<F>(&self, path: impl AsRef<Path>, callback: F) -> ResourceResult<()>
    where
        F: Fn(&WatchEvent) + Send + Sync + 'static,
    {
        let path = path.as_ref().to_path_buf();
        let last_modified = modified_time(&path).ok_or_else(|| ResourceError::FileNotFound {
            path: path.display().to_string(),
        })?;

        log::debug!("Watching file '{}'", path.display());
        self.lock().insert(
            path,
            WatchEntry {
                callback: Arc::new(callback),
                is_directory: false,
                recursive: false,
                last_modified: Some(last_modified),
                files: HashMap::new(),
            },
        );
        Ok(())
    }

    /// Starts watching every file inside `path` (and below it when `recursive`).
    pub fn watch_directory<F>(
        &self,
        path: impl AsRef<Path>,
        recursive: bool,
        callback: F,
    ) -> ResourceResult<()>
    where
        F: Fn(&WatchEvent) + Send + Sync + 'static,
    {
        let path = path.as_ref().to_path_buf();
        if !path.is_dir() {
            return Err(ResourceError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let files = scan_directory(&path, recursive);
        log::debug!(
            "Watching directory '{}' ({} files, recursive={recursive})",
            path.display(),
            files.len()
        );
        self.lock().insert(
            path,
            WatchEntry {
                callback: Arc::new(callback),
                is_directory: true,
                recursive,
                last_modified: None,
                files,
            },
        );
        Ok(())
    }

    /// Stops watching a file. Returns whether it was watched.
    pub fn unwatch_file(&self, path: impl AsRef<Path>) -> bool {
        self.unwatch(path.as_ref(), false)
    }

    /// Stops watching a directory. Returns whether it was watched.
    pub fn unwatch_directory(&self, path: impl AsRef<Path>) -> bool {
        self.unwatch(path.as_ref(), true)
    }

    fn unwatch(&self, path: &Path, directory: bool) -> bool {
        let mut entries = self.lock();
        match entries.get(path) {
            Some(entry) if entry.is_directory == directory => {
                entries.remove(path);
                true
            }
            _ => false,
        }
    }

    /// Removes every watch.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Whether `path` is registered, as a file or a directory.
    pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        self.lock().contains_key(path.as_ref())
    }

    /// Every registered path, sorted.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of registered watches.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Polls every watch once and dispatches the detected changes.
    ///
    /// Baselines are rebased before any callback runs, so each change is
    /// reported exactly once. Returns the number of callbacks invoked.
    pub fn update(&self) -> usize {
        let pending: Vec<(PathBuf, WatchCallback, WatchEvent)> = {
            let mut entries = self.lock();
            let mut pending = Vec::new();
            for (watched, entry) in entries.iter_mut() {
                for event in poll_entry(watched, entry) {
                    pending.push((watched.clone(), entry.callback.clone(), event));
                }
            }
            pending
        };

        let mut dispatched = 0;
        for (watched, callback, event) in pending {
            // An earlier callback may have removed this watch.
            if !self.is_watching(&watched) {
                continue;
            }
            log::trace!("{:?} '{}'", event.kind, event.path.display());
            callback(&event);
            dispatched += 1;
        }
        dispatched
    }
}

impl fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWatcher")
            .field("watched", &self.watched_paths())
            .finish()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn scan_directory(dir: &Path, recursive: bool) -> HashMap<PathBuf, SystemTime> {
    let walker = WalkDir::new(dir).min_depth(1);
    let walker = if recursive { walker } else { walker.max_depth(1) };

    walker
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((entry.into_path(), modified))
        })
        .collect()
}

/// Compares one watch against the filesystem and rebases its baselines.
fn poll_entry(watched: &Path, entry: &mut WatchEntry) -> Vec<WatchEvent> {
    let event = |path: &Path, kind| WatchEvent {
        path: path.to_path_buf(),
        watched: watched.to_path_buf(),
        kind,
    };

    if !entry.is_directory {
        let current = modified_time(watched);
        let kind = match (entry.last_modified, current) {
            (Some(before), Some(now)) if before != now => Some(WatchEventKind::Modified),
            (Some(_), None) => Some(WatchEventKind::Removed),
            (None, Some(_)) => Some(WatchEventKind::Created),
            _ => None,
        };
        entry.last_modified = current;
        return kind.map(|kind| vec![event(watched, kind)]).unwrap_or_default();
    }

    let current = scan_directory(watched, entry.recursive);
    let mut events = Vec::new();

    for (path, modified) in &current {
        match entry.files.get(path) {
            Some(before) if before != modified => {
                events.push(event(path, WatchEventKind::Modified))
            }
            None => events.push(event(path, WatchEventKind::Created)),
            _ => {}
        }
    }
    for path in entry.files.keys() {
        if !current.contains_key(path) {
            events.push(event(path, WatchEventKind::Removed));
        }
    }

    events.sort_by(|a, b| a.path.cmp(&b.path));
    entry.files = current;
    events
}
