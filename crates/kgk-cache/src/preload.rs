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

//! Progress and results of preload batches.

use crossbeam_channel::Receiver;
use kgk_core::ResourceError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Reported once per path as a preload batch advances.
#[derive(Debug, Clone)]
pub struct PreloadProgress {
    /// The path that just finished.
    pub path: String,
    /// Paths finished so far, this one included.
    pub completed: usize,
    /// Paths in the batch.
    pub total: usize,
    /// Why the path failed, if it did.
    pub error: Option<ResourceError>,
}

/// Final tally of a preload batch.
#[derive(Debug, Clone, Default)]
pub struct PreloadReport {
    /// Paths that were loaded (or already cached).
    pub loaded: usize,
    /// Paths that failed, with their errors, in completion order.
    pub failed: Vec<(String, ResourceError)>,
}

impl PreloadReport {
    /// Whether every path loaded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn push(&mut self, path: String, error: Option<ResourceError>) {
        match error {
            None => self.loaded += 1,
            Some(error) => self.failed.push((path, error)),
        }
    }
}

/// A preload batch running in the background.
pub struct PreloadJob {
    total: usize,
    completed: Arc<AtomicUsize>,
    results: Receiver<(String, Option<ResourceError>)>,
}

impl PreloadJob {
    pub(crate) fn new(
        total: usize,
        completed: Arc<AtomicUsize>,
        results: Receiver<(String, Option<ResourceError>)>,
    ) -> Self {
        Self {
            total,
            completed,
            results,
        }
    }

    /// Paths in the batch.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Paths finished so far.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Whether every path has finished.
    pub fn is_finished(&self) -> bool {
        self.completed() >= self.total
    }

    /// Blocks until every path has finished.
    ///
    /// If a task is lost (its executor dropped it) the report only covers
    /// the paths that did report back.
    pub fn wait(self) -> PreloadReport {
        let mut report = PreloadReport::default();
        for _ in 0..self.total {
            match self.results.recv() {
                Ok((path, error)) => report.push(path, error),
                Err(_) => {
                    log::warn!(
                        "Preload batch ended early: {} of {} paths reported",
                        report.loaded + report.failed.len(),
                        self.total
                    );
                    break;
                }
            }
        }
        report
    }
}

impl std::fmt::Debug for PreloadJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadJob")
            .field("total", &self.total)
            .field("completed", &self.completed())
            .finish()
    }
}
