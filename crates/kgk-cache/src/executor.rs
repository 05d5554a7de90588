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

//! Where background preload work runs.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

/// A unit of preload work.
pub type PreloadTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs preload tasks off the caller's thread.
pub trait PreloadExecutor: Send + Sync {
    /// Schedules `task`. Implementations must run it exactly once.
    fn execute(&self, task: PreloadTask);
}

/// Spawns one named OS thread per task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadExecutor;

impl PreloadExecutor for ThreadExecutor {
    fn execute(&self, task: PreloadTask) {
        // `spawn` consumes the closure, so keep a slot to recover it on failure.
        let slot = Arc::new(Mutex::new(Some(task)));
        let remote = Arc::clone(&slot);
        let spawned = thread::Builder::new()
            .name("kgk-preload".into())
            .spawn(move || {
                let task = remote
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(task) = task {
                    task();
                }
            });

        if let Err(e) = spawned {
            log::warn!("Failed to spawn preload thread ({e}); running task inline");
            let task = slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(task) = task {
                task();
            }
        }
    }
}

/// Runs every task immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl PreloadExecutor for InlineExecutor {
    fn execute(&self, task: PreloadTask) {
        task();
    }
}

/// Runs tasks on a Tokio runtime's blocking pool.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioExecutor {
    /// Uses the given runtime.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on, if any.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

#[cfg(feature = "tokio")]
impl PreloadExecutor for TokioExecutor {
    fn execute(&self, task: PreloadTask) {
        // Loads do blocking file I/O and decoding.
        drop(self.handle.spawn_blocking(task));
    }
}
