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

use std::sync::{PoisonError, RwLock};

/// Event counters kept by the manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counters {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub load_failures: u64,
    pub evictions: u64,
    pub gc_runs: u64,
    pub gc_freed: u64,
    pub hot_reloads: u64,
    pub hot_reload_failures: u64,
}

/// Counters behind their own lock, separate from every cache structure.
#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    counters: RwLock<Counters>,
}

impl StatsCollector {
    pub fn record(&self, update: impl FnOnce(&mut Counters)) {
        update(&mut self.counters.write().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn snapshot(&self) -> Counters {
        *self.counters.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self) {
        *self.counters.write().unwrap_or_else(PoisonError::into_inner) = Counters::default();
    }
}
