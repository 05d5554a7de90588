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

use crate::resource::ResourceType;
use std::time::Instant;

/// Per-entry bookkeeping used by eviction and reported to tooling.
///
/// One instance exists per cached key. It is created by the first successful
/// load, refreshed on every cache hit, and dropped when the entry is evicted
/// or unloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMetadata {
    /// The full cache key.
    pub key: String,
    /// The resource kind.
    pub resource_type: ResourceType,
    /// CPU bytes charged to the memory accountant.
    pub memory_usage: u64,
    /// GPU bytes reported for this entry.
    pub gpu_memory_usage: u64,
    /// Last time the entry was loaded or hit.
    pub last_access_time: Instant,
    /// Time of the first successful load.
    pub load_time: Instant,
    /// Number of loads and hits, starting at 1.
    pub access_count: u64,
}
