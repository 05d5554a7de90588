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

//! A point-in-time snapshot of the cache's accounting.

use crate::resource::ResourceType;
use serde::Serialize;

/// Aggregated statistics for observability tooling.
///
/// A `ResourceStats` is always derived from the live counters; it is never
/// mutated on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceStats {
    /// CPU bytes currently charged.
    pub total_memory: u64,
    /// Highest CPU usage observed since the last peak reset.
    pub peak_memory: u64,
    /// GPU bytes currently reported.
    pub gpu_memory: u64,
    /// Highest GPU usage observed since the last peak reset.
    pub peak_gpu_memory: u64,
    /// Configured limit in bytes, `0` meaning unlimited.
    pub memory_limit: u64,
    /// `total_memory` as a percentage of `memory_limit`; `0.0` when unlimited.
    pub memory_usage_percent: f64,

    /// Cached images.
    pub image_count: usize,
    /// Cached fonts.
    pub font_count: usize,
    /// Cached audio clips.
    pub audio_count: usize,
    /// Cached shaders.
    pub shader_count: usize,
    /// Cached models.
    pub model_count: usize,
    /// Cached bundles.
    pub bundle_count: usize,

    /// Requests served from the cache.
    pub cache_hits: u64,
    /// Requests that triggered a physical load.
    pub cache_misses: u64,
    /// Loads that failed.
    pub load_failures: u64,
    /// Entries removed by limit enforcement.
    pub evictions: u64,
    /// Explicit `gc()` sweeps.
    pub gc_runs: u64,
    /// Entries removed by `gc()` sweeps.
    pub gc_freed: u64,
    /// Successful in-place reloads.
    pub hot_reloads: u64,
    /// Reloads that kept the previous payload because decoding failed.
    pub hot_reload_failures: u64,

    /// Bundles currently mounted.
    pub bundles_mounted: usize,
    /// Entries across all mounted bundles.
    pub bundle_entries: usize,
    /// Stored bytes across all mounted bundles.
    pub bundle_bytes: u64,
}

impl ResourceStats {
    /// Number of cached entries of `kind`.
    pub fn count(&self, kind: ResourceType) -> usize {
        match kind {
            ResourceType::Image => self.image_count,
            ResourceType::Font => self.font_count,
            ResourceType::Audio => self.audio_count,
            ResourceType::Shader => self.shader_count,
            ResourceType::Model => self.model_count,
            ResourceType::Bundle => self.bundle_count,
        }
    }

    /// Sets the cached-entry count of `kind`.
    pub fn set_count(&mut self, kind: ResourceType, count: usize) {
        let slot = match kind {
            ResourceType::Image => &mut self.image_count,
            ResourceType::Font => &mut self.font_count,
            ResourceType::Audio => &mut self.audio_count,
            ResourceType::Shader => &mut self.shader_count,
            ResourceType::Model => &mut self.model_count,
            ResourceType::Bundle => &mut self.bundle_count,
        };
        *slot = count;
    }

    /// Number of cached entries of every kind.
    pub fn total_resources(&self) -> usize {
        ResourceType::ALL.iter().map(|kind| self.count(*kind)).sum()
    }

    /// Fraction of requests served from the cache, in `[0, 1]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Whether the configured limit is currently exceeded.
    pub fn is_over_limit(&self) -> bool {
        self.memory_limit > 0 && self.total_memory > self.memory_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_values() {
        let mut stats = ResourceStats {
            cache_hits: 3,
            cache_misses: 1,
            total_memory: 150,
            memory_limit: 100,
            ..Default::default()
        };
        stats.set_count(ResourceType::Image, 2);
        stats.set_count(ResourceType::Bundle, 1);

        assert_eq!(stats.hit_rate(), 0.75);
        assert!(stats.is_over_limit());
        assert_eq!(stats.total_resources(), 3);
        assert_eq!(stats.count(ResourceType::Image), 2);
        assert_eq!(ResourceStats::default().hit_rate(), 0.0);
    }
}
