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

//! Policy-driven reclamation of unreferenced entries.

use crate::accountant::MemoryAccountant;
use crate::registry::MetadataRegistry;
use crate::store::CacheStores;
use kgk_core::{CacheKey, EvictionPolicy};
use std::sync::{PoisonError, RwLock};

/// The pieces an eviction pass works on.
#[derive(Clone, Copy)]
pub struct EvictionContext<'a> {
    /// Where entries live.
    pub stores: &'a CacheStores,
    /// Ordering and sizes.
    pub registry: &'a MetadataRegistry,
    /// Byte totals.
    pub accountant: &'a MemoryAccountant,
}

impl EvictionContext<'_> {
    /// Frees `key` if it is still unreferenced. Returns whether it was freed.
    pub fn free(&self, key: &CacheKey) -> bool {
        let store = self.stores.get(key.resource_type());
        let removed = store.remove_if_unpinned(key, |record| {
            let meta = self.registry.untrack(record);
            if let Some(meta) = &meta {
                self.accountant.release(meta.memory_usage, meta.gpu_memory_usage);
            }
            meta
        });
        match removed {
            None => return false,
            Some((_, Some(meta))) => log::debug!("Evicted '{}' ({} bytes)", key, meta.memory_usage),
            Some((_, None)) => log::warn!("Evicted '{}' without registry metadata", key),
        }
        true
    }
}

/// Chooses which entries to free when the cache is over budget.
#[derive(Debug, Default)]
pub struct EvictionStrategy {
    policy: RwLock<EvictionPolicy>,
}

impl EvictionStrategy {
    /// Creates a strategy using `policy`.
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            policy: RwLock::new(policy),
        }
    }

    /// The active policy.
    pub fn policy(&self) -> EvictionPolicy {
        *self.policy.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switches the policy; later passes use the new ordering.
    pub fn set_policy(&self, policy: EvictionPolicy) {
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) = policy;
    }

    /// Evicts unreferenced entries in policy order until the CPU charge is at
    /// or below `limit`. Returns how many entries were freed.
    ///
    /// A `limit` of 0 means unlimited and does nothing. When every remaining
    /// entry is referenced the pass stops early and the cache stays over.
    pub fn enforce_limit(&self, ctx: EvictionContext<'_>, limit: u64) -> usize {
        if !ctx.accountant.exceeds(limit) {
            return 0;
        }
        let policy = self.policy();
        let mut evicted = 0;

        loop {
            // Another pass may have freed memory since the last check.
            let excess = ctx.accountant.current().saturating_sub(limit);
            if excess == 0 {
                break;
            }
            let candidates = ctx.registry.candidates_for(policy, excess);
            let mut progressed = false;
            for key in candidates {
                if ctx.free(&key) {
                    evicted += 1;
                    progressed = true;
                }
                if !ctx.accountant.exceeds(limit) {
                    break;
                }
            }
            if !progressed {
                log::warn!(
                    "Resource cache is over its limit ({} > {} bytes) but every entry is in use",
                    ctx.accountant.current(),
                    limit
                );
                break;
            }
        }

        if evicted > 0 {
            log::info!(
                "{} eviction freed {} entries; {} bytes in use",
                policy,
                evicted,
                ctx.accountant.current()
            );
        }
        evicted
    }

    /// Frees every unreferenced entry regardless of the limit.
    pub fn sweep(&self, ctx: EvictionContext<'_>) -> usize {
        ctx.registry
            .candidates_for(self.policy(), 0)
            .iter()
            .filter(|key| ctx.free(key))
            .count()
    }
}
