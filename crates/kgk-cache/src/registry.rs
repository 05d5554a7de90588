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

use crate::record::ResourceRecord;
use ahash::AHashMap;
use kgk_core::{CacheKey, EvictionPolicy, ResourceMetadata, ResourceType};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

struct RegistryEntry {
    record: Arc<ResourceRecord>,
    memory_usage: u64,
    gpu_memory_usage: u64,
    load_time: Instant,
    last_access_time: Instant,
    load_tick: u64,
    access_tick: u64,
    access_count: u64,
}

impl RegistryEntry {
    fn tracks(&self, record: &ResourceRecord) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.record), record)
    }

    fn metadata(&self) -> ResourceMetadata {
        ResourceMetadata {
            key: self.record.key().as_str().to_owned(),
            resource_type: self.record.key().resource_type(),
            memory_usage: self.memory_usage,
            gpu_memory_usage: self.gpu_memory_usage,
            last_access_time: self.last_access_time,
            load_time: self.load_time,
            access_count: self.access_count,
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    // Logical clock; wall-clock instants can tie within one tick.
    clock: u64,
    entries: AHashMap<CacheKey, RegistryEntry>,
}

impl RegistryInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Bookkeeping for every cached key: sizes, access recency and frequency.
///
/// The registry has its own lock and never calls back into a store, so it can
/// be used while no store lock is held.
#[derive(Default)]
pub struct MetadataRegistry {
    inner: Mutex<RegistryInner>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking a freshly loaded record, sized from its payload.
    pub fn track(&self, record: Arc<ResourceRecord>) {
        let payload = record.payload();
        let now = Instant::now();
        let mut inner = self.lock();
        let tick = inner.tick();
        let key = record.key().clone();
        let entry = RegistryEntry {
            record,
            memory_usage: payload.memory_usage(),
            gpu_memory_usage: payload.gpu_memory_usage(),
            load_time: now,
            last_access_time: now,
            load_tick: tick,
            access_tick: tick,
            access_count: 1,
        };
        if inner.entries.insert(key.clone(), entry).is_some() {
            log::warn!("Registry entry for '{}' replaced while still tracked", key);
        }
    }

    /// Stops tracking `record`, returning its final metadata.
    ///
    /// Nothing happens if the key is now tracked for a different record.
    pub fn untrack(&self, record: &ResourceRecord) -> Option<ResourceMetadata> {
        let mut inner = self.lock();
        match inner.entries.get(record.key()) {
            Some(entry) if entry.tracks(record) => {}
            _ => return None,
        }
        inner.entries.remove(record.key()).map(|entry| entry.metadata())
    }

    /// Records an access on `key`.
    pub fn touch(&self, key: &CacheKey) {
        let mut inner = self.lock();
        let tick = inner.tick();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.access_tick = tick;
            entry.access_count += 1;
            entry.last_access_time = Instant::now();
        }
    }

    /// Replaces the recorded sizes of `record`, returning the previous
    /// `(memory, gpu_memory)` pair, or `None` if it is not the tracked record.
    pub fn update_size(&self, record: &ResourceRecord, memory: u64, gpu_memory: u64) -> Option<(u64, u64)> {
        self.lock()
            .entries
            .get_mut(record.key())
            .filter(|entry| entry.tracks(record))
            .map(|entry| {
                let previous = (entry.memory_usage, entry.gpu_memory_usage);
                entry.memory_usage = memory;
                entry.gpu_memory_usage = gpu_memory;
                previous
            })
    }

    /// Replaces the recorded GPU size of `record`, returning the previous one.
    pub fn set_gpu_memory_usage(&self, record: &ResourceRecord, gpu_memory: u64) -> Option<u64> {
        self.lock()
            .entries
            .get_mut(record.key())
            .filter(|entry| entry.tracks(record))
            .map(|entry| std::mem::replace(&mut entry.gpu_memory_usage, gpu_memory))
    }

    /// Current metadata for `key`.
    pub fn metadata(&self, key: &CacheKey) -> Option<ResourceMetadata> {
        self.lock().entries.get(key).map(RegistryEntry::metadata)
    }

    /// Whether `key` is tracked.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Unreferenced keys in the order `policy` would evict them, trimmed to
    /// the shortest prefix whose sizes add up to `bytes_to_free`.
    ///
    /// With `bytes_to_free == 0` the whole ordered list is returned. Pinned
    /// keys are never included.
    pub fn candidates_for(&self, policy: EvictionPolicy, bytes_to_free: u64) -> Vec<CacheKey> {
        let inner = self.lock();
        let mut unpinned: Vec<(&CacheKey, &RegistryEntry)> = inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.record.is_pinned())
            .collect();

        match policy {
            EvictionPolicy::Lru => unpinned.sort_by_key(|(key, e)| (e.access_tick, *key)),
            EvictionPolicy::Lfu => {
                unpinned.sort_by_key(|(key, e)| (e.access_count, e.access_tick, *key))
            }
            EvictionPolicy::Fifo => unpinned.sort_by_key(|(key, e)| (e.load_tick, *key)),
        }

        if bytes_to_free == 0 {
            return unpinned.into_iter().map(|(key, _)| key.clone()).collect();
        }

        let mut freed = 0u64;
        let mut selected = Vec::new();
        for (key, entry) in unpinned {
            if freed >= bytes_to_free {
                break;
            }
            freed = freed.saturating_add(entry.memory_usage);
            selected.push(key.clone());
        }
        selected
    }

    /// Sum of tracked CPU bytes.
    pub fn total_memory(&self) -> u64 {
        self.lock().entries.values().map(|e| e.memory_usage).sum()
    }

    /// Number of tracked keys of `kind`.
    pub fn count(&self, kind: ResourceType) -> usize {
        self.lock()
            .entries
            .keys()
            .filter(|key| key.resource_type() == kind)
            .count()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
