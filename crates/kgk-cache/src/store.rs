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

//! Per-type cache store with single-flight loading.

use crate::record::ResourceRecord;
use ahash::AHashMap;
use kgk_core::{CacheKey, ResourceError, ResourceResult, ResourceType};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Outcome of [`CacheStore::get_or_load`].
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The key was already cached (or was loaded by a concurrent caller).
    Hit(Arc<ResourceRecord>),
    /// This call ran the load.
    Miss(Arc<ResourceRecord>),
}

impl Lookup {
    /// The record, regardless of how it was obtained.
    pub fn record(&self) -> &Arc<ResourceRecord> {
        match self {
            Lookup::Hit(record) | Lookup::Miss(record) => record,
        }
    }

    /// Whether this call ran the load.
    pub fn is_miss(&self) -> bool {
        matches!(self, Lookup::Miss(_))
    }
}

/// A load in progress. Concurrent requesters for the same key block here.
struct InFlight {
    outcome: Mutex<Option<ResourceResult<()>>>,
    done: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn finish(&self, outcome: ResourceResult<()>) {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(outcome);
        self.done.notify_all();
    }

    fn wait(&self) -> ResourceResult<()> {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self.done.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

enum Slot {
    Ready(Arc<ResourceRecord>),
    Loading(Arc<InFlight>),
}

/// Removes a `Loading` slot and wakes its waiters if the loading caller
/// unwinds before publishing a result.
struct FlightGuard<'a> {
    store: &'a CacheStore,
    key: &'a str,
    flight: Arc<InFlight>,
    armed: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.write().remove(self.key);
            self.flight.finish(Err(ResourceError::InvalidState(format!(
                "load of '{}' was abandoned",
                self.key
            ))));
        }
    }
}

/// The cache for one [`ResourceType`].
///
/// Every key maps to at most one record. Loads are single-flight: the first
/// requester of a missing key runs the load while later requesters block on
/// the in-flight entry, then all of them share the result. A failed load
/// leaves no entry behind.
pub struct CacheStore {
    resource_type: ResourceType,
    slots: RwLock<AHashMap<String, Slot>>,
}

impl CacheStore {
    /// Creates an empty store for `resource_type`.
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            slots: RwLock::new(AHashMap::new()),
        }
    }

    /// The kind of resource this store holds.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    fn read(&self) -> RwLockReadGuard<'_, AHashMap<String, Slot>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AHashMap<String, Slot>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached record for `key`, taking a reference, or runs `load`
    /// to create it.
    ///
    /// `load` runs without any store lock held and must return a record that
    /// already carries the caller's reference. It is called at most once.
    pub fn get_or_load<F>(&self, key: &CacheKey, load: F) -> ResourceResult<Lookup>
    where
        F: FnOnce() -> ResourceResult<Arc<ResourceRecord>>,
    {
        let mut load = Some(load);
        loop {
            let pending = match self.read().get(key.as_str()) {
                Some(Slot::Ready(record)) => {
                    record.acquire();
                    return Ok(Lookup::Hit(Arc::clone(record)));
                }
                Some(Slot::Loading(flight)) => Some(Arc::clone(flight)),
                None => None,
            };

            if let Some(flight) = pending {
                log::trace!("Waiting for in-flight load of '{}'", key);
                flight.wait()?;
                continue;
            }

            let flight = {
                let mut slots = self.write();
                if slots.contains_key(key.as_str()) {
                    // Another caller got here between the two locks.
                    continue;
                }
                let flight = Arc::new(InFlight::new());
                slots.insert(key.as_str().to_owned(), Slot::Loading(Arc::clone(&flight)));
                flight
            };

            let mut guard = FlightGuard {
                store: self,
                key: key.as_str(),
                flight: Arc::clone(&flight),
                armed: true,
            };

            let result = match load.take() {
                Some(load) => load(),
                None => Err(ResourceError::InvalidState(format!(
                    "loader for '{}' already consumed",
                    key
                ))),
            };
            guard.armed = false;

            return match result {
                Ok(record) => {
                    self.write()
                        .insert(key.as_str().to_owned(), Slot::Ready(Arc::clone(&record)));
                    flight.finish(Ok(()));
                    Ok(Lookup::Miss(record))
                }
                Err(error) => {
                    self.write().remove(key.as_str());
                    flight.finish(Err(error.clone()));
                    Err(error)
                }
            };
        }
    }

    /// Whether `key` has a finished record. Never blocks on a load.
    pub fn is_cached(&self, key: &CacheKey) -> bool {
        matches!(self.read().get(key.as_str()), Some(Slot::Ready(_)))
    }

    /// The finished record for `key`, without taking a reference.
    pub fn get_cached(&self, key: &CacheKey) -> Option<Arc<ResourceRecord>> {
        match self.read().get(key.as_str()) {
            Some(Slot::Ready(record)) => Some(Arc::clone(record)),
            _ => None,
        }
    }

    /// Drops one reference on `key`. Returns the remaining count, or `None`
    /// if the key is not cached.
    pub fn release(&self, key: &CacheKey) -> Option<usize> {
        match self.read().get(key.as_str()) {
            Some(Slot::Ready(record)) => Some(record.release()),
            _ => None,
        }
    }

    /// Drops every reference on every record.
    pub fn release_all(&self) {
        for slot in self.read().values() {
            if let Slot::Ready(record) = slot {
                record.release_all();
            }
        }
    }

    /// Removes `key` if it is cached and unreferenced.
    ///
    /// The reference count is checked under the write lock, so a concurrent
    /// hit either lands first (and the record stays) or finds the key gone.
    /// `on_remove` runs before the lock is released.
    pub fn remove_if_unpinned<R>(
        &self,
        key: &CacheKey,
        on_remove: impl FnOnce(&ResourceRecord) -> R,
    ) -> Option<(Arc<ResourceRecord>, R)> {
        let mut slots = self.write();
        match slots.get(key.as_str()) {
            Some(Slot::Ready(record)) if !record.is_pinned() => {}
            _ => return None,
        }
        match slots.remove(key.as_str()) {
            Some(Slot::Ready(record)) => {
                record.mark_unloaded();
                // Still under the write lock, so no new load of `key` can start.
                let removed = on_remove(&record);
                Some((record, removed))
            }
            _ => None,
        }
    }

    /// Every finished record.
    pub fn records(&self) -> Vec<Arc<ResourceRecord>> {
        self.read()
            .values()
            .filter_map(|slot| match slot {
                Slot::Ready(record) => Some(Arc::clone(record)),
                Slot::Loading(_) => None,
            })
            .collect()
    }

    /// Sorted keys of every finished record.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .read()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of finished records.
    pub fn len(&self) -> usize {
        self.read()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Whether the store holds no finished records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One [`CacheStore`] per resource type.
pub struct CacheStores {
    stores: Vec<CacheStore>,
}

impl CacheStores {
    /// Creates an empty store for every resource type.
    pub fn new() -> Self {
        Self {
            stores: ResourceType::ALL.iter().map(|&kind| CacheStore::new(kind)).collect(),
        }
    }

    /// The store for `kind`.
    pub fn get(&self, kind: ResourceType) -> &CacheStore {
        &self.stores[kind.index()]
    }

    /// Iterates over all stores.
    pub fn iter(&self) -> impl Iterator<Item = &CacheStore> {
        self.stores.iter()
    }
}

impl Default for CacheStores {
    fn default() -> Self {
        Self::new()
    }
}
