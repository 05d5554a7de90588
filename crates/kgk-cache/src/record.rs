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

//! Cached resource slots and the handles that point at them.

use kgk_core::{CacheKey, Decoded, LoadOptions, ResourceType};
use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

/// Where a record's bytes were resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceOrigin {
    /// A file on disk.
    File(PathBuf),
    /// An entry of a mounted bundle.
    Bundle {
        /// The mount point the entry was found under.
        mount_point: String,
        /// The bundle's own source (usually its file path).
        source: String,
    },
}

/// One cached resource.
///
/// The record is the stable "slot" every handle points at: a hot reload swaps
/// the payload inside it, so outstanding handles observe the new content
/// without being reissued.
pub struct ResourceRecord {
    key: CacheKey,
    options: LoadOptions,
    origin: ResourceOrigin,
    payload: RwLock<Decoded>,
    ref_count: AtomicUsize,
    loaded: AtomicBool,
    load_time: Instant,
    last_access: Mutex<Instant>,
}

impl ResourceRecord {
    /// Creates a record holding one reference for the caller that loaded it.
    pub fn new(key: CacheKey, options: LoadOptions, origin: ResourceOrigin, payload: Decoded) -> Self {
        let now = Instant::now();
        Self {
            key,
            options,
            origin,
            payload: RwLock::new(payload),
            ref_count: AtomicUsize::new(1),
            loaded: AtomicBool::new(true),
            load_time: now,
            last_access: Mutex::new(now),
        }
    }

    /// The cache key.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// The options the record was loaded with; reused on reload.
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Where the bytes came from.
    pub fn origin(&self) -> &ResourceOrigin {
        &self.origin
    }

    /// Adds a reference and refreshes the access time. Returns the new count.
    pub fn acquire(&self) -> usize {
        *self.last_access.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
        self.ref_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drops a reference, never going below zero. Returns the new count.
    pub fn release(&self) -> usize {
        match self
            .ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => 0,
        }
    }

    /// Drops every reference.
    pub fn release_all(&self) {
        self.ref_count.store(0, Ordering::Release);
    }

    /// Current number of outstanding references.
    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Acquire)
    }

    /// Whether the record is referenced and therefore ineligible for eviction.
    pub fn is_pinned(&self) -> bool {
        self.ref_count() > 0
    }

    /// A clone of the current payload.
    pub fn payload(&self) -> Decoded {
        self.payload
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps in a freshly decoded payload, returning the previous one.
    pub fn replace_payload(&self, payload: Decoded) -> Decoded {
        let mut slot = self.payload.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, payload)
    }

    /// Updates the GPU footprint, returning the previous value.
    pub fn set_gpu_memory_usage(&self, bytes: u64) -> u64 {
        let mut slot = self.payload.write().unwrap_or_else(PoisonError::into_inner);
        let previous = slot.gpu_memory_usage();
        *slot = slot.clone().with_gpu_memory(bytes);
        previous
    }

    /// Marks the record as no longer cached.
    pub fn mark_unloaded(&self) {
        self.loaded.store(false, Ordering::Release);
    }

    /// Whether the record is still in the cache.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// When the record was first loaded.
    pub fn load_time(&self) -> Instant {
        self.load_time
    }

    /// When the record was last loaded or acquired.
    pub fn last_access_time(&self) -> Instant {
        *self.last_access.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRecord")
            .field("key", &self.key)
            .field("origin", &self.origin)
            .field("ref_count", &self.ref_count())
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

/// A thread-safe, type-tagged handle to a cached resource.
///
/// Cloning a handle is cheap and shares the same record. It does not take a
/// new reference: references are taken by the manager's `load*` calls and
/// given back with `unload`/`release`.
#[derive(Clone)]
pub struct ResourceHandle(Arc<ResourceRecord>);

impl ResourceHandle {
    pub(crate) fn new(record: Arc<ResourceRecord>) -> Self {
        Self(record)
    }

    pub(crate) fn record(&self) -> &Arc<ResourceRecord> {
        &self.0
    }

    /// The cache key.
    pub fn key(&self) -> &CacheKey {
        self.0.key()
    }

    /// The resource kind.
    pub fn resource_type(&self) -> ResourceType {
        self.0.key().resource_type()
    }

    /// Where the bytes came from.
    pub fn origin(&self) -> &ResourceOrigin {
        self.0.origin()
    }

    /// The current payload, downcast to `T`.
    ///
    /// Each call reads the record afresh, so the result reflects the latest
    /// hot reload.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.payload().downcast::<T>()
    }

    /// The current type-erased payload.
    pub fn payload(&self) -> Decoded {
        self.0.payload()
    }

    /// Outstanding references on the record.
    pub fn ref_count(&self) -> usize {
        self.0.ref_count()
    }

    /// CPU bytes of the current payload.
    pub fn memory_usage(&self) -> u64 {
        self.0.payload().memory_usage()
    }

    /// GPU bytes of the current payload.
    pub fn gpu_memory_usage(&self) -> u64 {
        self.0.payload().gpu_memory_usage()
    }

    /// Whether the record is still cached.
    pub fn is_loaded(&self) -> bool {
        self.0.is_loaded()
    }

    /// When the record was first loaded.
    pub fn load_time(&self) -> Instant {
        self.0.load_time()
    }

    /// When the record was last loaded or acquired.
    pub fn last_access_time(&self) -> Instant {
        self.0.last_access_time()
    }

    /// Whether two handles share the same record.
    pub fn ptr_eq(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourceHandle").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ResourceRecord {
        ResourceRecord::new(
            CacheKey::plain(ResourceType::Image, "a.png"),
            LoadOptions::default(),
            ResourceOrigin::File(PathBuf::from("a.png")),
            Decoded::new(String::from("v1"), 2),
        )
    }

    #[test]
    fn ref_count_never_goes_negative() {
        let record = record();
        assert_eq!(record.ref_count(), 1);
        assert_eq!(record.acquire(), 2);
        assert_eq!(record.release(), 1);
        assert_eq!(record.release(), 0);
        assert_eq!(record.release(), 0);
        assert!(!record.is_pinned());
    }

    #[test]
    fn payload_swap_is_visible_through_every_handle() {
        let handle = ResourceHandle::new(Arc::new(record()));
        let other = handle.clone();

        let old = handle
            .record()
            .replace_payload(Decoded::new(String::from("v2"), 5));
        assert_eq!(old.memory_usage(), 2);
        assert_eq!(other.get::<String>().unwrap().as_str(), "v2");
        assert_eq!(other.memory_usage(), 5);
        assert!(handle.ptr_eq(&other));
    }

    #[test]
    fn gpu_usage_can_be_reported_later() {
        let record = record();
        assert_eq!(record.set_gpu_memory_usage(64), 0);
        assert_eq!(record.payload().gpu_memory_usage(), 64);
        assert_eq!(record.payload().memory_usage(), 2);
    }
}
