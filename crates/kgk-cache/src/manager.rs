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

//! The resource manager: one entry point over the per-type caches, eviction,
//! mounted bundles and hot reload.

use crate::accountant::MemoryAccountant;
use crate::eviction::{EvictionContext, EvictionStrategy};
use crate::executor::{PreloadExecutor, ThreadExecutor};
use crate::mounts::MountTable;
use crate::preload::{PreloadJob, PreloadProgress, PreloadReport};
use crate::record::{ResourceHandle, ResourceOrigin, ResourceRecord};
use crate::registry::MetadataRegistry;
use crate::reload::{ReloadBroadcaster, ReloadEvent};
use crate::stats::StatsCollector;
use crate::store::{CacheStores, Lookup};
use ahash::AHashMap;
use crossbeam_channel::{Receiver, Sender};
use kgk_core::{
    normalize_path, CacheKey, DecodeError, Decoded, EvictionPolicy, LoadOptions, ResourceError,
    ResourceLoader, ResourceManagerConfig, ResourceMetadata, ResourceResult, ResourceStats,
    ResourceType,
};
use kgk_io::{BundleContainer, BundleHeader, FileWatcher, WatchEvent, WatchEventKind};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Decodes `.kgkb` bytes into a [`BundleContainer`]; always registered.
struct BundleLoader;

impl ResourceLoader for BundleLoader {
    fn load(&self, bytes: &[u8], _options: &LoadOptions) -> Result<Decoded, DecodeError> {
        let bundle = BundleContainer::from_bytes(bytes.to_vec(), "cached bundle").map_err(
            |error| match error {
                ResourceError::InvalidFormat { reason, .. } => DecodeError::Malformed(reason),
                other => DecodeError::Other(Box::new(other)),
            },
        )?;
        let memory = bundle.memory_usage();
        Ok(Decoded::new(bundle, memory))
    }
}

fn forward_change(changes: &Sender<PathBuf>, event: &WatchEvent) {
    if event.kind != WatchEventKind::Removed {
        // The receiver lives as long as the manager that owns the watcher.
        let _ = changes.send(event.path.clone());
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Loads, caches, shares and reclaims resources.
///
/// All methods take `&self` and the manager is `Send + Sync`; wrap it in an
/// [`Arc`] to share it between threads (and to use
/// [`preload_async`](Self::preload_async)).
///
/// Every successful `load*` call takes one reference on the entry and must be
/// balanced by [`unload`](Self::unload) or [`release`](Self::release).
/// Unreferenced entries stay cached until a memory-limit pass, an explicit
/// [`gc`](Self::gc), or [`evict_to_limit`](Self::evict_to_limit) frees them.
pub struct ResourceManager {
    root_dir: PathBuf,
    auto_watch_loaded: bool,
    gc_on_clear: bool,
    loaders: RwLock<AHashMap<ResourceType, Arc<dyn ResourceLoader>>>,
    stores: CacheStores,
    registry: MetadataRegistry,
    accountant: MemoryAccountant,
    eviction: EvictionStrategy,
    mounts: MountTable,
    stats: StatsCollector,
    watcher: FileWatcher,
    hot_reload: AtomicBool,
    changes_tx: Sender<PathBuf>,
    changes_rx: Receiver<PathBuf>,
    reloads: ReloadBroadcaster,
    executor: Arc<dyn PreloadExecutor>,
}

impl ResourceManager {
    /// Creates a manager and mounts the bundles listed in `config`.
    pub fn new(config: ResourceManagerConfig) -> ResourceResult<Self> {
        let manager = Self::build(&config);
        for mount in &config.mounts {
            let path = config.resolve_mount_path(mount);
            manager.mount_bundle_file(&path, &mount.mount_point)?;
        }
        Ok(manager)
    }

    fn build(config: &ResourceManagerConfig) -> Self {
        let (changes_tx, changes_rx) = crossbeam_channel::unbounded();
        let mut loaders: AHashMap<ResourceType, Arc<dyn ResourceLoader>> = AHashMap::new();
        loaders.insert(ResourceType::Bundle, Arc::new(BundleLoader));

        log::info!(
            "Resource manager rooted at '{}' (limit: {} bytes, policy: {}, hot reload: {})",
            config.root_dir.display(),
            config.memory_limit,
            config.eviction_policy,
            config.hot_reload
        );

        Self {
            root_dir: config.root_dir.clone(),
            auto_watch_loaded: config.auto_watch_loaded,
            gc_on_clear: config.gc_on_clear,
            loaders: RwLock::new(loaders),
            stores: CacheStores::new(),
            registry: MetadataRegistry::new(),
            accountant: MemoryAccountant::new(config.memory_limit),
            eviction: EvictionStrategy::new(config.eviction_policy),
            mounts: MountTable::new(),
            stats: StatsCollector::default(),
            watcher: FileWatcher::new(),
            hot_reload: AtomicBool::new(config.hot_reload),
            changes_tx,
            changes_rx,
            reloads: ReloadBroadcaster::default(),
            executor: Arc::new(ThreadExecutor),
        }
    }

    /// Replaces the executor used by [`preload_async`](Self::preload_async).
    pub fn with_executor(mut self, executor: impl PreloadExecutor + 'static) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    /// The directory relative paths are resolved against.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Registers the decoder for `kind`, replacing any previous one.
    pub fn register_loader(&self, kind: ResourceType, loader: impl ResourceLoader + 'static) {
        let previous = self
            .loaders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, Arc::new(loader));
        if previous.is_some() {
            log::debug!("Replaced the {} loader", kind);
        }
    }

    fn loader(&self, kind: ResourceType) -> ResourceResult<Arc<dyn ResourceLoader>> {
        self.loaders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .ok_or_else(|| ResourceError::InvalidState(format!("no loader registered for {kind} resources")))
    }

    fn ctx(&self) -> EvictionContext<'_> {
        EvictionContext {
            stores: &self.stores,
            registry: &self.registry,
            accountant: &self.accountant,
        }
    }

    fn disk_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir.join(path)
        }
    }

    /// Reads `path` from the newest mounted bundle holding it, falling back to
    /// the filesystem under the root directory.
    fn resolve(&self, path: &str) -> ResourceResult<(Vec<u8>, ResourceOrigin)> {
        if let Some(found) = self.mounts.read(path) {
            let (bytes, mount_point, source) = found?;
            return Ok((bytes, ResourceOrigin::Bundle { mount_point, source }));
        }
        let disk = self.disk_path(path);
        let bytes = fs::read(&disk).map_err(|e| ResourceError::io(&disk, e))?;
        Ok((bytes, ResourceOrigin::File(disk)))
    }

    // --- Loading ---

    /// Returns the cached resource for (`kind`, `path`, `options`), loading
    /// it on first use. Takes one reference.
    ///
    /// Concurrent calls for the same key perform a single load and all
    /// receive the same handle. A failed load caches nothing.
    pub fn load(
        &self,
        kind: ResourceType,
        path: &str,
        options: &LoadOptions,
    ) -> ResourceResult<ResourceHandle> {
        let key = CacheKey::new(kind, path, options);
        if key.path().is_empty() {
            return Err(ResourceError::InvalidParameter("empty resource path".into()));
        }
        let loader = self.loader(kind)?;

        let lookup = self
            .stores
            .get(kind)
            .get_or_load(&key, || self.load_record(&key, options, loader.as_ref()));

        match lookup {
            Ok(Lookup::Hit(record)) => {
                self.registry.touch(&key);
                self.stats.record(|c| c.cache_hits += 1);
                log::trace!("Cache hit for '{}'", key);
                Ok(ResourceHandle::new(record))
            }
            Ok(Lookup::Miss(record)) => {
                self.stats.record(|c| c.cache_misses += 1);
                self.after_load(&record);
                Ok(ResourceHandle::new(record))
            }
            Err(error) => {
                self.stats.record(|c| {
                    c.cache_misses += 1;
                    c.load_failures += 1;
                });
                log::warn!("Failed to load '{}': {}", key, error);
                Err(error)
            }
        }
    }

    fn load_record(
        &self,
        key: &CacheKey,
        options: &LoadOptions,
        loader: &dyn ResourceLoader,
    ) -> ResourceResult<Arc<ResourceRecord>> {
        let (bytes, origin) = self.resolve(key.path())?;
        let decoded = loader
            .load(&bytes, options)
            .map_err(|e| e.into_resource_error(key))?;
        let (memory, gpu_memory) = (decoded.memory_usage(), decoded.gpu_memory_usage());

        let record = Arc::new(ResourceRecord::new(key.clone(), options.clone(), origin, decoded));
        self.registry.track(Arc::clone(&record));
        self.accountant.charge(memory, gpu_memory);
        log::debug!("Loaded '{}' ({} bytes, {:?})", key, memory, record.origin());
        Ok(record)
    }

    fn after_load(&self, record: &ResourceRecord) {
        if self.auto_watch_loaded && self.is_hot_reload_enabled() {
            if let ResourceOrigin::File(path) = record.origin() {
                self.watch_file(path);
            }
        }
        self.enforce_memory_limit();
    }

    /// Loads an image.
    pub fn load_image(&self, path: &str, options: &LoadOptions) -> ResourceResult<ResourceHandle> {
        self.load(ResourceType::Image, path, options)
    }

    /// Loads a font at `size`; each size is cached separately.
    pub fn load_font(
        &self,
        path: &str,
        size: u32,
        options: &LoadOptions,
    ) -> ResourceResult<ResourceHandle> {
        self.load(ResourceType::Font, path, &options.clone().with_font_size(size))
    }

    /// Loads an audio clip.
    pub fn load_audio(&self, path: &str, options: &LoadOptions) -> ResourceResult<ResourceHandle> {
        self.load(ResourceType::Audio, path, options)
    }

    /// Loads a shader.
    pub fn load_shader(&self, path: &str, options: &LoadOptions) -> ResourceResult<ResourceHandle> {
        self.load(ResourceType::Shader, path, options)
    }

    /// Loads a model.
    pub fn load_model(&self, path: &str, options: &LoadOptions) -> ResourceResult<ResourceHandle> {
        self.load(ResourceType::Model, path, options)
    }

    /// Loads `path` as the kind implied by its extension.
    pub fn load_by_extension(
        &self,
        path: &str,
        options: &LoadOptions,
    ) -> ResourceResult<ResourceHandle> {
        let kind = ResourceType::from_path(path).ok_or_else(|| {
            ResourceError::InvalidParameter(format!("cannot infer the resource type of '{path}'"))
        })?;
        self.load(kind, path, options)
    }

    // --- References ---

    /// Gives back one reference on the plain (no options) key for `path`.
    /// Returns whether the key was cached.
    pub fn unload(&self, kind: ResourceType, path: &str) -> bool {
        self.unload_key(&CacheKey::plain(kind, path))
    }

    /// Gives back one reference on the entry behind `handle`.
    pub fn release(&self, handle: &ResourceHandle) -> bool {
        self.unload_key(handle.key())
    }

    /// Gives back one reference on `key`. The count never drops below zero.
    pub fn unload_key(&self, key: &CacheKey) -> bool {
        match self.stores.get(key.resource_type()).release(key) {
            Some(remaining) => {
                log::trace!("Released '{}' ({} references left)", key, remaining);
                if remaining == 0 && self.accountant.is_over_limit() {
                    self.enforce_memory_limit();
                }
                true
            }
            None => false,
        }
    }

    /// Drops every reference on every entry. With `gc_on_clear` set the
    /// entries are freed right away; otherwise they wait for eviction.
    pub fn clear_cache(&self) {
        for store in self.stores.iter() {
            store.release_all();
        }
        log::info!("Released every cached resource");
        if self.gc_on_clear {
            self.gc();
        } else {
            self.enforce_memory_limit();
        }
    }

    // --- Memory ---

    /// Frees every unreferenced entry.
    pub fn gc(&self) -> usize {
        let freed = self.eviction.sweep(self.ctx());
        self.stats.record(|c| {
            c.gc_runs += 1;
            c.gc_freed += freed as u64;
        });
        log::info!("GC freed {} resources; {} bytes in use", freed, self.get_memory_usage());
        freed
    }

    /// Evicts unreferenced entries until usage is at or below `target` bytes.
    /// A target of 0 means unlimited and evicts nothing.
    pub fn evict_to_limit(&self, target: u64) -> usize {
        let evicted = self.eviction.enforce_limit(self.ctx(), target);
        if evicted > 0 {
            self.stats.record(|c| c.evictions += evicted as u64);
        }
        evicted
    }

    /// Evicts down to the configured limit.
    pub fn enforce_memory_limit(&self) -> usize {
        self.evict_to_limit(self.accountant.limit())
    }

    /// Sets the memory limit (0 = unlimited) and enforces it immediately.
    pub fn set_memory_limit(&self, bytes: u64) {
        self.accountant.set_limit(bytes);
        log::info!("Memory limit set to {} bytes", bytes);
        self.enforce_memory_limit();
    }

    /// The configured memory limit in bytes.
    pub fn memory_limit(&self) -> u64 {
        self.accountant.limit()
    }

    /// CPU bytes held by cached payloads.
    pub fn get_memory_usage(&self) -> u64 {
        self.accountant.current()
    }

    /// GPU bytes reported for cached payloads.
    pub fn get_gpu_memory_usage(&self) -> u64 {
        self.accountant.gpu_current()
    }

    /// Highest CPU usage since start-up or the last reset.
    pub fn peak_memory_usage(&self) -> u64 {
        self.accountant.peak()
    }

    /// Resets the CPU and GPU high-water marks to the current usage.
    pub fn reset_peak_memory(&self) {
        self.accountant.reset_peaks();
    }

    /// Switches the eviction policy.
    pub fn set_eviction_policy(&self, policy: EvictionPolicy) {
        self.eviction.set_policy(policy);
        log::info!("Eviction policy set to {}", policy);
    }

    /// The active eviction policy.
    pub fn eviction_policy(&self) -> EvictionPolicy {
        self.eviction.policy()
    }

    /// Records the GPU footprint of `handle`'s payload once it has been
    /// uploaded. Returns `false` if the entry is no longer cached.
    pub fn report_gpu_usage(&self, handle: &ResourceHandle, bytes: u64) -> bool {
        let record = handle.record();
        match self.registry.set_gpu_memory_usage(record, bytes) {
            Some(previous) => {
                record.set_gpu_memory_usage(bytes);
                self.accountant.adjust((0, previous), (0, bytes));
                true
            }
            None => false,
        }
    }

    // --- Queries ---

    /// Whether the plain key for `path` is cached. Never triggers a load.
    pub fn is_cached(&self, kind: ResourceType, path: &str) -> bool {
        self.stores.get(kind).is_cached(&CacheKey::plain(kind, path))
    }

    /// The cached handle for the plain key of `path`, without taking a
    /// reference. Never triggers a load.
    pub fn get_cached(&self, kind: ResourceType, path: &str) -> Option<ResourceHandle> {
        self.stores
            .get(kind)
            .get_cached(&CacheKey::plain(kind, path))
            .map(ResourceHandle::new)
    }

    /// Bookkeeping for the plain key of `path`.
    pub fn metadata(&self, kind: ResourceType, path: &str) -> Option<ResourceMetadata> {
        self.registry.metadata(&CacheKey::plain(kind, path))
    }

    /// Sorted cache keys of every entry of `kind`.
    pub fn cached_keys(&self, kind: ResourceType) -> Vec<String> {
        self.stores.get(kind).keys()
    }

    /// Number of cached entries across all kinds.
    pub fn resource_count(&self) -> usize {
        self.stores.iter().map(|store| store.len()).sum()
    }

    /// A snapshot of memory, per-kind counts, counters and mounts.
    pub fn stats(&self) -> ResourceStats {
        let counters = self.stats.snapshot();
        let mounts = self.mounts.summary();
        let mut stats = ResourceStats {
            total_memory: self.accountant.current(),
            peak_memory: self.accountant.peak(),
            gpu_memory: self.accountant.gpu_current(),
            peak_gpu_memory: self.accountant.gpu_peak(),
            memory_limit: self.accountant.limit(),
            memory_usage_percent: self.accountant.usage_percent(),
            cache_hits: counters.cache_hits,
            cache_misses: counters.cache_misses,
            load_failures: counters.load_failures,
            evictions: counters.evictions,
            gc_runs: counters.gc_runs,
            gc_freed: counters.gc_freed,
            hot_reloads: counters.hot_reloads,
            hot_reload_failures: counters.hot_reload_failures,
            bundles_mounted: mounts.bundles,
            bundle_entries: mounts.entries,
            bundle_bytes: mounts.bytes,
            ..ResourceStats::default()
        };
        for kind in ResourceType::ALL {
            stats.set_count(kind, self.stores.get(kind).len());
        }
        stats
    }

    /// Zeroes the event counters and resets the peaks.
    pub fn reset_stats(&self) {
        self.stats.reset();
        self.accountant.reset_peaks();
    }

    // --- Preloading ---

    fn warm(&self, path: &str) -> ResourceResult<()> {
        let handle = self.load_by_extension(path, &LoadOptions::default())?;
        self.release(&handle);
        Ok(())
    }

    /// Loads every path into the cache on the calling thread, reporting
    /// progress after each one. Entries are left unreferenced, ready for
    /// later `load*` calls to hit.
    pub fn preload<S: AsRef<str>>(
        &self,
        paths: &[S],
        mut progress: impl FnMut(&PreloadProgress),
    ) -> PreloadReport {
        let total = paths.len();
        let mut report = PreloadReport::default();
        for (index, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let error = self.warm(path).err();
            progress(&PreloadProgress {
                path: path.to_owned(),
                completed: index + 1,
                total,
                error: error.clone(),
            });
            report.push(path.to_owned(), error);
        }
        log::info!("Preloaded {} of {} resources", report.loaded, total);
        report
    }

    /// Like [`preload`](Self::preload), but each path runs as a task on the
    /// manager's executor. `progress` may be called from any thread.
    pub fn preload_async<I, S, F>(self: &Arc<Self>, paths: I, progress: F) -> PreloadJob
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&PreloadProgress) + Send + Sync + 'static,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        let total = paths.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let progress = Arc::new(progress);

        for path in paths {
            let manager = Arc::clone(self);
            let completed = Arc::clone(&completed);
            let results_tx = results_tx.clone();
            let progress = Arc::clone(&progress);
            self.executor.execute(Box::new(move || {
                let error = manager.warm(&path).err();
                let done = completed.fetch_add(1, Ordering::AcqRel) + 1;
                (*progress)(&PreloadProgress {
                    path: path.clone(),
                    completed: done,
                    total,
                    error: error.clone(),
                });
                let _ = results_tx.send((path, error));
            }));
        }

        PreloadJob::new(total, completed, results_rx)
    }

    // --- Hot reload ---

    /// Turns hot reload on or off. While off, [`update_hot_reload`](Self::update_hot_reload)
    /// does nothing and loaded files are not watched.
    pub fn enable_hot_reload(&self, enabled: bool) {
        self.hot_reload.store(enabled, Ordering::Release);
        log::info!("Hot reload {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Whether hot reload is on.
    pub fn is_hot_reload_enabled(&self) -> bool {
        self.hot_reload.load(Ordering::Acquire)
    }

    fn watch_file(&self, path: &Path) {
        if self.watcher.is_watching(path) {
            return;
        }
        let changes = self.changes_tx.clone();
        if let Err(e) = self
            .watcher
            .watch_file(path, move |event| forward_change(&changes, event))
        {
            log::warn!("Could not watch '{}': {}", path.display(), e);
        }
    }

    /// Watches `dir` (relative to the root directory) and everything below it.
    pub fn watch_directory(&self, dir: impl AsRef<Path>) -> ResourceResult<()> {
        let dir = self.disk_path(dir);
        let changes = self.changes_tx.clone();
        self.watcher
            .watch_directory(&dir, true, move |event| forward_change(&changes, event))?;
        log::info!("Watching '{}' for changes", dir.display());
        Ok(())
    }

    /// Stops watching `dir`.
    pub fn unwatch_directory(&self, dir: impl AsRef<Path>) -> bool {
        self.watcher.unwatch_directory(self.disk_path(dir))
    }

    /// Polls the watched paths and reloads every cached entry whose file
    /// changed. Returns the number of entries reloaded successfully.
    pub fn update_hot_reload(&self) -> usize {
        if !self.is_hot_reload_enabled() {
            return 0;
        }
        self.watcher.update();

        let changed: BTreeSet<PathBuf> = self.changes_rx.try_iter().collect();
        let mut reloaded = 0;
        for path in &changed {
            for record in self.records_from_file(path) {
                if self.reload_record(&record, Some(path)).is_ok() {
                    reloaded += 1;
                }
            }
        }
        reloaded
    }

    fn records_from_file(&self, path: &Path) -> Vec<Arc<ResourceRecord>> {
        self.stores
            .iter()
            .flat_map(|store| store.records())
            .filter(|record| matches!(record.origin(), ResourceOrigin::File(p) if same_file(p, path)))
            .collect()
    }

    /// Re-reads and re-decodes every cached entry for `path` (all kinds and
    /// option variants), swapping the payload in place. Returns how many
    /// entries were reloaded.
    ///
    /// Fails with `InvalidState` if nothing cached comes from `path`, or with
    /// the decode error if every reload failed.
    pub fn reload_resource(&self, path: &str) -> ResourceResult<usize> {
        let path = normalize_path(path);
        let records: Vec<_> = self
            .stores
            .iter()
            .flat_map(|store| store.records())
            .filter(|record| record.key().path() == path)
            .collect();
        if records.is_empty() {
            return Err(ResourceError::InvalidState(format!("'{path}' is not cached")));
        }

        let mut reloaded = 0;
        let mut last_error = None;
        for record in &records {
            match self.reload_record(record, None) {
                Ok(()) => reloaded += 1,
                Err(error) => last_error = Some(error),
            }
        }
        match last_error {
            Some(error) if reloaded == 0 => Err(error),
            _ => Ok(reloaded),
        }
    }

    fn reload_record(&self, record: &ResourceRecord, trigger: Option<&Path>) -> ResourceResult<()> {
        let key = record.key();
        let decoded = self.loader(key.resource_type()).and_then(|loader| {
            let bytes = match (trigger, record.origin()) {
                // A file change reloads from that file, even if a bundle now shadows it.
                (Some(_), ResourceOrigin::File(path)) => {
                    fs::read(path).map_err(|e| ResourceError::io(path, e))?
                }
                _ => self.resolve(key.path())?.0,
            };
            loader
                .load(&bytes, record.options())
                .map_err(|e| e.into_resource_error(key))
        });

        let error = match decoded {
            Ok(decoded) => {
                let new = (decoded.memory_usage(), decoded.gpu_memory_usage());
                record.replace_payload(decoded);
                if let Some(old) = self.registry.update_size(record, new.0, new.1) {
                    self.accountant.adjust(old, new);
                }
                self.stats.record(|c| c.hot_reloads += 1);
                log::info!("Reloaded '{}'", key);
                None
            }
            Err(error) => {
                self.stats.record(|c| c.hot_reload_failures += 1);
                log::warn!("Reload of '{}' failed, keeping the previous version: {}", key, error);
                Some(error)
            }
        };

        self.reloads.send(ReloadEvent {
            key: key.clone(),
            path: trigger.map(Path::to_path_buf),
            error: error.clone(),
        });

        match error {
            None => {
                self.enforce_memory_limit();
                Ok(())
            }
            Some(error) => Err(error),
        }
    }

    /// Receives a [`ReloadEvent`] for every reload attempt from now on.
    pub fn subscribe_reloads(&self) -> Receiver<ReloadEvent> {
        self.reloads.subscribe()
    }

    // --- Bundles ---

    /// Loads (and caches) a bundle file; the payload is a [`BundleContainer`].
    pub fn load_bundle(&self, path: &str) -> ResourceResult<ResourceHandle> {
        self.load(ResourceType::Bundle, path, &LoadOptions::default())
    }

    /// Packs every file under `source_dir` into a bundle at `output`.
    pub fn create_bundle(
        &self,
        source_dir: impl AsRef<Path>,
        output: impl AsRef<Path>,
        compress: bool,
    ) -> ResourceResult<BundleHeader> {
        let source_dir = self.disk_path(source_dir);
        let output = self.disk_path(output);

        let mut bundle = BundleContainer::new();
        let added = bundle.add_directory(&source_dir, "")?;
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| ResourceError::io(parent, e))?;
        }
        let header = bundle.save(&output, compress)?;
        log::info!(
            "Packed {} files from '{}' into '{}' ({} bytes)",
            added,
            source_dir.display(),
            output.display(),
            header.total_size
        );
        Ok(header)
    }

    /// Mounts `bundle` so that its entry `x` resolves as `<mount_point>/x`
    /// ahead of the filesystem. Later mounts shadow earlier ones.
    pub fn mount_bundle(&self, bundle: Arc<BundleContainer>, mount_point: &str) {
        self.mounts.mount(bundle, mount_point);
    }

    /// Opens the bundle at `path` (entries are read on demand) and mounts it.
    pub fn mount_bundle_file(&self, path: impl AsRef<Path>, mount_point: &str) -> ResourceResult<()> {
        let bundle = BundleContainer::open(self.disk_path(path))?;
        self.mount_bundle(Arc::new(bundle), mount_point);
        Ok(())
    }

    /// Unmounts every bundle at `mount_point`. Already cached entries are
    /// unaffected.
    pub fn unmount_bundle(&self, mount_point: &str) -> bool {
        let removed = self.mounts.unmount(mount_point);
        if removed > 0 {
            log::info!("Unmounted {} bundle(s) from '{}'", removed, mount_point);
        }
        removed > 0
    }

    /// Whether a mounted bundle holds `path`.
    pub fn exists_in_bundle(&self, path: &str) -> bool {
        self.mounts.contains(path)
    }

    /// Raw, verified bytes of `path` from the newest mounted bundle holding it.
    pub fn get_bundle_data(&self, path: &str) -> ResourceResult<Vec<u8>> {
        match self.mounts.read(path) {
            Some(found) => found.map(|(bytes, _, _)| bytes),
            None => Err(ResourceError::FileNotFound {
                path: normalize_path(path),
            }),
        }
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::build(&ResourceManagerConfig::default())
    }
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("root_dir", &self.root_dir)
            .field("resources", &self.resource_count())
            .field("memory", &self.accountant.current())
            .field("limit", &self.accountant.limit())
            .field("policy", &self.eviction.policy())
            .field("hot_reload", &self.is_hot_reload_enabled())
            .finish_non_exhaustive()
    }
}
