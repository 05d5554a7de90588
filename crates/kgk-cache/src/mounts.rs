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

use kgk_core::{normalize_path, ResourceResult};
use kgk_io::BundleContainer;
use std::sync::{Arc, PoisonError, RwLock};

struct Mount {
    mount_point: String,
    bundle: Arc<BundleContainer>,
}

impl Mount {
    /// The bundle-relative path for `path`, if it lies under this mount.
    fn relative<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.mount_point.is_empty() {
            return Some(path);
        }
        path.strip_prefix(self.mount_point.as_str())?
            .strip_prefix('/')
    }
}

/// Summary of the mounted bundles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountSummary {
    /// Number of mounts.
    pub bundles: usize,
    /// Entries across all mounts.
    pub entries: usize,
    /// Stored bytes across all mounts.
    pub bytes: u64,
}

/// Bundles mounted into the virtual path space.
///
/// Lookups walk the mounts newest first, so a later mount shadows earlier
/// ones for the paths they share.
#[derive(Default)]
pub struct MountTable {
    mounts: RwLock<Vec<Mount>>,
}

impl MountTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `bundle` so its entry `x` resolves as `<mount_point>/x`.
    pub fn mount(&self, bundle: Arc<BundleContainer>, mount_point: &str) {
        let mount_point = normalize_path(mount_point);
        log::info!(
            "Mounted bundle '{}' ({} entries) at '{}'",
            bundle.source(),
            bundle.file_count(),
            mount_point
        );
        self.mounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Mount {
                mount_point,
                bundle,
            });
    }

    /// Removes every bundle mounted at `mount_point`. Returns how many were
    /// removed.
    pub fn unmount(&self, mount_point: &str) -> usize {
        let mount_point = normalize_path(mount_point);
        let mut mounts = self.mounts.write().unwrap_or_else(PoisonError::into_inner);
        let before = mounts.len();
        mounts.retain(|m| m.mount_point != mount_point);
        before - mounts.len()
    }

    /// The newest bundle holding `path`, with the mount point it was found
    /// under and the bundle-relative path.
    pub fn find(&self, path: &str) -> Option<(Arc<BundleContainer>, String, String)> {
        let path = normalize_path(path);
        let mounts = self.mounts.read().unwrap_or_else(PoisonError::into_inner);
        mounts.iter().rev().find_map(|mount| {
            let relative = mount.relative(&path)?;
            mount.bundle.contains(relative).then(|| {
                (
                    Arc::clone(&mount.bundle),
                    mount.mount_point.clone(),
                    relative.to_owned(),
                )
            })
        })
    }

    /// Whether any mounted bundle holds `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Reads `path` from the newest bundle holding it, or `None` if no mount
    /// has it.
    pub fn read(&self, path: &str) -> Option<ResourceResult<(Vec<u8>, String, String)>> {
        let (bundle, mount_point, relative) = self.find(path)?;
        Some(
            bundle
                .get_data(&relative)
                .map(|bytes| (bytes, mount_point, bundle.source().to_owned())),
        )
    }

    /// Counts of mounts, entries and stored bytes.
    pub fn summary(&self) -> MountSummary {
        let mounts = self.mounts.read().unwrap_or_else(PoisonError::into_inner);
        mounts.iter().fold(MountSummary::default(), |acc, m| MountSummary {
            bundles: acc.bundles + 1,
            entries: acc.entries + m.bundle.file_count(),
            bytes: acc.bytes + m.bundle.stored_size(),
        })
    }

    /// Mount points, newest first.
    pub fn mount_points(&self) -> Vec<String> {
        let mounts = self.mounts.read().unwrap_or_else(PoisonError::into_inner);
        mounts.iter().rev().map(|m| m.mount_point.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(files: &[(&str, &[u8])]) -> Arc<BundleContainer> {
        let mut writer = BundleContainer::new();
        for (path, bytes) in files {
            writer.add_data(path, bytes.to_vec()).unwrap();
        }
        let bytes = writer.to_bytes(false).unwrap();
        Arc::new(BundleContainer::from_bytes(bytes, "test.kgkb").unwrap())
    }

    #[test]
    fn paths_resolve_under_their_mount_point() {
        let table = MountTable::new();
        table.mount(bundle(&[("hero.png", b"hero")]), "textures");

        assert!(table.contains("textures/hero.png"));
        assert!(table.contains("./textures//hero.png"));
        assert!(!table.contains("hero.png"));
        assert!(!table.contains("texturesx/hero.png"));

        let (bytes, mount_point, _) = table.read("textures/hero.png").unwrap().unwrap();
        assert_eq!(bytes, b"hero");
        assert_eq!(mount_point, "textures");
        assert!(table.read("textures/none.png").is_none());
    }

    #[test]
    fn newer_mounts_shadow_older_ones() {
        let table = MountTable::new();
        table.mount(bundle(&[("a.txt", b"old"), ("b.txt", b"only-old")]), "");
        table.mount(bundle(&[("a.txt", b"new")]), "");

        assert_eq!(table.read("a.txt").unwrap().unwrap().0, b"new");
        assert_eq!(table.read("b.txt").unwrap().unwrap().0, b"only-old");

        let summary = table.summary();
        assert_eq!(summary.bundles, 2);
        assert_eq!(summary.entries, 3);
    }

    #[test]
    fn unmount_removes_by_mount_point() {
        let table = MountTable::new();
        table.mount(bundle(&[("a.txt", b"a")]), "data");
        table.mount(bundle(&[("b.txt", b"b")]), "other");

        assert_eq!(table.unmount("data"), 1);
        assert_eq!(table.unmount("data"), 0);
        assert!(!table.contains("data/a.txt"));
        assert_eq!(table.mount_points(), ["other"]);
    }
}
