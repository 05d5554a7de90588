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

//! Configuration for a resource manager instance, loadable from TOML.

use crate::error::{ResourceError, ResourceResult};
use crate::policy::EvictionPolicy;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};

/// A bundle mounted when the manager is created.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleMount {
    /// Path to the `.kgkb` file, relative to `root_dir` when not absolute.
    pub path: PathBuf,
    /// Virtual prefix under which the bundle's entries are exposed.
    #[serde(default)]
    pub mount_point: String,
}

/// Represents the structure of a `Resources.toml` configuration file.
///
/// ```toml
/// root_dir = "assets"
/// memory_limit = "256 MiB"
/// eviction_policy = "lfu"
/// hot_reload = true
///
/// [[mount]]
/// path = "packs/ui.kgkb"
/// mount_point = "ui"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceManagerConfig {
    /// Base directory for filesystem resolution.
    pub root_dir: PathBuf,
    /// CPU memory budget in bytes; `0` disables enforcement.
    #[serde(deserialize_with = "deserialize_byte_size")]
    pub memory_limit: u64,
    /// Initial eviction policy.
    pub eviction_policy: EvictionPolicy,
    /// Whether hot reload starts enabled.
    pub hot_reload: bool,
    /// Watch every file loaded from disk while hot reload is enabled.
    pub auto_watch_loaded: bool,
    /// Run a `gc()` sweep after clearing the cache.
    pub gc_on_clear: bool,
    /// Bundles to mount at start-up, in mount order.
    #[serde(rename = "mount")]
    pub mounts: Vec<BundleMount>,
}

impl Default for ResourceManagerConfig {
    /// Provides a default configuration: resolve from the working directory,
    /// no memory limit, LRU eviction, hot reload off.
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            memory_limit: 0,
            eviction_policy: EvictionPolicy::Lru,
            hot_reload: false,
            auto_watch_loaded: true,
            gc_on_clear: false,
            mounts: Vec::new(),
        }
    }
}

impl ResourceManagerConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ResourceResult<Self> {
        toml::from_str(text)
            .map_err(|e| ResourceError::InvalidParameter(format!("invalid configuration: {e}")))
    }

    /// Reads and parses a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ResourceError::io(path, e))?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded resource configuration from '{}'", path.display());
        Ok(config)
    }

    /// Sets the memory limit.
    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Sets the eviction policy.
    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    /// Sets the filesystem root.
    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    /// Resolves a mount's bundle path against `root_dir`.
    pub fn resolve_mount_path(&self, mount: &BundleMount) -> PathBuf {
        if mount.path.is_absolute() {
            mount.path.clone()
        } else {
            self.root_dir.join(&mount.path)
        }
    }
}

/// Parses a byte count such as `"512"`, `"64 KiB"`, `"1.5GB"`.
///
/// Decimal units (`KB`, `MB`, `GB`) are powers of 1000, binary units
/// (`KiB`, `MiB`, `GiB`) powers of 1024. Units are case-insensitive.
pub fn parse_byte_size(text: &str) -> ResourceResult<u64> {
    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let invalid = || ResourceError::InvalidParameter(format!("invalid byte size '{text}'"));

    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(ResourceError::InvalidParameter(format!(
            "byte size must be non-negative, got '{text}'"
        )));
    }

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "kib" => 1 << 10,
        "m" | "mb" => 1_000_000,
        "mib" => 1 << 20,
        "g" | "gb" => 1_000_000_000,
        "gib" => 1 << 30,
        _ => return Err(invalid()),
    };

    Ok((value * multiplier as f64).round() as u64)
}

fn deserialize_byte_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(i64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Int(value) => u64::try_from(value).map_err(|_| {
            serde::de::Error::custom(format!("memory_limit must be non-negative, got {value}"))
        }),
        Repr::Text(text) => parse_byte_size(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parses_byte_sizes() {
        assert_eq!(parse_byte_size("512").unwrap(), 512);
        assert_eq!(parse_byte_size("64 KiB").unwrap(), 64 * 1024);
        assert_eq!(parse_byte_size("2MB").unwrap(), 2_000_000);
        assert_eq!(parse_byte_size("1.5 gib").unwrap(), 1_610_612_736);
        assert!(parse_byte_size("-1").is_err());
        assert!(parse_byte_size("12 parsecs").is_err());
        assert!(parse_byte_size("").is_err());
    }

    #[test]
    fn parses_a_full_document() {
        let config = ResourceManagerConfig::from_toml_str(
            r#"
            root_dir = "assets"
            memory_limit = "256 MiB"
            eviction_policy = "lfu"
            hot_reload = true

            [[mount]]
            path = "packs/ui.kgkb"
            mount_point = "ui"

            [[mount]]
            path = "/opt/game/base.kgkb"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_dir, PathBuf::from("assets"));
        assert_eq!(config.memory_limit, 256 * 1024 * 1024);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lfu);
        assert!(config.hot_reload);
        assert!(config.auto_watch_loaded);
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(config.mounts[1].mount_point, "");
        assert_eq!(
            config.resolve_mount_path(&config.mounts[0]),
            PathBuf::from("assets").join("packs/ui.kgkb")
        );
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = ResourceManagerConfig::from_toml_str("memory_limit = 1024").unwrap();
        assert_eq!(config.memory_limit, 1024);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert_eq!(config.root_dir, PathBuf::from("."));
    }

    #[test]
    fn rejects_negative_limits_and_unknown_keys() {
        let err = ResourceManagerConfig::from_toml_str("memory_limit = -5").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let err = ResourceManagerConfig::from_toml_str("memroy_limit = 5").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Resources.toml");
        fs::write(&path, "eviction_policy = \"fifo\"\n").unwrap();
        let config = ResourceManagerConfig::from_file(&path).unwrap();
        assert_eq!(config.eviction_policy, EvictionPolicy::Fifo);

        let err = ResourceManagerConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }
}
