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

use crate::commands::pack_config::PackManifest;
use crate::helpers::*;
use anyhow::{Context, Result};
use kgk_io::{BundleContainer, BundleHeader};
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line overrides for the manifest.
#[derive(Debug, Default)]
pub struct PackOptions {
    pub manifest: PathBuf,
    pub sources: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub no_compress: bool,
}

pub fn pack(options: &PackOptions) -> Result<()> {
    print_task_start("Packing Bundle", PACKAGE, MAGENTA);

    let mut manifest = load_manifest(&options.manifest)?;
    if !options.sources.is_empty() {
        manifest.source_directories = options.sources.clone();
    }
    if let Some(output) = &options.output {
        manifest.output = output.clone();
    }
    if options.no_compress {
        manifest.compress = false;
    }

    log::debug!(
        "Packing {:?} into '{}' (compress: {})",
        manifest.source_directories,
        manifest.output.display(),
        manifest.compress
    );
    if let Some(header) = build_bundle(&manifest)? {
        print_success(&format!(
            "Wrote {} entries to '{}' ({})",
            header.file_count,
            manifest.output.display(),
            human_size(header.total_size)
        ));
    }
    Ok(())
}

/// Packs every file of the manifest's source directories into its output.
/// Returns `None` when there was nothing to pack.
pub fn build_bundle(manifest: &PackManifest) -> Result<Option<BundleHeader>> {
    let valid_source_dirs: Vec<&PathBuf> = manifest
        .source_directories
        .iter()
        .filter(|dir| {
            let exists = dir.is_dir();
            if !exists {
                log::warn!("Skipping '{}': not a directory", dir.display());
            }
            exists
        })
        .collect();

    if valid_source_dirs.is_empty() {
        print_error("No valid source directories found. Nothing to pack.");
        return Ok(None);
    }

    let mut bundle = BundleContainer::new();
    let mut added = 0;
    for dir in valid_source_dirs {
        let count = bundle
            .add_directory(dir, "")
            .with_context(|| format!("Failed to stage files from '{}'", dir.display()))?;
        println!("{}🔎 Found:{} {} files in '{}'", BOLD, RESET, count, dir.display());
        added += count;
    }

    if added == 0 {
        print_success("No files found to pack.");
        return Ok(None);
    }

    if let Some(parent) = manifest.output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    let header = bundle
        .save(&manifest.output, manifest.compress)
        .with_context(|| format!("Failed to write bundle '{}'", manifest.output.display()))?;
    log::info!(
        "Bundle '{}': {} entries, data section {} bytes",
        manifest.output.display(),
        header.file_count,
        header.data_size()
    );
    Ok(Some(header))
}

/// Loads the manifest at `path`, or the default configuration if it does not exist.
fn load_manifest(path: &Path) -> Result<PackManifest> {
    if !path.exists() {
        print_info(&format!("No '{}' found. Using default configuration.", path.display()));
        return Ok(PackManifest::default());
    }

    print_info(&format!("Found '{}'. Loading configuration.", path.display()));
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest file at '{}'", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse TOML from '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn later_directories_win_on_shared_paths() -> Result<()> {
        let dir = tempdir()?;
        for (root, body) in [("base", "base"), ("mod", "mod")] {
            fs::create_dir_all(dir.path().join(root).join("ui"))?;
            fs::write(dir.path().join(root).join("ui/logo.png"), body)?;
        }
        fs::write(dir.path().join("base/readme.txt"), "hello")?;

        let manifest = PackManifest {
            source_directories: vec![dir.path().join("base"), dir.path().join("mod")],
            output: dir.path().join("out/game.kgkb"),
            compress: true,
        };
        let header = build_bundle(&manifest)?.unwrap();
        assert_eq!(header.file_count, 2);

        let bundle = BundleContainer::load(&manifest.output)?;
        assert_eq!(bundle.get_data("ui/logo.png")?, b"mod");
        assert_eq!(bundle.get_data("readme.txt")?, b"hello");
        Ok(())
    }

    #[test]
    fn nothing_is_written_without_sources() -> Result<()> {
        let dir = tempdir()?;
        let manifest = PackManifest {
            source_directories: vec![dir.path().join("absent")],
            output: dir.path().join("never.kgkb"),
            compress: false,
        };
        assert!(build_bundle(&manifest)?.is_none());
        assert!(!manifest.output.exists());
        Ok(())
    }

    #[test]
    fn manifest_file_is_optional() -> Result<()> {
        let dir = tempdir()?;
        let absent = load_manifest(&dir.path().join("Pack.toml"))?;
        assert_eq!(absent, PackManifest::default());

        let path = dir.path().join("Pack.toml");
        fs::write(&path, "source_directories = [\"art\"]\noutput = \"art.kgkb\"\n")?;
        let manifest = load_manifest(&path)?;
        assert_eq!(manifest.output, PathBuf::from("art.kgkb"));
        assert!(manifest.compress);
        Ok(())
    }
}
