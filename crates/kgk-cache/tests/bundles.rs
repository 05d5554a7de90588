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

mod common;

use anyhow::Result;
use common::{manager, manager_with, write, Text, TextLoader};
use kgk_cache::ResourceOrigin;
use kgk_core::{BundleMount, ErrorKind, LoadOptions, ResourceManagerConfig, ResourceType};
use kgk_io::BundleContainer;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn created_bundles_serve_loads_ahead_of_the_filesystem() -> Result<()> {
    let dir = tempdir()?;
    write(dir.path(), "src/hero.png", "packed hero");
    write(dir.path(), "src/shaders/lit.wgsl", "packed shader");
    write(dir.path(), "textures/hero.png", "loose hero");
    let manager = manager(dir.path(), &TextLoader::default());

    let header = manager.create_bundle("src", "game.kgkb", true)?;
    assert_eq!(header.file_count, 2);
    manager.mount_bundle_file("game.kgkb", "textures")?;

    assert!(manager.exists_in_bundle("textures/hero.png"));
    assert!(manager.exists_in_bundle("textures/shaders/lit.wgsl"));
    assert!(!manager.exists_in_bundle("hero.png"));
    assert_eq!(manager.get_bundle_data("textures/hero.png")?, b"packed hero");

    let hero = manager.load_image("textures/hero.png", &LoadOptions::default())?;
    assert_eq!(hero.get::<Text>().unwrap().body, "packed hero");
    assert!(matches!(
        hero.origin(),
        ResourceOrigin::Bundle { mount_point, .. } if mount_point == "textures"
    ));

    let stats = manager.stats();
    assert_eq!(stats.bundles_mounted, 1);
    assert_eq!(stats.bundle_entries, 2);
    Ok(())
}

#[test]
fn unmounting_falls_back_to_loose_files() -> Result<()> {
    let dir = tempdir()?;
    write(dir.path(), "textures/hero.png", "loose hero");
    let manager = manager(dir.path(), &TextLoader::default());

    let mut bundle = BundleContainer::new();
    bundle.add_data("hero.png", b"packed hero".to_vec())?;
    let bytes = bundle.to_bytes(false)?;
    manager.mount_bundle(Arc::new(BundleContainer::from_bytes(bytes, "memory")?), "textures");

    assert!(manager.unmount_bundle("textures"));
    assert!(!manager.unmount_bundle("textures"));
    assert!(!manager.exists_in_bundle("textures/hero.png"));

    let missing = manager.get_bundle_data("textures/hero.png").unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::FileNotFound);

    let hero = manager.load_image("textures/hero.png", &LoadOptions::default())?;
    assert_eq!(hero.get::<Text>().unwrap().body, "loose hero");
    Ok(())
}

#[test]
fn configured_mounts_are_applied_at_start_up() -> Result<()> {
    let dir = tempdir()?;
    let mut bundle = BundleContainer::new();
    bundle.add_data("click.wav", b"click".to_vec())?;
    bundle.save(dir.path().join("sfx.kgkb"), false)?;

    let mut config = ResourceManagerConfig::default().with_root_dir(dir.path());
    config.mounts.push(BundleMount {
        path: "sfx.kgkb".into(),
        mount_point: "audio".into(),
    });
    let manager = manager_with(config, &TextLoader::default());

    let click = manager.load_audio("audio/click.wav", &LoadOptions::default())?;
    assert_eq!(click.get::<Text>().unwrap().body, "click");
    Ok(())
}

#[test]
fn missing_configured_bundle_fails_construction() {
    let dir = tempdir().unwrap();
    let mut config = ResourceManagerConfig::default().with_root_dir(dir.path());
    config.mounts.push(BundleMount {
        path: "absent.kgkb".into(),
        mount_point: String::new(),
    });
    let err = kgk_cache::ResourceManager::new(config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileNotFound);
}

#[test]
fn corrupted_bundle_entries_fail_their_loads_only() -> Result<()> {
    let dir = tempdir()?;
    let mut bundle = BundleContainer::new();
    bundle.add_data("good.png", b"good pixels".to_vec())?;
    bundle.add_data("bad.png", b"bad pixels!".to_vec())?;
    let path = dir.path().join("pack.kgkb");
    bundle.save(&path, false)?;

    let lazy = BundleContainer::open(&path)?;
    let entry = lazy.entry("bad.png").unwrap().clone();
    let data_offset = lazy.header().unwrap().data_offset;
    drop(lazy);

    let mut bytes = fs::read(&path)?;
    bytes[(data_offset + entry.offset) as usize] ^= 0xff;
    fs::write(&path, bytes)?;

    let manager = manager(dir.path(), &TextLoader::default());
    manager.mount_bundle_file("pack.kgkb", "")?;

    let bad = manager.load_image("bad.png", &LoadOptions::default()).unwrap_err();
    assert_eq!(bad.kind(), ErrorKind::CorruptedData);
    assert!(!manager.is_cached(ResourceType::Image, "bad.png"));

    let good = manager.load_image("good.png", &LoadOptions::default())?;
    assert_eq!(good.get::<Text>().unwrap().body, "good pixels");
    Ok(())
}

#[test]
fn bundles_load_as_cached_resources() -> Result<()> {
    let dir = tempdir()?;
    write(dir.path(), "src/a.txt", "alpha");
    let manager = manager(dir.path(), &TextLoader::default());
    manager.create_bundle("src", "packs/a.kgkb", false)?;

    let handle = manager.load_bundle("packs/a.kgkb")?;
    let again = manager.load_bundle("packs/a.kgkb")?;
    assert!(handle.ptr_eq(&again));
    assert_eq!(manager.stats().bundle_count, 1);

    let bundle = handle.get::<BundleContainer>().unwrap();
    assert_eq!(bundle.file_list(), ["a.txt"]);
    assert_eq!(bundle.get_data("a.txt")?, b"alpha");

    manager.mount_bundle(bundle, "docs");
    assert_eq!(manager.get_bundle_data("docs/a.txt")?, b"alpha");

    fs::write(dir.path().join("junk.kgkb"), b"not a bundle at all, not even close")?;
    let err = manager.load_bundle("junk.kgkb").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    Ok(())
}
