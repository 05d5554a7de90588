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

// Shared fixtures for the integration tests.
#![allow(dead_code)]

use kgk_core::{DecodeError, Decoded, LoadOptions, ResourceLoader, ResourceManagerConfig};
use kgk_cache::ResourceManager;
use std::fs::{self, File};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

/// Payload produced by [`TextLoader`].
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub body: String,
    pub size: Option<u32>,
}

/// Decodes UTF-8 files; anything starting with `BROKEN` is rejected.
/// Charges one byte per input byte.
#[derive(Clone, Default)]
pub struct TextLoader {
    pub decodes: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl TextLoader {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl ResourceLoader for TextLoader {
    fn load(&self, bytes: &[u8], options: &LoadOptions) -> Result<Decoded, DecodeError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let body = std::str::from_utf8(bytes).map_err(|e| DecodeError::Other(Box::new(e)))?;
        if body.starts_with("BROKEN") {
            return Err(DecodeError::Malformed("broken marker".into()));
        }
        let text = Text {
            body: body.to_owned(),
            size: options.font_size,
        };
        Ok(Decoded::new(text, bytes.len() as u64))
    }
}

/// A manager rooted at `root` with `loader` registered for every text-like kind.
pub fn manager(root: &Path, loader: &TextLoader) -> ResourceManager {
    manager_with(ResourceManagerConfig::default().with_root_dir(root), loader)
}

pub fn manager_with(config: ResourceManagerConfig, loader: &TextLoader) -> ResourceManager {
    let manager = ResourceManager::new(config).expect("manager");
    for kind in [
        kgk_core::ResourceType::Image,
        kgk_core::ResourceType::Font,
        kgk_core::ResourceType::Audio,
        kgk_core::ResourceType::Shader,
        kgk_core::ResourceType::Model,
    ] {
        manager.register_loader(kind, loader.clone());
    }
    manager
}

/// Writes `body` to `root/path`, creating parent directories.
pub fn write(root: &Path, path: &str, body: &str) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, body).unwrap();
}

/// Rewrites a file and pushes its mtime forward so that a polling watcher
/// sees the change regardless of filesystem timestamp granularity.
pub fn rewrite(root: &Path, path: &str, body: &str) {
    write(root, path, body);
    let bumped = SystemTime::now() + Duration::from_secs(5);
    File::options()
        .write(true)
        .open(root.join(path))
        .and_then(|file| file.set_modified(bumped))
        .unwrap();
}
