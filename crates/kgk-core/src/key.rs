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

//! Cache keys and the per-request options that shape them.

use crate::resource::ResourceType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalizes a resource path into the canonical form used as a cache key.
///
/// Backslashes become forward slashes, empty and `.` segments are dropped,
/// and `..` is resolved lexically. A leading `..` that cannot be resolved is
/// kept so that distinct relative paths never collapse onto each other.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Options passed along with a load request.
///
/// Options that change the decoded result (a font's pixel size, an explicit
/// variant suffix) are folded into the cache key so that each variant is
/// cached independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Free-form variant tag appended to the cache key.
    pub cache_suffix: Option<String>,
    /// Pixel size for font rasterization.
    pub font_size: Option<u32>,
    /// Ask image decoders to build a mip chain.
    pub generate_mipmaps: bool,
    /// Treat image data as sRGB.
    pub srgb: bool,
    /// Ask audio decoders to stream instead of fully decoding.
    pub streaming: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            cache_suffix: None,
            font_size: None,
            generate_mipmaps: false,
            srgb: true,
            streaming: false,
        }
    }
}

impl LoadOptions {
    /// Options for a font rasterized at `size` pixels.
    pub fn with_font_size(mut self, size: u32) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Options carrying an explicit cache-key suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.cache_suffix = Some(suffix.into());
        self
    }

    fn key_suffix(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(size) = self.font_size {
            parts.push(format!("size={size}"));
        }
        if let Some(suffix) = self.cache_suffix.as_deref().filter(|s| !s.is_empty()) {
            parts.push(suffix.to_string());
        }
        (!parts.is_empty()).then(|| parts.join(";"))
    }
}

/// Identifies one cached entry: a resource kind plus its normalized key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    resource_type: ResourceType,
    path: String,
    key: String,
}

impl CacheKey {
    /// Builds the cache key for `path` loaded as `resource_type` with `options`.
    pub fn new(resource_type: ResourceType, path: &str, options: &LoadOptions) -> Self {
        let path = normalize_path(path);
        let key = match options.key_suffix() {
            Some(suffix) => format!("{path}#{suffix}"),
            None => path.clone(),
        };
        Self {
            resource_type,
            path,
            key,
        }
    }

    /// Builds a key with no option suffix.
    pub fn plain(resource_type: ResourceType, path: &str) -> Self {
        Self::new(resource_type, path, &LoadOptions::default())
    }

    /// The kind of resource this key refers to.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// The normalized source path, without any option suffix.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The full key string, including any option suffix.
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.key)
    }
}
