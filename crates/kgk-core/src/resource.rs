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

//! The closed set of resource kinds managed by the cache.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The kind of an externally-loaded resource.
///
/// Each kind has its own cache family and its own injected decoder. The set is
/// closed: the cache never needs to know more about a resource than its kind
/// and its memory footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A decoded image or texture.
    Image,
    /// A font face.
    Font,
    /// Decoded or streamable audio samples.
    Audio,
    /// Shader source or bytecode.
    Shader,
    /// A mesh or scene model.
    Model,
    /// A packed resource bundle.
    Bundle,
}

impl ResourceType {
    /// Every resource kind, in declaration order.
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Image,
        ResourceType::Font,
        ResourceType::Audio,
        ResourceType::Shader,
        ResourceType::Model,
        ResourceType::Bundle,
    ];

    /// A stable, lowercase name for logging and serialization.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Font => "font",
            ResourceType::Audio => "audio",
            ResourceType::Shader => "shader",
            ResourceType::Model => "model",
            ResourceType::Bundle => "bundle",
        }
    }

    /// Position of this kind inside [`ResourceType::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Infers a resource kind from a file extension (case-insensitive, without the dot).
    pub fn from_extension(extension: &str) -> Option<Self> {
        let ext = extension.to_ascii_lowercase();
        let kind = match ext.as_str() {
            "png" | "jpg" | "jpeg" | "bmp" | "tga" | "gif" | "webp" | "ktx" | "dds" => {
                ResourceType::Image
            }
            "ttf" | "otf" | "woff" | "woff2" => ResourceType::Font,
            "wav" | "ogg" | "mp3" | "flac" => ResourceType::Audio,
            "wgsl" | "glsl" | "vert" | "frag" | "comp" | "spv" | "hlsl" => ResourceType::Shader,
            "obj" | "gltf" | "glb" | "fbx" => ResourceType::Model,
            "kgkb" => ResourceType::Bundle,
            _ => return None,
        };
        Some(kind)
    }

    /// Infers a resource kind from the extension of a path.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_kind_from_extension() {
        assert_eq!(ResourceType::from_path("ui/icon.PNG"), Some(ResourceType::Image));
        assert_eq!(ResourceType::from_path("fonts/body.otf"), Some(ResourceType::Font));
        assert_eq!(ResourceType::from_path("sfx/click.ogg"), Some(ResourceType::Audio));
        assert_eq!(ResourceType::from_path("shaders/blit.wgsl"), Some(ResourceType::Shader));
        assert_eq!(ResourceType::from_path("meshes/cube.glb"), Some(ResourceType::Model));
        assert_eq!(ResourceType::from_path("packs/ui.kgkb"), Some(ResourceType::Bundle));
        assert_eq!(ResourceType::from_path("readme.txt"), None);
        assert_eq!(ResourceType::from_path("no_extension"), None);
    }

    #[test]
    fn index_matches_all_order() {
        for (i, kind) in ResourceType::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
