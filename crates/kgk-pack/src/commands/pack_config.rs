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

use serde::Deserialize;
use std::path::PathBuf;

/// Represents the structure of the `Pack.toml` manifest file.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PackManifest {
    /// Directories to pack. Their contents are merged at the bundle root;
    /// a later directory wins when two contain the same relative path.
    pub source_directories: Vec<PathBuf>,
    /// Where the bundle is written.
    pub output: PathBuf,
    /// Whether entries are RLE-compressed when that makes them smaller.
    pub compress: bool,
}

impl Default for PackManifest {
    /// Provides a default configuration if `Pack.toml` is not found.
    ///
    /// Packs `resources/assets` into `.dist/assets.kgkb` with compression.
    fn default() -> Self {
        Self {
            source_directories: vec![PathBuf::from("resources/assets")],
            output: PathBuf::from(".dist/assets.kgkb"),
            compress: true,
        }
    }
}
