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

//! # KGK Core
//!
//! Foundational crate for the resource subsystem. It defines the "common
//! language" shared by the I/O layer and the cache: resource kinds, error
//! kinds, eviction policies, cache keys, and the decoder contract that
//! type-specific loaders implement.
//!
//! Nothing in this crate touches the filesystem beyond reading a
//! configuration file, and nothing here interprets asset content.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod key;
pub mod loader;
pub mod metadata;
pub mod policy;
pub mod resource;
pub mod stats;

pub use config::{BundleMount, ResourceManagerConfig};
pub use error::{ErrorKind, ResourceError, ResourceResult};
pub use key::{normalize_path, CacheKey, LoadOptions};
pub use loader::{DecodeError, Decoded, ResourceLoader};
pub use metadata::ResourceMetadata;
pub use policy::EvictionPolicy;
pub use resource::ResourceType;
pub use stats::ResourceStats;
