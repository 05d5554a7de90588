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

//! # KGK Cache
//!
//! The caching layer of the resource subsystem. [`ResourceManager`] is the
//! entry point; the building blocks it is made of are public too so that
//! tools and benchmarks can drive them directly.
//!
//! Resources are decoded by [`ResourceLoader`](kgk_core::ResourceLoader)s
//! registered per [`ResourceType`](kgk_core::ResourceType), cached once per
//! key, shared through [`ResourceHandle`]s and reclaimed by policy once no
//! caller holds a reference.

#![warn(missing_docs)]

pub mod accountant;
pub mod eviction;
pub mod executor;
pub mod manager;
pub mod preload;
pub mod record;
pub mod store;

mod mounts;
mod registry;
mod reload;
mod stats;

pub use accountant::MemoryAccountant;
pub use eviction::{EvictionContext, EvictionStrategy};
#[cfg(feature = "tokio")]
pub use executor::TokioExecutor;
pub use executor::{InlineExecutor, PreloadExecutor, PreloadTask, ThreadExecutor};
pub use manager::ResourceManager;
pub use mounts::{MountSummary, MountTable};
pub use preload::{PreloadJob, PreloadProgress, PreloadReport};
pub use record::{ResourceHandle, ResourceOrigin, ResourceRecord};
pub use registry::MetadataRegistry;
pub use reload::ReloadEvent;
pub use store::{CacheStore, CacheStores, Lookup};
