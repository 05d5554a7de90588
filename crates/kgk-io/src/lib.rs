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

//! # KGK I/O
//!
//! I/O services used by the resource cache: the packed bundle container
//! and the polling file watcher that drives hot reload. Both are
//! independent of caching and can be used on their own.

#![warn(missing_docs)]

pub mod bundle;
pub mod watcher;

pub use bundle::{BundleContainer, BundleEntry, BundleHeader, BUNDLE_MAGIC, BUNDLE_VERSION};
pub use watcher::{FileWatcher, WatchCallback, WatchEvent, WatchEventKind};
