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

//! Defines the error hierarchy shared by every layer of the resource subsystem.

use crate::resource::ResourceType;
use std::error::Error;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// A convenience alias for results produced by the resource subsystem.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// The coarse category of a [`ResourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Neither a mounted bundle nor the filesystem has the requested path.
    FileNotFound,
    /// A bundle header or entry, or a decoded payload, is malformed.
    InvalidFormat,
    /// A stored checksum does not match the bytes read back.
    CorruptedData,
    /// An allocation failed while decoding.
    OutOfMemory,
    /// A configuration value or argument is out of range.
    InvalidParameter,
    /// The operation is not valid for the current state.
    InvalidState,
    /// Any other I/O failure.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::FileNotFound => "file not found",
            ErrorKind::InvalidFormat => "invalid format",
            ErrorKind::CorruptedData => "corrupted data",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::Io => "i/o error",
        };
        f.write_str(name)
    }
}

/// An error raised while resolving, decoding, caching, or packing a resource.
///
/// The type is cheaply clonable: a single failed load is handed to every
/// caller that was waiting on the same key.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResourceError {
    /// The path could not be resolved from any byte source.
    #[error("resource not found: '{path}'")]
    FileNotFound {
        /// The path that was requested.
        path: String,
    },

    /// A structural problem in a bundle or other persisted data.
    #[error("invalid format in '{context}': {reason}")]
    InvalidFormat {
        /// The file or entry being parsed.
        context: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Checksum mismatch on a bundle entry.
    #[error("corrupted data for '{path}': expected crc32 {expected:#010x}, found {actual:#010x}")]
    CorruptedData {
        /// The virtual path of the damaged entry.
        path: String,
        /// The checksum recorded in the entry table.
        expected: u32,
        /// The checksum of the bytes actually read.
        actual: u32,
    },

    /// The decoder could not allocate the memory it needed.
    #[error("out of memory while decoding '{key}' ({requested} bytes requested)")]
    OutOfMemory {
        /// The cache key being loaded.
        key: String,
        /// The allocation size that failed, if known (0 otherwise).
        requested: u64,
    },

    /// A bad argument or configuration value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The request is not valid in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An external decoder rejected the bytes.
    #[error("failed to decode {resource_type} '{key}': {cause}")]
    Decode {
        /// The kind of resource being decoded.
        resource_type: ResourceType,
        /// The cache key being loaded.
        key: String,
        /// The decoder's own error.
        #[source]
        cause: Arc<dyn Error + Send + Sync>,
    },

    /// An I/O failure other than a missing file.
    #[error("i/o error on '{path}': {source}")]
    Io {
        /// The path being read or written.
        path: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },
}

impl ResourceError {
    /// Returns the coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResourceError::FileNotFound { .. } => ErrorKind::FileNotFound,
            ResourceError::InvalidFormat { .. } | ResourceError::Decode { .. } => {
                ErrorKind::InvalidFormat
            }
            ResourceError::CorruptedData { .. } => ErrorKind::CorruptedData,
            ResourceError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            ResourceError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            ResourceError::InvalidState(_) => ErrorKind::InvalidState,
            ResourceError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Wraps an I/O error, mapping `NotFound` onto [`ResourceError::FileNotFound`].
    pub fn io(path: impl AsRef<Path>, error: io::Error) -> Self {
        let path = path.as_ref().display().to_string();
        if error.kind() == io::ErrorKind::NotFound {
            ResourceError::FileNotFound { path }
        } else {
            ResourceError::Io {
                path,
                source: Arc::new(error),
            }
        }
    }

    /// Shorthand for an [`ResourceError::InvalidFormat`] error.
    pub fn invalid_format(context: impl Into<String>, reason: impl Into<String>) -> Self {
        ResourceError::InvalidFormat {
            context: context.into(),
            reason: reason.into(),
        }
    }
}
