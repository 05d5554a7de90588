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

//! The decoder contract consumed by the cache.
//!
//! Decoders are external collaborators: they turn raw bytes into a payload
//! the rest of the application understands. The cache only needs to know how
//! much memory the payload occupies.

use crate::error::ResourceError;
use crate::key::{CacheKey, LoadOptions};
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// The failure modes a decoder can report.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The bytes are not a valid instance of the expected format.
    #[error("malformed data: {0}")]
    Malformed(String),
    /// The decoder could not allocate its output.
    #[error("allocation of {requested} bytes failed")]
    OutOfMemory {
        /// Size of the failed allocation.
        requested: u64,
    },
    /// Any other decoder-specific failure.
    #[error(transparent)]
    Other(Box<dyn Error + Send + Sync>),
}

impl DecodeError {
    /// Converts the decoder failure into the cache's error type for `key`.
    pub fn into_resource_error(self, key: &CacheKey) -> ResourceError {
        match self {
            DecodeError::OutOfMemory { requested } => ResourceError::OutOfMemory {
                key: key.as_str().to_string(),
                requested,
            },
            DecodeError::Malformed(reason) => ResourceError::Decode {
                resource_type: key.resource_type(),
                key: key.as_str().to_string(),
                cause: Arc::new(DecodeError::Malformed(reason)),
            },
            DecodeError::Other(cause) => ResourceError::Decode {
                resource_type: key.resource_type(),
                key: key.as_str().to_string(),
                cause: Arc::from(cause),
            },
        }
    }
}

/// A decoded payload together with its memory footprint.
///
/// The payload is type-erased so that one cache can hold every resource kind;
/// consumers recover the concrete type with [`Decoded::downcast`].
#[derive(Clone)]
pub struct Decoded {
    payload: Arc<dyn Any + Send + Sync>,
    memory_usage: u64,
    gpu_memory_usage: u64,
}

impl Decoded {
    /// Wraps a decoded value occupying `memory_usage` bytes of CPU memory.
    pub fn new<T: Any + Send + Sync>(payload: T, memory_usage: u64) -> Self {
        Self {
            payload: Arc::new(payload),
            memory_usage,
            gpu_memory_usage: 0,
        }
    }

    /// Wraps a payload that is already shared.
    pub fn from_arc(payload: Arc<dyn Any + Send + Sync>, memory_usage: u64) -> Self {
        Self {
            payload,
            memory_usage,
            gpu_memory_usage: 0,
        }
    }

    /// Records the GPU memory the payload occupies once uploaded.
    pub fn with_gpu_memory(mut self, bytes: u64) -> Self {
        self.gpu_memory_usage = bytes;
        self
    }

    /// CPU bytes accounted against the memory limit.
    pub fn memory_usage(&self) -> u64 {
        self.memory_usage
    }

    /// GPU bytes, tracked separately from the CPU limit.
    pub fn gpu_memory_usage(&self) -> u64 {
        self.gpu_memory_usage
    }

    /// The type-erased payload.
    pub fn payload(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.payload
    }

    /// Recovers the concrete payload type, if it matches.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.payload.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoded")
            .field("memory_usage", &self.memory_usage)
            .field("gpu_memory_usage", &self.gpu_memory_usage)
            .finish_non_exhaustive()
    }
}

/// A decoder for one resource kind.
///
/// Implementors parse raw bytes into a payload. The same loader is used for
/// the first load and for every hot reload of a key, so it must be
/// deterministic with respect to its inputs.
pub trait ResourceLoader: Send + Sync {
    /// Decodes `bytes` using `options`.
    fn load(&self, bytes: &[u8], options: &LoadOptions) -> Result<Decoded, DecodeError>;
}

impl<F> ResourceLoader for F
where
    F: Fn(&[u8], &LoadOptions) -> Result<Decoded, DecodeError> + Send + Sync,
{
    fn load(&self, bytes: &[u8], options: &LoadOptions) -> Result<Decoded, DecodeError> {
        self(bytes, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resource::ResourceType;

    #[derive(Debug, PartialEq)]
    struct Glyphs(Vec<u8>);

    #[test]
    fn closures_are_loaders() {
        let loader = |bytes: &[u8], _: &LoadOptions| -> Result<Decoded, DecodeError> {
            Ok(Decoded::new(Glyphs(bytes.to_vec()), bytes.len() as u64))
        };
        let decoded = loader.load(b"abc", &LoadOptions::default()).unwrap();
        assert_eq!(decoded.memory_usage(), 3);
        assert_eq!(decoded.downcast::<Glyphs>().unwrap().0, b"abc");
        assert!(decoded.downcast::<String>().is_none());
    }

    #[test]
    fn decode_errors_map_to_kinds() {
        let key = CacheKey::plain(ResourceType::Image, "a.png");
        let oom = DecodeError::OutOfMemory { requested: 42 }.into_resource_error(&key);
        assert_eq!(oom.kind(), ErrorKind::OutOfMemory);

        let bad = DecodeError::Malformed("truncated".into()).into_resource_error(&key);
        assert_eq!(bad.kind(), ErrorKind::InvalidFormat);
        assert!(bad.to_string().contains("truncated"));
    }
}
