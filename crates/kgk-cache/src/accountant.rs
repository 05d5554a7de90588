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

//! Byte accounting for cached payloads.

use std::sync::atomic::{AtomicU64, Ordering};

/// A pair of atomic byte counters with high-water marks.
#[derive(Debug, Default)]
struct Counter {
    current: AtomicU64,
    peak: AtomicU64,
}

impl Counter {
    fn add(&self, bytes: u64, what: &str) {
        let result = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(bytes)
            });
        match result {
            Ok(previous) => {
                self.peak.fetch_max(previous + bytes, Ordering::AcqRel);
            }
            Err(_) => log::error!("{what} counter overflowed while charging {bytes} bytes"),
        }
    }

    fn sub(&self, bytes: u64, what: &str) {
        let result = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(bytes)
            });
        if result.is_err() {
            log::error!("{what} counter underflowed while releasing {bytes} bytes");
            self.current.store(0, Ordering::Release);
        }
    }

    fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    fn peak(&self) -> u64 {
        self.peak.load(Ordering::Acquire)
    }

    fn reset_peak(&self) {
        self.peak.store(self.current(), Ordering::Release);
    }
}

/// Tracks the bytes held by cached payloads against an optional limit.
///
/// CPU and GPU bytes are counted separately; only CPU bytes are compared with
/// the limit. A limit of `0` means unlimited.
#[derive(Debug, Default)]
pub struct MemoryAccountant {
    cpu: Counter,
    gpu: Counter,
    limit: AtomicU64,
}

impl MemoryAccountant {
    /// Creates an accountant with the given limit.
    pub fn new(limit: u64) -> Self {
        Self {
            limit: AtomicU64::new(limit),
            ..Self::default()
        }
    }

    /// Charges a newly cached payload.
    pub fn charge(&self, memory: u64, gpu_memory: u64) {
        self.cpu.add(memory, "Memory");
        self.gpu.add(gpu_memory, "GPU memory");
    }

    /// Releases an evicted payload.
    pub fn release(&self, memory: u64, gpu_memory: u64) {
        self.cpu.sub(memory, "Memory");
        self.gpu.sub(gpu_memory, "GPU memory");
    }

    /// Moves the charge for one payload from `old` to `new`
    /// (each a `(memory, gpu_memory)` pair).
    pub fn adjust(&self, old: (u64, u64), new: (u64, u64)) {
        self.release(old.0, old.1);
        self.charge(new.0, new.1);
    }

    /// CPU bytes currently charged.
    pub fn current(&self) -> u64 {
        self.cpu.current()
    }

    /// Highest CPU charge since creation or the last reset.
    pub fn peak(&self) -> u64 {
        self.cpu.peak()
    }

    /// GPU bytes currently charged.
    pub fn gpu_current(&self) -> u64 {
        self.gpu.current()
    }

    /// Highest GPU charge since creation or the last reset.
    pub fn gpu_peak(&self) -> u64 {
        self.gpu.peak()
    }

    /// Resets both high-water marks to the current values.
    pub fn reset_peaks(&self) {
        self.cpu.reset_peak();
        self.gpu.reset_peak();
    }

    /// The configured limit in bytes; `0` means unlimited.
    pub fn limit(&self) -> u64 {
        self.limit.load(Ordering::Acquire)
    }

    /// Replaces the limit.
    pub fn set_limit(&self, bytes: u64) {
        self.limit.store(bytes, Ordering::Release);
    }

    /// Whether the CPU charge exceeds `limit` (never, when `limit` is 0).
    pub fn exceeds(&self, limit: u64) -> bool {
        limit > 0 && self.current() > limit
    }

    /// Whether the CPU charge exceeds the configured limit.
    pub fn is_over_limit(&self) -> bool {
        self.exceeds(self.limit())
    }

    /// CPU charge as a percentage of the limit, or `0.0` when unlimited.
    pub fn usage_percent(&self) -> f64 {
        match self.limit() {
            0 => 0.0,
            limit => self.current() as f64 / limit as f64 * 100.0,
        }
    }
}
