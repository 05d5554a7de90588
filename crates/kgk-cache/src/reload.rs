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

use crossbeam_channel::{Receiver, Sender};
use kgk_core::{CacheKey, ResourceError};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Outcome of one in-place reload, delivered to every subscriber.
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    /// The reloaded entry.
    pub key: CacheKey,
    /// The file whose change triggered the reload, if it came from the watcher.
    pub path: Option<PathBuf>,
    /// `None` on success. On failure the previous payload is still in place.
    pub error: Option<ResourceError>,
}

impl ReloadEvent {
    /// Whether the new payload was swapped in.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Fan-out of reload events to any number of subscribers.
///
/// Subscribers whose receiver was dropped are pruned on the next send.
#[derive(Default)]
pub(crate) struct ReloadBroadcaster {
    subscribers: Mutex<Vec<Sender<ReloadEvent>>>,
}

impl ReloadBroadcaster {
    pub fn subscribe(&self) -> Receiver<ReloadEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn send(&self, event: ReloadEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgk_core::ResourceType;

    #[test]
    fn dropped_subscribers_are_pruned() {
        let broadcaster = ReloadBroadcaster::default();
        let kept = broadcaster.subscribe();
        drop(broadcaster.subscribe());

        broadcaster.send(ReloadEvent {
            key: CacheKey::plain(ResourceType::Shader, "lit.wgsl"),
            path: None,
            error: None,
        });

        assert!(kept.try_recv().unwrap().succeeded());
        assert_eq!(broadcaster.subscribers.lock().unwrap().len(), 1);
    }
}
