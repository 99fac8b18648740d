//! Per-key watcher registry for the in-memory store
//!
//! ```text
//! MemLeaseStore (under state lock):
//!   put / delete / expiry -> notify() -> lookup in DashMap -> send(per-watcher channel)
//!                                                                  ↓
//! Watcher task:
//!   MemWatchStream -> WatchEvent
//! ```
//!
//! Notifications are issued while the store's state lock is held, so events
//! for one key reach every watcher in the order they were applied. Per-watcher
//! channels are unbounded: a dropped `Delete` would be a missed failure.

use std::pin::Pin;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::trace;

use crate::WatchEvent;

#[derive(Debug)]
struct Watcher {
    id: u64,
    sender: mpsc::UnboundedSender<WatchEvent>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Watchers grouped by key
    watchers: DashMap<String, Vec<Watcher>>,

    /// Next watcher ID (monotonically increasing)
    next_id: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct WatchRegistry {
    inner: Arc<RegistryInner>,
}

impl WatchRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a watcher for `key`.
    ///
    /// The returned stream unregisters itself when dropped.
    pub(crate) fn register(
        &self,
        key: &str,
    ) -> MemWatchStream {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        self.inner
            .watchers
            .entry(key.to_string())
            .or_default()
            .push(Watcher { id, sender });

        trace!(watcher_id = id, key, "Watcher registered");

        MemWatchStream {
            events: UnboundedReceiverStream::new(receiver),
            _guard: WatcherGuard {
                id,
                key: key.to_string(),
                registry: self.inner.clone(),
            },
        }
    }

    pub(crate) fn notify(
        &self,
        event: WatchEvent,
    ) {
        if let Some(watchers) = self.inner.watchers.get(&event.key) {
            for watcher in watchers.iter() {
                // Receiver gone means the guard is about to unregister it
                let _ = watcher.sender.send(event.clone());
            }

            trace!(
                key = %event.key,
                event_type = ?event.event_type,
                watchers = watchers.len(),
                "Event dispatched"
            );
        }
    }

    pub(crate) fn watcher_count(
        &self,
        key: &str,
    ) -> usize {
        self.inner.watchers.get(key).map(|w| w.len()).unwrap_or(0)
    }

    pub(crate) fn watched_key_count(&self) -> usize {
        self.inner.watchers.len()
    }
}

/// Unregisters its watcher when dropped
struct WatcherGuard {
    id: u64,
    key: String,
    registry: Arc<RegistryInner>,
}

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        // Atomic check-and-remove so a concurrent register on the same key
        // cannot land in a list that is being removed.
        self.registry.watchers.remove_if_mut(&self.key, |_key, watchers| {
            watchers.retain(|w| w.id != self.id);
            watchers.is_empty()
        });
        trace!(watcher_id = self.id, key = %self.key, "Watcher unregistered");
    }
}

/// Event stream of one in-memory watch subscription
pub struct MemWatchStream {
    events: UnboundedReceiverStream<WatchEvent>,
    _guard: WatcherGuard,
}

impl Stream for MemWatchStream {
    type Item = WatchEvent;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}
