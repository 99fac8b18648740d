//! In-process lease-capable key-value store.
//!
//! # Concurrency Model
//!
//! - **State**: one `parking_lot::Mutex` guards keys and leases together, so
//!   every operation is linearizable and a key can never outlive its lease
//! - **Expiry**: monotonic deadlines (`tokio::time::Instant`); expired leases
//!   are purged lazily at the start of every operation and by a background
//!   sweeper started with [`MemLeaseStore::start`]
//! - **Watch**: events are emitted under the state lock, see
//!   [`WatchRegistry`](super::watch_registry::WatchRegistry)

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;

use super::watch_registry::WatchRegistry;
use crate::KeyValue;
use crate::LeaseId;
use crate::LeaseStore;
use crate::StoreConfig;
use crate::StoreError;
use crate::StoreResult;
use crate::WatchEvent;
use crate::WatchStream;

#[derive(Debug)]
struct StoredValue {
    value: String,
    lease_id: LeaseId,
}

#[derive(Debug)]
struct LeaseEntry {
    ttl: Duration,
    expires_at: Instant,
    /// Keys bound to this lease, deleted together on expiry
    keys: HashSet<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    kvs: HashMap<String, StoredValue>,
    leases: HashMap<LeaseId, LeaseEntry>,
}

#[derive(Debug)]
struct MemStoreInner {
    state: Mutex<StoreState>,
    watchers: WatchRegistry,
    next_lease_id: AtomicI64,
}

impl MemStoreInner {
    /// Remove `lease_id` and delete every key bound to it.
    /// Returns the number of keys deleted.
    fn revoke_locked(
        &self,
        state: &mut StoreState,
        lease_id: LeaseId,
    ) -> Option<usize> {
        let lease = state.leases.remove(&lease_id)?;
        let mut deleted = 0;
        for key in lease.keys {
            if state.kvs.remove(&key).is_some() {
                deleted += 1;
                self.watchers.notify(WatchEvent::delete(key));
            }
        }
        Some(deleted)
    }

    fn purge_expired_locked(
        &self,
        state: &mut StoreState,
        now: Instant,
    ) -> usize {
        let expired: Vec<LeaseId> = state
            .leases
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();

        let mut deleted = 0;
        for lease_id in expired {
            trace!(%lease_id, "Lease expired");
            deleted += self.revoke_locked(state, lease_id).unwrap_or(0);
        }
        deleted
    }
}

/// In-memory [`LeaseStore`]. Cheap to clone; clones share the same data.
#[derive(Debug, Clone)]
pub struct MemLeaseStore {
    inner: Arc<MemStoreInner>,
    expiry_interval: Duration,
    sweeper: Arc<Mutex<Option<(CancellationToken, JoinHandle<()>)>>>,
}

impl Default for MemLeaseStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl MemLeaseStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            inner: Arc::new(MemStoreInner {
                state: Mutex::new(StoreState::default()),
                watchers: WatchRegistry::new(),
                next_lease_id: AtomicI64::new(1),
            }),
            expiry_interval: config.expiry_interval(),
            sweeper: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the background expiry sweeper.
    ///
    /// Must be called from within a tokio runtime. Calling `start()` when the
    /// sweeper is already running is a no-op.
    pub fn start(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let handle = Self::spawn_expiry_sweeper(self.inner.clone(), self.expiry_interval, token.clone());
        *sweeper = Some((token, handle));
    }

    /// Stop the background sweeper. Stored data is kept.
    pub async fn stop(&self) {
        let running = self.sweeper.lock().take();
        if let Some((token, handle)) = running {
            token.cancel();
            let _ = handle.await;
        }
    }

    fn spawn_expiry_sweeper(
        inner: Arc<MemStoreInner>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let deleted = {
                            let mut state = inner.state.lock();
                            inner.purge_expired_locked(&mut state, Instant::now())
                        };
                        if deleted > 0 {
                            debug!("Lease expiry sweep: deleted {} expired keys", deleted);
                        }
                    }
                    _ = token.cancelled() => {
                        info!("Lease expiry sweeper received shutdown signal");
                        break;
                    }
                }
            }

            debug!("Lease expiry sweeper stopped");
        })
    }

    /// Purge every lease whose deadline has passed. Returns deleted key count.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.inner.state.lock();
        self.inner.purge_expired_locked(&mut state, Instant::now())
    }

    /// Revoke a lease ahead of its deadline, deleting its keys.
    pub fn revoke(
        &self,
        lease_id: LeaseId,
    ) -> StoreResult<usize> {
        let mut state = self.inner.state.lock();
        self.inner.purge_expired_locked(&mut state, Instant::now());
        self.inner
            .revoke_locked(&mut state, lease_id)
            .ok_or(StoreError::LeaseNotFound(lease_id))
    }

    /// Delete a key regardless of its lease. Returns whether it existed.
    pub fn delete(
        &self,
        key: &str,
    ) -> bool {
        let mut state = self.inner.state.lock();
        self.inner.purge_expired_locked(&mut state, Instant::now());
        match state.kvs.remove(key) {
            Some(stored) => {
                if let Some(lease) = state.leases.get_mut(&stored.lease_id) {
                    lease.keys.remove(key);
                }
                self.inner.watchers.notify(WatchEvent::delete(key));
                true
            }
            None => false,
        }
    }

    /// Number of live leases
    pub fn lease_count(&self) -> usize {
        self.inner.state.lock().leases.len()
    }

    /// Number of open watch subscriptions on `key`
    pub fn watcher_count(
        &self,
        key: &str,
    ) -> usize {
        self.inner.watchers.watcher_count(key)
    }

    pub fn watched_key_count(&self) -> usize {
        self.inner.watchers.watched_key_count()
    }
}

#[async_trait::async_trait]
impl LeaseStore for MemLeaseStore {
    async fn get(
        &self,
        key: &str,
    ) -> StoreResult<Option<KeyValue>> {
        let mut state = self.inner.state.lock();
        self.inner.purge_expired_locked(&mut state, Instant::now());

        Ok(state.kvs.get(key).map(|stored| KeyValue {
            key: key.to_string(),
            value: stored.value.clone(),
            lease_id: stored.lease_id,
        }))
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        lease_id: LeaseId,
    ) -> StoreResult<()> {
        let mut state = self.inner.state.lock();
        self.inner.purge_expired_locked(&mut state, Instant::now());

        match state.leases.get_mut(&lease_id) {
            Some(lease) => {
                lease.keys.insert(key.to_string());
            }
            None => return Err(StoreError::LeaseNotFound(lease_id)),
        }

        let previous = state.kvs.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                lease_id,
            },
        );

        // Rebinding detaches the key from its previous lease
        if let Some(previous) = previous.filter(|p| p.lease_id != lease_id) {
            if let Some(lease) = state.leases.get_mut(&previous.lease_id) {
                lease.keys.remove(key);
            }
        }

        self.inner.watchers.notify(WatchEvent::put(key, value));
        Ok(())
    }

    async fn grant(
        &self,
        ttl_secs: u64,
    ) -> StoreResult<LeaseId> {
        if ttl_secs == 0 {
            return Err(StoreError::InvalidTtl(ttl_secs));
        }

        let lease_id = LeaseId(self.inner.next_lease_id.fetch_add(1, Ordering::Relaxed));
        let ttl = Duration::from_secs(ttl_secs);

        let mut state = self.inner.state.lock();
        self.inner.purge_expired_locked(&mut state, Instant::now());
        state.leases.insert(
            lease_id,
            LeaseEntry {
                ttl,
                expires_at: Instant::now() + ttl,
                keys: HashSet::new(),
            },
        );

        trace!(%lease_id, ttl_secs, "Lease granted");
        Ok(lease_id)
    }

    async fn keep_alive_once(
        &self,
        lease_id: LeaseId,
    ) -> StoreResult<()> {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        self.inner.purge_expired_locked(&mut state, now);

        let lease = state
            .leases
            .get_mut(&lease_id)
            .ok_or(StoreError::LeaseNotFound(lease_id))?;
        lease.expires_at = now + lease.ttl;
        Ok(())
    }

    async fn watch(
        &self,
        key: &str,
    ) -> StoreResult<WatchStream> {
        // Registration happens under the state lock so no mutation can slip
        // between "current state" and "first event delivered"
        let _state = self.inner.state.lock();
        Ok(Box::pin(self.inner.watchers.register(key)))
    }
}
