//! Lease store contract.
//!
//! Every coordination step of the monitor service goes through [`LeaseStore`]:
//! there is no client-side locking, the store's own guarantees do the work.
//!
//! # Required guarantees
//!
//! - `get` / `put` are linearizable
//! - A key bound to a lease is deleted by the store once the lease expires
//! - Watch events for a single key are delivered in the order they were applied
//!
//! # Implementations
//!
//! - [`MemLeaseStore`]: in-process store with a background expiry sweeper
//! - `EtcdLeaseStore` (feature `etcd`): etcd v3 leases and watches

mod mem;
pub use mem::*;

#[cfg(feature = "etcd")]
mod etcd;
#[cfg(feature = "etcd")]
pub use etcd::*;

use std::fmt;

use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;

use crate::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Opaque lease identifier assigned by the store on grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeaseId(pub i64);

impl fmt::Display for LeaseId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// A key as currently stored, with the lease it is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    pub lease_id: LeaseId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventType {
    /// Key was written
    Put,
    /// Key was deleted, explicitly or because its lease expired
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub event_type: WatchEventType,
    pub key: String,
    /// Written value, empty for `Delete`
    pub value: String,
}

impl WatchEvent {
    pub fn put(
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            event_type: WatchEventType::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            event_type: WatchEventType::Delete,
            key: key.into(),
            value: String::new(),
        }
    }
}

/// Ordered stream of mutations on one key.
///
/// Ends when the subscription is canceled or the connection closes.
/// Dropping the stream releases the subscription.
pub type WatchStream = BoxStream<'static, WatchEvent>;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait LeaseStore: Send + Sync + 'static {
    /// Returns `Ok(None)` when the key does not exist
    async fn get(
        &self,
        key: &str,
    ) -> StoreResult<Option<KeyValue>>;

    /// Writes `key`, bound to `lease_id`
    async fn put(
        &self,
        key: &str,
        value: &str,
        lease_id: LeaseId,
    ) -> StoreResult<()>;

    async fn grant(
        &self,
        ttl_secs: u64,
    ) -> StoreResult<LeaseId>;

    /// Single renewal round trip.
    ///
    /// Fails with [`StoreError::LeaseNotFound`] if the lease already expired.
    async fn keep_alive_once(
        &self,
        lease_id: LeaseId,
    ) -> StoreResult<()>;

    async fn watch(
        &self,
        key: &str,
    ) -> StoreResult<WatchStream>;
}
