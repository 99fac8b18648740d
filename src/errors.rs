//! Monitor Error Hierarchy
//!
//! Defines the error types surfaced by the monitor service, categorized by
//! the layer that produced them: the lease store, the stored monitor state,
//! configuration, and failure-reaction policy.

use std::num::ParseIntError;
use std::time::Duration;

use config::ConfigError;

use crate::LeaseId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Lease store RPC failures (get, put, grant, keep-alive, watch)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Stored TTL value could not be decoded
    #[error("Malformed monitor record at {key}: ttl value {value:?} is not an integer")]
    MalformedRecord {
        key: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// Caller supplied arguments violating a precondition
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failure handler could not react to a detected failure
    #[error("Failure handler error: {0}")]
    Handler(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Store endpoint unreachable or refusing requests
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Request exceeded its deadline
    #[error("Store request timed out after {0:?}")]
    Timeout(Duration),

    /// Lease expired, was revoked, or never existed
    #[error("Lease {0} not found")]
    LeaseNotFound(LeaseId),

    /// Lease grant with a non-positive ttl
    #[error("Invalid lease ttl: {0}s")]
    InvalidTtl(u64),

    /// Any other backend-specific failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "etcd")]
impl From<etcd_client::Error> for StoreError {
    fn from(err: etcd_client::Error) -> Self {
        match err {
            etcd_client::Error::TransportError(e) => StoreError::Unavailable(e.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
