//! Lease store backend configuration
//!
//! ```toml
//! [store]
//! backend = "memory"         # or "etcd" (requires the `etcd` feature)
//! endpoints = ["http://127.0.0.1:2379"]
//! expiry_interval_ms = 500   # in-memory store only
//! ```

use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process lease store
    #[default]
    Memory,
    /// Remote etcd cluster
    Etcd,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// etcd endpoints, ignored by the in-memory backend
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// How often the in-memory store sweeps expired leases
    ///
    /// Range: 10-60000 ms. Expired leases are also purged lazily on every
    /// store operation, so this only bounds how late a `Delete` event can
    /// be delivered to watchers when the store is otherwise idle.
    #[serde(default = "default_expiry_interval_ms")]
    pub expiry_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            endpoints: Vec::new(),
            expiry_interval_ms: default_expiry_interval_ms(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if !(10..=60_000).contains(&self.expiry_interval_ms) {
            return Err(Error::Config(ConfigError::Message(format!(
                "store expiry_interval_ms must be between 10 and 60000, got {}",
                self.expiry_interval_ms
            ))));
        }

        if self.backend == StoreBackend::Etcd && self.endpoints.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "etcd backend requires at least one endpoint".into(),
            )));
        }

        Ok(())
    }

    pub fn expiry_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_interval_ms)
    }
}

fn default_expiry_interval_ms() -> u64 {
    500
}
