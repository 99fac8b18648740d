use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Entities the bundled binary keeps alive, and how often.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HeartbeatConfig {
    #[serde(default)]
    pub entities: Vec<String>,

    /// Delay between two refreshes of the same monitor
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Lease ttl requested for every monitor
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            interval_secs: default_interval_secs(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl HeartbeatConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 || self.ttl_secs == 0 {
            return Err(Error::Config(ConfigError::Message(
                "heartbeat interval_secs and ttl_secs must be positive".into(),
            )));
        }

        // A refresh cadence at or above the ttl lets every lease lapse
        if self.interval_secs >= self.ttl_secs {
            return Err(Error::Config(ConfigError::Message(format!(
                "heartbeat interval_secs ({}) must be lower than ttl_secs ({})",
                self.interval_secs, self.ttl_secs
            ))));
        }

        if self.entities.iter().any(|name| name.is_empty()) {
            return Err(Error::Config(ConfigError::Message(
                "heartbeat entity names cannot be empty".into(),
            )));
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval_secs() -> u64 {
    10
}

fn default_ttl_secs() -> u64 {
    30
}
