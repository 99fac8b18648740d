use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::KEY_SEPARATOR;
use crate::constants::MONITOR_PATH_PREFIX;
use crate::Error;
use crate::Result;

/// Settings shared by every monitor service built from one configuration.
///
/// ```toml
/// [monitor]
/// namespace = "monitors"
/// request_timeout_ms = 5000  # 0 disables the per-request deadline
/// watch_retry_base_delay_ms = 100
/// watch_retry_max_delay_ms = 5000
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Key prefix monitor keys are created under
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Deadline applied to each store request issued by `refresh_monitor`
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// First delay before reopening a watch that failed to open (unit: milliseconds)
    #[serde(default = "default_watch_retry_base_delay_ms")]
    pub watch_retry_base_delay_ms: u64,

    /// Upper bound of the doubling watch retry delay (unit: milliseconds)
    #[serde(default = "default_watch_retry_max_delay_ms")]
    pub watch_retry_max_delay_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            request_timeout_ms: default_request_timeout_ms(),
            watch_retry_base_delay_ms: default_watch_retry_base_delay_ms(),
            watch_retry_max_delay_ms: default_watch_retry_max_delay_ms(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "monitor namespace cannot be empty".into(),
            )));
        }

        if self.namespace.ends_with(KEY_SEPARATOR) {
            return Err(Error::Config(ConfigError::Message(format!(
                "monitor namespace {:?} must not end with '{}'",
                self.namespace, KEY_SEPARATOR
            ))));
        }

        if self.watch_retry_base_delay_ms == 0 || self.watch_retry_base_delay_ms > self.watch_retry_max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "watch_retry_base_delay_ms ({}) must be positive and not exceed watch_retry_max_delay_ms ({})",
                self.watch_retry_base_delay_ms, self.watch_retry_max_delay_ms
            ))));
        }

        Ok(())
    }

    pub fn watch_retry(&self) -> WatchRetryPolicy {
        WatchRetryPolicy {
            base_delay: Duration::from_millis(self.watch_retry_base_delay_ms),
            max_delay: Duration::from_millis(self.watch_retry_max_delay_ms),
        }
    }

    /// `None` when request deadlines are disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

fn default_namespace() -> String {
    MONITOR_PATH_PREFIX.to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_watch_retry_base_delay_ms() -> u64 {
    100
}

fn default_watch_retry_max_delay_ms() -> u64 {
    5000
}

/// Doubling backoff used to reopen a watch after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchRetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for WatchRetryPolicy {
    fn default() -> Self {
        MonitorConfig::default().watch_retry()
    }
}

impl WatchRetryPolicy {
    /// Delay following `current`
    pub fn next_delay(
        &self,
        current: Duration,
    ) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}
