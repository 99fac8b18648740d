//! Configuration management for the monitor service.
//!
//! Provides hierarchical configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. File named by the `CONFIG_PATH` environment variable
//! 3. Explicit override file (`with_override_config`)
//! 4. Environment variables prefixed with `MONITOR__` (highest priority)
//!
//! Validation is deferred to [`Settings::validate`].

mod heartbeat;
mod monitor;
mod monitoring;
mod store;
pub use heartbeat::*;
pub use monitor::*;
pub use monitoring::*;
pub use store::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Monitor namespace and store request deadlines
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Lease store backend selection
    #[serde(default)]
    pub store: StoreConfig,
    /// Metrics and monitoring settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Heartbeat loop driven by the bundled binary
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

impl Settings {
    /// Build settings from defaults, the `CONFIG_PATH` file (if set) and
    /// `MONITOR__*` environment variables.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Layer the file at `path` on top of the current settings.
    /// Environment variables still take precedence.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn validate(self) -> Result<Self> {
        self.monitor.validate()?;
        self.store.validate()?;
        self.monitoring.validate()?;
        self.heartbeat.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("store.endpoints")
        .with_list_parse_key("heartbeat.entities")
}
