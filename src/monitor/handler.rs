//! Failure-reaction policy plugged into a monitor service.

#[cfg(test)]
use mockall::automock;
use tracing::error;
use tracing::warn;

use super::MonitorRecord;
use crate::Entity;
use crate::Error;
use crate::Event;
use crate::Result;

/// Reacts to a monitor whose lease expired.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait FailureHandler: Send + Sync + 'static {
    /// Receives the snapshot captured when the expired lease was created.
    async fn handle_failure(
        &self,
        entity: &Entity,
        event: &Event,
    ) -> Result<()>;
}

/// Terminal sink for errors returned by a [`FailureHandler`].
#[cfg_attr(test, automock)]
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle_error(
        &self,
        error: Error,
    );
}

/// Snapshot handed to a watcher at lease creation, delivered as-is on expiry.
#[derive(Debug, Clone)]
pub struct FailureContext {
    pub record: MonitorRecord,
    pub entity: Entity,
    pub event: Event,
}

impl FailureContext {
    pub fn new(
        record: MonitorRecord,
        entity: &Entity,
        event: &Event,
    ) -> Self {
        Self {
            record,
            entity: entity.clone(),
            event: event.clone(),
        }
    }
}

/// Logs the failure and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFailureHandler;

#[async_trait::async_trait]
impl FailureHandler for LoggingFailureHandler {
    async fn handle_failure(
        &self,
        entity: &Entity,
        event: &Event,
    ) -> Result<()> {
        warn!(
            entity = %entity.id,
            class = %entity.class,
            last_event = event.timestamp,
            "entity presumed down: monitor lease expired"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorHandler;

impl ErrorHandler for LoggingErrorHandler {
    fn handle_error(
        &self,
        error: Error,
    ) {
        error!("monitor failure handler error: {}", error);
    }
}
