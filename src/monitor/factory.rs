use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::ErrorHandler;
use super::FailureHandler;
use super::LeaseMonitorService;
use crate::KeyNamer;
use crate::LeaseStore;
use crate::MonitorConfig;

/// Builds independent monitor services over one shared store connection.
///
/// Each service gets its own handlers, watcher set and child token, so
/// subsystems never share handler state. Canceling the factory token stops
/// the watchers of every service built from it.
pub struct MonitorFactory<S: LeaseStore> {
    store: Arc<S>,
    config: MonitorConfig,
    token: CancellationToken,
}

impl<S: LeaseStore> MonitorFactory<S> {
    pub fn new(
        store: Arc<S>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            config,
            token: CancellationToken::new(),
        }
    }

    pub fn with_cancellation_token(
        mut self,
        token: CancellationToken,
    ) -> Self {
        self.token = token;
        self
    }

    pub fn build(
        &self,
        failure_handler: Arc<dyn FailureHandler>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> LeaseMonitorService<S> {
        LeaseMonitorService::new(self.store.clone(), failure_handler, error_handler)
            .with_key_namer(KeyNamer::new(self.config.namespace.as_str()))
            .with_request_timeout(self.config.request_timeout())
            .with_watch_retry(self.config.watch_retry())
            .with_cancellation_token(self.token.child_token())
    }

    /// Stop the watchers of every service built by this factory
    pub fn cancel_all(&self) {
        self.token.cancel();
    }
}
