//! Per-lease watcher task.
//!
//! One task is started for every lease created by a refresh. It consumes the
//! watch stream of its key and ends on the first terminal event:
//!
//! ```text
//!            Delete ┌────────┐  failure handler (once)
//!        ┌─────────▶│ Failed │
//! ┌──────┴─┐        └────────┘
//! │ Active │  Put   ┌────────────┐  shutdown diagnostics only
//! └──────┬─┴───────▶│ Superseded │
//!        │          └────────────┘
//!        │ token canceled / stream closed: exit, no callbacks
//! ```
//!
//! A `Put` means another refresh rebound the key to a new lease and started
//! its own watcher; this one steps aside so only one watcher ever reports on a
//! logical monitor.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use super::ErrorHandler;
use super::FailureContext;
use super::FailureHandler;
use crate::metrics;
use crate::WatchEventType;
use crate::WatchStream;

/// How a watcher task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherExit {
    /// Key deleted: the lease expired, failure handler invoked
    Failed,
    /// Key rewritten by a newer lease
    Superseded,
    /// Governing token canceled
    Canceled,
    /// Store closed the watch stream
    StreamClosed,
}

pub struct WatcherTask {
    context: FailureContext,
    events: WatchStream,
    failure_handler: Arc<dyn FailureHandler>,
    error_handler: Arc<dyn ErrorHandler>,
    token: CancellationToken,
}

impl WatcherTask {
    pub fn new(
        context: FailureContext,
        events: WatchStream,
        failure_handler: Arc<dyn FailureHandler>,
        error_handler: Arc<dyn ErrorHandler>,
        token: CancellationToken,
    ) -> Self {
        Self {
            context,
            events,
            failure_handler,
            error_handler,
            token,
        }
    }

    /// Drive the task to its terminal state.
    ///
    /// Consumes the task: the watch subscription is released on return,
    /// whatever the exit path.
    pub async fn run(mut self) -> WatcherExit {
        let _active = metrics::GaugeGuard::inc(&metrics::ACTIVE_WATCHERS);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!(key = %self.context.record.key, "monitor watch canceled");
                    break WatcherExit::Canceled;
                }
                next = self.events.next() => match next {
                    Some(event) => match event.event_type {
                        WatchEventType::Delete => {
                            Self::fail(&self.context, &self.failure_handler, &self.error_handler).await;
                            break WatcherExit::Failed;
                        }
                        WatchEventType::Put => {
                            info!(key = %self.context.record.key, "shutting down monitor");
                            metrics::MONITOR_SUPERSEDED.inc();
                            break WatcherExit::Superseded;
                        }
                    },
                    None => {
                        debug!(key = %self.context.record.key, "monitor watch stream closed");
                        break WatcherExit::StreamClosed;
                    }
                }
            }
        }
    }

    // Borrows only the fields it needs: the watch stream is not `Sync`
    async fn fail(
        context: &FailureContext,
        failure_handler: &Arc<dyn FailureHandler>,
        error_handler: &Arc<dyn ErrorHandler>,
    ) {
        let FailureContext { record, entity, event } = context;
        info!(
            key = %record.key,
            lease_id = %record.lease_id,
            ttl_secs = record.ttl_secs,
            "monitor timed out, handling failure"
        );
        metrics::MONITOR_FAILURES.inc();

        if let Err(e) = failure_handler.handle_failure(entity, event).await {
            metrics::FAILURE_HANDLER_ERRORS.inc();
            error_handler.handle_error(e);
        }
    }
}
