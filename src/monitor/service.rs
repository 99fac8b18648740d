//! Lease-backed monitor service.
//!
//! `refresh_monitor` either renews the lease behind a monitor key or replaces
//! it:
//!
//! ```text
//! get(key) ──▶ exists && stored ttl == ttl ──▶ keep_alive_once(lease)      (heartbeat)
//!          └─▶ otherwise ──▶ grant(ttl) ─▶ put(key, "ttl", lease) ─▶ watch(key) ─▶ spawn watcher
//!                                                                  └─ failed ─▶ spawn retrying watcher
//! ```
//!
//! Once the put succeeds the refresh succeeds. A watch that fails to open is
//! reopened in the background with a doubling delay under the service token;
//! mutations missed while it was closed are recovered from a fresh read.
//!
//! A ttl change always recreates the lease: the store offers no way to change
//! the ttl of an existing one. Neither the previous lease nor a lease granted
//! before a failed put is revoked here; both lapse on their own ttl.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use futures::stream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ErrorHandler;
use super::FailureContext;
use super::FailureHandler;
use super::MonitorRecord;
use super::WatcherTask;
use crate::metrics;
use crate::Entity;
use crate::Error;
use crate::Event;
use crate::KeyNamer;
use crate::LeaseStore;
use crate::MonitorConfig;
use crate::Result;
use crate::StoreError;
use crate::StoreResult;
use crate::WatchEvent;
use crate::WatchRetryPolicy;
use crate::WatchStream;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait MonitorService: Send + Sync + 'static {
    /// Start a new monitor for `name`, or reset the existing one.
    ///
    /// Store failures before the put completes are returned as-is and never
    /// retried; opening the watch afterwards is retried in the background. Dropping the
    /// returned future abandons the refresh; watchers already started keep
    /// running under the service's own token.
    async fn refresh_monitor(
        &self,
        name: &str,
        entity: &Entity,
        event: &Event,
        ttl_secs: u64,
    ) -> Result<()>;
}

pub struct LeaseMonitorService<S: LeaseStore> {
    store: Arc<S>,
    key_namer: KeyNamer,
    failure_handler: Arc<dyn FailureHandler>,
    error_handler: Arc<dyn ErrorHandler>,
    request_timeout: Option<Duration>,
    watch_retry: WatchRetryPolicy,
    /// Parent of every watcher's token; outlives individual refresh calls
    watch_token: CancellationToken,
    watchers: TaskTracker,
}

impl<S: LeaseStore> LeaseMonitorService<S> {
    pub fn new(
        store: Arc<S>,
        failure_handler: Arc<dyn FailureHandler>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Self {
        let config = MonitorConfig::default();
        Self {
            store,
            key_namer: KeyNamer::new(config.namespace.as_str()),
            failure_handler,
            error_handler,
            request_timeout: config.request_timeout(),
            watch_retry: config.watch_retry(),
            watch_token: CancellationToken::new(),
            watchers: TaskTracker::new(),
        }
    }

    pub fn with_key_namer(
        mut self,
        key_namer: KeyNamer,
    ) -> Self {
        self.key_namer = key_namer;
        self
    }

    /// `None` disables the per-request deadline
    pub fn with_request_timeout(
        mut self,
        request_timeout: Option<Duration>,
    ) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_watch_retry(
        mut self,
        watch_retry: WatchRetryPolicy,
    ) -> Self {
        self.watch_retry = watch_retry;
        self
    }

    /// Bind watchers to `token`: canceling it stops them without callbacks.
    pub fn with_cancellation_token(
        mut self,
        token: CancellationToken,
    ) -> Self {
        self.watch_token = token;
        self
    }

    pub fn key_namer(&self) -> &KeyNamer {
        &self.key_namer
    }

    /// Watcher tasks still running
    pub fn active_watchers(&self) -> usize {
        self.watchers.len()
    }

    /// Cancel every watcher started by this service and wait for them to exit.
    pub async fn shutdown(&self) {
        self.watch_token.cancel();
        self.watchers.close();
        self.watchers.wait().await;
        debug!("monitor service shut down");
    }

    async fn get_monitor(
        &self,
        key: &str,
    ) -> Result<Option<MonitorRecord>> {
        match self.call(self.store.get(key)).await? {
            Some(kv) => MonitorRecord::from_key_value(kv).map(Some),
            None => Ok(None),
        }
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        with_request_timeout(self.request_timeout, request).await
    }

    fn start_watcher(
        &self,
        task: WatcherTask,
    ) {
        self.watchers.spawn(async move {
            let exit = task.run().await;
            debug!(?exit, "monitor watcher exited");
        });
    }

    fn start_recovering_watcher(
        &self,
        context: FailureContext,
        token: CancellationToken,
    ) {
        let store = self.store.clone();
        let request_timeout = self.request_timeout;
        let watch_retry = self.watch_retry;
        let failure_handler = self.failure_handler.clone();
        let error_handler = self.error_handler.clone();

        self.watchers.spawn(async move {
            let reopened = reopen_watch(store.as_ref(), &context.record, request_timeout, watch_retry, &token).await;
            let Some(events) = reopened else {
                debug!(key = %context.record.key, "monitor watch retry canceled");
                return;
            };
            let exit = WatcherTask::new(context, events, failure_handler, error_handler, token)
                .run()
                .await;
            debug!(?exit, "monitor watcher exited");
        });
    }
}

#[async_trait::async_trait]
impl<S: LeaseStore> MonitorService for LeaseMonitorService<S> {
    async fn refresh_monitor(
        &self,
        name: &str,
        entity: &Entity,
        event: &Event,
        ttl_secs: u64,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("monitor name cannot be empty".into()));
        }
        if ttl_secs == 0 {
            return Err(Error::InvalidArgument(format!("monitor {name} ttl must be positive")));
        }

        let key = self.key_namer.build(name);

        // Same ttl: heartbeat on the existing lease
        if let Some(record) = self.get_monitor(&key).await? {
            if record.ttl_secs == ttl_secs {
                debug!(%key, lease_id = %record.lease_id, "renewing monitor lease");
                self.call(self.store.keep_alive_once(record.lease_id)).await?;
                metrics::MONITOR_RENEWALS.inc();
                return Ok(());
            }
            info!(
                %key,
                old_ttl_secs = record.ttl_secs,
                ttl_secs,
                "monitor ttl changed, replacing lease"
            );
        }

        let lease_id = self.call(self.store.grant(ttl_secs)).await?;
        let record = MonitorRecord::new(key, lease_id, ttl_secs);
        self.call(self.store.put(&record.key, &record.stored_value(), lease_id))
            .await?;
        metrics::MONITORS_CREATED.inc();
        info!(key = %record.key, %lease_id, ttl_secs, "monitor created");

        let context = FailureContext::new(record, entity, event);
        let token = self.watch_token.child_token();
        let watched = self.call(self.store.watch(&context.record.key)).await;
        match watched {
            Ok(events) => self.start_watcher(WatcherTask::new(
                context,
                events,
                self.failure_handler.clone(),
                self.error_handler.clone(),
                token,
            )),
            Err(e) => {
                warn!(key = %context.record.key, "monitor watch failed to open, retrying: {}", e);
                self.start_recovering_watcher(context, token);
            }
        }
        Ok(())
    }
}

pub(crate) async fn with_request_timeout<T>(
    request_timeout: Option<Duration>,
    request: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match request_timeout {
        Some(duration) => tokio::time::timeout(duration, request)
            .await
            .map_err(|_| StoreError::Timeout(duration))?,
        None => request.await,
    }
}

/// Reopen the watch on `record.key` until it succeeds or `token` is canceled.
///
/// Mutations applied while no watch was open are replayed from a fresh read:
/// a missing key becomes a `Delete`, a key bound to another lease a `Put`.
async fn reopen_watch<S: LeaseStore>(
    store: &S,
    record: &MonitorRecord,
    request_timeout: Option<Duration>,
    watch_retry: WatchRetryPolicy,
    token: &CancellationToken,
) -> Option<WatchStream> {
    let mut delay = watch_retry.base_delay;
    let events = loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        match with_request_timeout(request_timeout, store.watch(&record.key)).await {
            Ok(events) => break events,
            Err(e) => {
                warn!(key = %record.key, ?delay, "monitor watch retry failed: {}", e);
                delay = watch_retry.next_delay(delay);
            }
        }
    };

    let missed = match with_request_timeout(request_timeout, store.get(&record.key)).await {
        Ok(None) => Some(WatchEvent::delete(record.key.as_str())),
        Ok(Some(kv)) if kv.lease_id != record.lease_id => Some(WatchEvent::put(kv.key, kv.value)),
        Ok(Some(_)) => None,
        Err(e) => {
            warn!(key = %record.key, "could not read monitor key after reopening watch: {}", e);
            None
        }
    };
    info!(key = %record.key, lease_id = %record.lease_id, "monitor watch reopened");

    Some(match missed {
        Some(event) => stream::iter([event]).chain(events).boxed(),
        None => events,
    })
}
