use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use d_monitor::KeyValue;
use d_monitor::LeaseId;
use d_monitor::LeaseMonitorService;
use d_monitor::LeaseStore;
use d_monitor::MemLeaseStore;
use d_monitor::MonitorService;
use d_monitor::StoreError;
use d_monitor::StoreResult;
use d_monitor::WatchStream;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::common::enable_logger;
use crate::common::entity;
use crate::common::keepalive_event;
use crate::common::started_store;
use crate::common::ChannelFailureHandler;
use crate::common::CollectingErrorHandler;
use crate::common::TTL_SECS;

/// In-memory store whose first `failing_watches` watch calls are refused
struct FlakyWatchStore {
    inner: Arc<MemLeaseStore>,
    failing_watches: usize,
    watch_calls: AtomicUsize,
}

#[async_trait::async_trait]
impl LeaseStore for FlakyWatchStore {
    async fn get(
        &self,
        key: &str,
    ) -> StoreResult<Option<KeyValue>> {
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        lease_id: LeaseId,
    ) -> StoreResult<()> {
        self.inner.put(key, value, lease_id).await
    }

    async fn grant(
        &self,
        ttl_secs: u64,
    ) -> StoreResult<LeaseId> {
        self.inner.grant(ttl_secs).await
    }

    async fn keep_alive_once(
        &self,
        lease_id: LeaseId,
    ) -> StoreResult<()> {
        self.inner.keep_alive_once(lease_id).await
    }

    async fn watch(
        &self,
        key: &str,
    ) -> StoreResult<WatchStream> {
        if self.watch_calls.fetch_add(1, Ordering::SeqCst) < self.failing_watches {
            return Err(StoreError::Unavailable("watch stream reset".into()));
        }
        self.inner.watch(key).await
    }
}

fn flaky_service(
    inner: Arc<MemLeaseStore>,
    failing_watches: usize,
) -> (
    LeaseMonitorService<FlakyWatchStore>,
    mpsc::UnboundedReceiver<(d_monitor::Entity, d_monitor::Event)>,
) {
    let store = Arc::new(FlakyWatchStore {
        inner,
        failing_watches,
        watch_calls: AtomicUsize::new(0),
    });
    let (failure_handler, failures) = ChannelFailureHandler::new();
    let service = LeaseMonitorService::new(
        store,
        Arc::new(failure_handler),
        Arc::new(CollectingErrorHandler::default()),
    );
    (service, failures)
}

#[tokio::test(start_paused = true)]
async fn test_expiry_reported_after_watch_failed_to_open() {
    enable_logger();
    let store = started_store();
    let (service, mut failures) = flaky_service(store.clone(), 1);
    let e = entity("entity1");
    let ev = keepalive_event(&e);

    service.refresh_monitor("entity1", &e, &ev, TTL_SECS).await.unwrap();
    service.refresh_monitor("entity1", &e, &ev, TTL_SECS).await.unwrap();
    assert_eq!(service.active_watchers(), 1);

    sleep(Duration::from_secs(TTL_SECS * 4)).await;
    assert!(store.get("monitors/entity1").await.unwrap().is_none());

    let (failed_entity, failed_event) = failures.try_recv().unwrap();
    assert_eq!(failed_entity, e);
    assert_eq!(failed_event, ev);
    assert!(failures.try_recv().is_err());
    store.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_expiry_during_watch_outage_is_reported_once_watch_reopens() {
    enable_logger();
    let store = started_store();
    // Retry delays double up to 5s: the watch only reopens at ~36s, after the lease lapsed
    let (service, mut failures) = flaky_service(store.clone(), 12);
    let e = entity("entity1");

    service
        .refresh_monitor("entity1", &e, &keepalive_event(&e), TTL_SECS)
        .await
        .unwrap();

    let (failed_entity, _) = failures.recv().await.unwrap();
    assert_eq!(failed_entity, e);

    sleep(Duration::from_secs(TTL_SECS)).await;
    assert!(failures.try_recv().is_err());
    assert_eq!(service.active_watchers(), 0);
    store.stop().await;
}
