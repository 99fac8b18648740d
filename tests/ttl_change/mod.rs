use std::time::Duration;

use d_monitor::LeaseStore;
use d_monitor::MonitorService;
use tokio::time::sleep;

use crate::common::enable_logger;
use crate::common::entity;
use crate::common::keepalive_event;
use crate::common::monitor_service;
use crate::common::started_store;

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_ttl_change_supersedes_previous_watcher() {
    enable_logger();
    let store = started_store();
    let (service, mut failures) = monitor_service(store.clone());
    let e = entity("entity1");
    let ev = keepalive_event(&e);

    service.refresh_monitor("entity1", &e, &ev, 30).await.unwrap();
    let first = store.get("monitors/entity1").await.unwrap().unwrap();

    service.refresh_monitor("entity1", &e, &ev, 60).await.unwrap();
    let second = store.get("monitors/entity1").await.unwrap().unwrap();
    assert_eq!(second.value, "60");
    assert_ne!(first.lease_id, second.lease_id);

    settle().await;
    assert_eq!(service.active_watchers(), 1);
    assert_eq!(store.watcher_count("monitors/entity1"), 1);

    // Previous lease is left to lapse on its own
    assert_eq!(store.lease_count(), 2);
    sleep(Duration::from_secs(45)).await;
    assert_eq!(store.lease_count(), 1);
    assert!(failures.try_recv().is_err());

    // Only the replacement reports
    let (failed_entity, _) = failures.recv().await.unwrap();
    assert_eq!(failed_entity, e);
    settle().await;
    assert!(failures.try_recv().is_err());
    assert_eq!(service.active_watchers(), 0);
    store.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failure_carries_snapshot_of_latest_lease() {
    enable_logger();
    let store = started_store();
    let (service, mut failures) = monitor_service(store.clone());
    let e = entity("entity1");

    let first_event = keepalive_event(&e);
    service.refresh_monitor("entity1", &e, &first_event, 30).await.unwrap();

    let mut second_event = keepalive_event(&e);
    second_event.timestamp += 10;
    service.refresh_monitor("entity1", &e, &second_event, 20).await.unwrap();

    let (_, failed_event) = failures.recv().await.unwrap();
    assert_eq!(failed_event, second_event);
    store.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_same_ttl_refresh_keeps_creation_snapshot() {
    enable_logger();
    let store = started_store();
    let (service, mut failures) = monitor_service(store.clone());
    let e = entity("entity1");

    let first_event = keepalive_event(&e);
    service.refresh_monitor("entity1", &e, &first_event, 30).await.unwrap();

    let mut renewal_event = keepalive_event(&e);
    renewal_event.timestamp += 10;
    service.refresh_monitor("entity1", &e, &renewal_event, 30).await.unwrap();

    let (_, failed_event) = failures.recv().await.unwrap();
    assert_eq!(failed_event, first_event);
    store.stop().await;
}
