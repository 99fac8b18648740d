use std::time::Duration;

use d_monitor::LeaseStore;
use d_monitor::MonitorService;
use tokio::time::sleep;

use crate::common::enable_logger;
use crate::common::entity;
use crate::common::keepalive_event;
use crate::common::monitor_service;
use crate::common::monitor_service_with;
use crate::common::started_store;
use crate::common::TTL_SECS;

#[tokio::test(start_paused = true)]
async fn test_unrefreshed_monitor_reports_failure_once() {
    enable_logger();
    let store = started_store();
    let (service, mut failures) = monitor_service(store.clone());
    let e = entity("entity1");
    let ev = keepalive_event(&e);

    service.refresh_monitor("entity1", &e, &ev, TTL_SECS).await.unwrap();

    let kv = store.get("monitors/entity1").await.unwrap().unwrap();
    assert_eq!(kv.value, "30");

    sleep(Duration::from_secs(TTL_SECS + 1)).await;
    let (failed_entity, failed_event) = failures.recv().await.unwrap();
    assert_eq!(failed_entity, e);
    assert_eq!(failed_event, ev);
    assert!(store.get("monitors/entity1").await.unwrap().is_none());

    sleep(Duration::from_secs(TTL_SECS)).await;
    assert!(failures.try_recv().is_err());
    assert_eq!(service.active_watchers(), 0);
    store.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_periodic_refresh_keeps_single_lease_alive() {
    enable_logger();
    let store = started_store();
    let (service, mut failures) = monitor_service(store.clone());
    let e = entity("entity1");
    let ev = keepalive_event(&e);

    for _ in 0..10 {
        service.refresh_monitor("entity1", &e, &ev, TTL_SECS).await.unwrap();
        sleep(Duration::from_secs(10)).await;
    }

    assert!(failures.try_recv().is_err());
    assert_eq!(store.lease_count(), 1);
    assert_eq!(store.watcher_count("monitors/entity1"), 1);
    assert_eq!(service.active_watchers(), 1);

    // Refreshes stop: the lease lapses
    let (failed_entity, _) = failures.recv().await.unwrap();
    assert_eq!(failed_entity.id, "entity1");
    store.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_only_silent_entities_fail() {
    enable_logger();
    let store = started_store();
    let (service, mut failures) = monitor_service(store.clone());
    let alive = entity("alive");
    let silent = entity("silent");

    service
        .refresh_monitor("alive", &alive, &keepalive_event(&alive), TTL_SECS)
        .await
        .unwrap();
    service
        .refresh_monitor("silent", &silent, &keepalive_event(&silent), TTL_SECS)
        .await
        .unwrap();

    for _ in 0..4 {
        sleep(Duration::from_secs(10)).await;
        service
            .refresh_monitor("alive", &alive, &keepalive_event(&alive), TTL_SECS)
            .await
            .unwrap();
    }

    let (failed_entity, _) = failures.recv().await.unwrap();
    assert_eq!(failed_entity.id, "silent");
    assert!(failures.try_recv().is_err());
    assert!(store.get("monitors/alive").await.unwrap().is_some());

    service.shutdown().await;
    store.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failure_handler_error_is_routed_to_error_handler() {
    enable_logger();
    let store = started_store();
    let (service, mut failures, errors) = monitor_service_with(store.clone(), Some("pager unavailable"));
    let e = entity("entity1");

    service
        .refresh_monitor("entity1", &e, &keepalive_event(&e), TTL_SECS)
        .await
        .unwrap();

    failures.recv().await.unwrap();
    service.shutdown().await;

    let errors = errors.errors.lock().clone();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("pager unavailable"));
    store.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_silences_pending_monitors() {
    enable_logger();
    let store = started_store();
    let (service, mut failures) = monitor_service(store.clone());
    let e = entity("entity1");

    service
        .refresh_monitor("entity1", &e, &keepalive_event(&e), TTL_SECS)
        .await
        .unwrap();
    service.shutdown().await;
    assert_eq!(store.watched_key_count(), 0);

    sleep(Duration::from_secs(TTL_SECS * 2)).await;
    assert!(store.get("monitors/entity1").await.unwrap().is_none());
    assert!(failures.try_recv().is_err());
    store.stop().await;
}
