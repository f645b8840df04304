mod common;

use common::{serve_scripted, trigger};
use costrig_provider::adapter::ProviderAdapter;
use costrig_provider::config::CoordinatorConfig;
use costrig_provider::coordinator::{
    ACTIVE_FIELD, CoordinationStore, FailoverCoordinator, MemoryCoordination,
    SwapOutcome,
};
use costrig_provider::fire::FireEngine;
use costrig_provider::registry::TriggerRegistry;
use costrig_provider::source::{ChannelEventSource, SourceCallbacks};
use costrig_storage::MemoryTriggerStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn config(host: &str) -> CoordinatorConfig {
    CoordinatorConfig {
        worker: "worker0".to_string(),
        host: host.to_string(),
        key_prefix: "costrigger".to_string(),
        redis_url: None,
    }
}

fn pair(
    store: &Arc<MemoryCoordination>,
) -> (Arc<FailoverCoordinator>, Arc<FailoverCoordinator>) {
    let shared: Arc<dyn CoordinationStore> = store.clone();
    let host0 = Arc::new(FailoverCoordinator::new(
        &config("host0"),
        shared.clone(),
    ));
    let host1 =
        Arc::new(FailoverCoordinator::new(&config("host1"), shared));
    (host0, host1)
}

async fn converged(
    coordinator: &FailoverCoordinator,
    expected: &str,
) -> bool {
    for _ in 0..20 {
        if coordinator.active_host().await == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn first_writer_claims_active_and_second_adopts() {
    let store = Arc::new(MemoryCoordination::new());
    let (host0, host1) = pair(&store);

    host0.init().await.unwrap();
    assert!(host0.is_active().await);

    host1.init().await.unwrap();
    assert!(!host1.is_active().await);
    assert_eq!(host1.active_host().await, "host0");
}

#[tokio::test]
async fn second_starter_claims_when_it_writes_first() {
    let store = Arc::new(MemoryCoordination::new());
    let (host0, host1) = pair(&store);

    host1.init().await.unwrap();
    assert!(host1.is_active().await);

    host0.init().await.unwrap();
    assert!(!host0.is_active().await);
    assert_eq!(host0.active_host().await, "host1");
}

#[tokio::test]
async fn handoff_moves_active_to_the_other_candidate() {
    let store = Arc::new(MemoryCoordination::new());
    let (host0, host1) = pair(&store);
    host0.init().await.unwrap();
    host1.init().await.unwrap();

    host0.handoff().await;

    let stored = store
        .get_active("costrigger_worker0", ACTIVE_FIELD)
        .await
        .unwrap();
    assert_eq!(stored.as_deref(), Some("host1"));
    assert!(converged(&host1, "host1").await);
    assert!(host1.is_active().await);
}

#[tokio::test]
async fn handoff_from_standby_is_a_no_op() {
    let store = Arc::new(MemoryCoordination::new());
    let (host0, host1) = pair(&store);
    host0.init().await.unwrap();
    host1.init().await.unwrap();

    host1.handoff().await;

    let stored = store
        .get_active("costrigger_worker0", ACTIVE_FIELD)
        .await
        .unwrap();
    assert_eq!(stored.as_deref(), Some("host0"));
}

#[tokio::test]
async fn operator_swap_propagates_to_both_hosts() {
    let store = Arc::new(MemoryCoordination::new());
    let (host0, host1) = pair(&store);
    host0.init().await.unwrap();
    host1.init().await.unwrap();

    let outcome = host1.request_active("host1").await.unwrap();
    assert_eq!(outcome, SwapOutcome::Swapping);

    assert!(converged(&host0, "host1").await);
    assert!(converged(&host1, "host1").await);
    assert!(host1.is_active().await);
    assert!(!host0.is_active().await);

    // Requesting the current active host again changes nothing.
    let outcome = host1.request_active("host1").await.unwrap();
    assert_eq!(outcome, SwapOutcome::Unchanged);
}

#[tokio::test]
async fn standby_host_never_fires() {
    let (router, script) = serve_scripted(vec![200]).await;

    let store = MemoryTriggerStore::new();
    let registry = Arc::new(TriggerRegistry::new(
        Arc::new(store),
        ChannelEventSource::new(),
    ));
    let engine = Arc::new(FireEngine::new(
        reqwest::Client::new(),
        &router,
        registry.clone(),
    ));

    let coordination = Arc::new(MemoryCoordination::new());
    let (host0, host1) = pair(&coordination);
    host0.init().await.unwrap();
    host1.init().await.unwrap();

    // The adapter runs on the standby host.
    let adapter =
        ProviderAdapter::new(registry.clone(), engine, host1.clone());
    registry.create(trigger("/ns/t1", "worker0"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    adapter.fire_trigger("/ns/t1", json!({})).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(script.hits(), 0);
}

#[tokio::test]
async fn fire_for_unknown_trigger_is_a_silent_no_op() {
    let (router, script) = serve_scripted(vec![200]).await;

    let store = MemoryTriggerStore::new();
    let registry = Arc::new(TriggerRegistry::new(
        Arc::new(store),
        ChannelEventSource::new(),
    ));
    let engine = Arc::new(FireEngine::new(
        reqwest::Client::new(),
        &router,
        registry.clone(),
    ));

    let coordination = Arc::new(MemoryCoordination::new());
    let (host0, _host1) = pair(&coordination);
    host0.init().await.unwrap();

    let adapter = ProviderAdapter::new(registry, engine, host0);
    adapter.fire_trigger("/ns/unknown", json!({})).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(script.hits(), 0);
}
