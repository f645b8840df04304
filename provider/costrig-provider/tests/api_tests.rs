mod common;

use base64::Engine;
use costrig_provider::config::{CoordinatorConfig, ServerConfig};
use costrig_provider::coordinator::{FailoverCoordinator, MemoryCoordination};
use costrig_provider::registry::TriggerRegistry;
use costrig_provider::server::ApiServer;
use costrig_provider::source::ChannelEventSource;
use costrig_storage::MemoryTriggerStore;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

async fn serve_api(
    endpoint_auth: Option<&str>,
) -> (String, Arc<TriggerRegistry>, Arc<FailoverCoordinator>) {
    let registry = Arc::new(TriggerRegistry::new(
        Arc::new(MemoryTriggerStore::new()),
        ChannelEventSource::new(),
    ));
    let coordinator = Arc::new(FailoverCoordinator::new(
        &CoordinatorConfig {
            worker: "worker0".to_string(),
            host: "host0".to_string(),
            key_prefix: "costrigger".to_string(),
            redis_url: None,
        },
        Arc::new(MemoryCoordination::new()),
    ));
    coordinator.init().await.unwrap();

    let server = ApiServer::new(
        registry.clone(),
        coordinator.clone(),
        ServerConfig { port: 0 },
        endpoint_auth.map(|s| s.to_string()),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server.into_router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), registry, coordinator)
}

#[tokio::test]
async fn active_reports_worker_host_and_state() {
    let (base, _registry, _coordinator) = serve_api(None).await;

    let body: Value = reqwest::get(format!("{}/active", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["worker"], "worker0");
    assert_eq!(body["host"], "host0");
    assert_eq!(body["active"], true);
}

#[tokio::test]
async fn invalid_active_query_is_rejected() {
    let (base, _registry, _coordinator) = serve_api(None).await;

    let resp = reqwest::get(format!("{}/active?active=maybe", base))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Invalid query string");
}

#[tokio::test]
async fn swap_away_from_active_host_reports_swapping() {
    let (base, _registry, coordinator) = serve_api(None).await;

    let body: Value = reqwest::get(format!("{}/active?active=false", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["active"], "swapping");

    // The published swap loops back and flips the local belief.
    for _ in 0..20 {
        if !coordinator.is_active().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(!coordinator.is_active().await);
    assert_eq!(coordinator.active_host().await, "host1");
}

#[tokio::test]
async fn swap_to_current_state_is_a_no_op() {
    let (base, _registry, _coordinator) = serve_api(None).await;

    let body: Value = reqwest::get(format!("{}/active?active=true", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["active"], true);
    assert!(body.get("message").is_none());
}

#[tokio::test]
async fn health_reports_trigger_count() {
    let (base, registry, _coordinator) = serve_api(None).await;
    registry.create(common::trigger("/ns/t1", "worker0"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["triggerCount"], 1);
    assert!(body["memory"]["total"].is_u64());
    assert!(body["uptimeSeconds"].is_u64());
}

#[tokio::test]
async fn endpoint_auth_challenges_anonymous_requests() {
    let (base, _registry, _coordinator) =
        serve_api(Some("admin:secret")).await;

    let resp = reqwest::get(format!("{}/active", base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
    assert!(resp.headers().contains_key("www-authenticate"));
}

#[tokio::test]
async fn endpoint_auth_rejects_wrong_credentials() {
    let (base, _registry, _coordinator) =
        serve_api(Some("admin:secret")).await;

    let credentials =
        base64::engine::general_purpose::STANDARD.encode("admin:wrong");
    let resp = reqwest::Client::new()
        .get(format!("{}/active", base))
        .header("authorization", format!("Basic {}", credentials))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn endpoint_auth_accepts_the_configured_pair() {
    let (base, _registry, _coordinator) =
        serve_api(Some("admin:secret")).await;

    let resp = reqwest::Client::new()
        .get(format!("{}/active", base))
        .basic_auth("admin", Some("secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}
