use anyhow::Result;
use std::sync::Arc;

use crate::{
    adapter::ProviderAdapter,
    config::AppConfig,
    coordinator::{
        CoordinationStore, FailoverCoordinator, MemoryCoordination,
        RedisCoordination,
    },
    fire::FireEngine,
    registry::TriggerRegistry,
    server::ApiServer,
    source::EventSource,
    storage::create_trigger_store,
    watcher::ChangeFeedWatcher,
};
use costrig_storage::TriggerStore;

/// Everything a running provider process is made of, fully wired.
pub struct Provider {
    pub config: AppConfig,
    pub store: Arc<dyn TriggerStore>,
    pub registry: Arc<TriggerRegistry>,
    pub coordinator: Arc<FailoverCoordinator>,
    pub adapter: Arc<ProviderAdapter>,
    pub watcher: Arc<ChangeFeedWatcher>,
    pub server: ApiServer,
}

pub async fn build_provider(
    config: AppConfig,
    source: Arc<dyn EventSource>,
) -> Result<Provider> {
    // Storage
    let store = create_trigger_store(&config.storage()).await?;

    // Coordination; without a redis url this process runs single-host
    let coordinator_config = config.coordinator();
    let coordination: Arc<dyn CoordinationStore> =
        match &coordinator_config.redis_url {
            Some(url) => Arc::new(RedisCoordination::connect(url).await?),
            None => Arc::new(MemoryCoordination::new()),
        };
    let coordinator = Arc::new(FailoverCoordinator::new(
        &coordinator_config,
        coordination,
    ));

    // Registry, fire engine and the callbacks handed to the event source
    let registry = Arc::new(TriggerRegistry::new(store.clone(), source));
    let http = reqwest::Client::new();
    let engine = Arc::new(FireEngine::new(
        http.clone(),
        &config.router_host,
        registry.clone(),
    ));
    let adapter = Arc::new(ProviderAdapter::new(
        registry.clone(),
        engine,
        coordinator.clone(),
    ));

    // Change feed watcher and diagnostic API
    let watcher = Arc::new(ChangeFeedWatcher::new(
        registry.clone(),
        store.clone(),
        http,
        &config.router_host,
        &config.worker,
    ));
    let server = ApiServer::new(
        registry.clone(),
        coordinator.clone(),
        config.server(),
        config.endpoint_auth.clone(),
    );

    Ok(Provider {
        config,
        store,
        registry,
        coordinator,
        adapter,
        watcher,
        server,
    })
}

/// Build a fully-wired provider from environment variables. Mirrors the
/// logic in main and is useful for tests and embedding.
pub async fn build_provider_from_env(
    source: Arc<dyn EventSource>,
) -> Result<Provider> {
    let config = AppConfig::load_from_env()?;
    build_provider(config, source).await
}
