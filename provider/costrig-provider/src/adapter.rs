use crate::coordinator::FailoverCoordinator;
use crate::fire::FireEngine;
use crate::registry::TriggerRegistry;
use crate::source::SourceCallbacks;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

/// The callback surface handed to the external bucket-polling component.
/// Fires are gated on registry membership and on this host being active.
pub struct ProviderAdapter {
    registry: Arc<TriggerRegistry>,
    engine: Arc<FireEngine>,
    coordinator: Arc<FailoverCoordinator>,
}

impl ProviderAdapter {
    pub fn new(
        registry: Arc<TriggerRegistry>,
        engine: Arc<FireEngine>,
        coordinator: Arc<FailoverCoordinator>,
    ) -> Self {
        Self {
            registry,
            engine,
            coordinator,
        }
    }
}

#[async_trait]
impl SourceCallbacks for ProviderAdapter {
    async fn fire_trigger(&self, id: &str, event: Value) {
        let Some(trigger) = self.registry.get(id) else {
            debug!("ignoring event for unknown trigger {}", id);
            return;
        };
        // The active-host gate runs once per detected event; a retry
        // sequence already in flight is never cancelled by a standby
        // transition.
        if !self.coordinator.is_active().await {
            debug!("not the active host, skipping fire for {}", id);
            return;
        }

        info!("firing trigger {} with bucket update", id);
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            match engine.fire(&trigger, &event).await {
                Ok(id) => info!("trigger {} was successfully fired", id),
                Err(err) => error!("{}", err),
            }
        });
    }

    async fn disable_trigger(&self, id: &str, reason: String) {
        self.registry.disable(id, None, &reason).await;
    }
}
