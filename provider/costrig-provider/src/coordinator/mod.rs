mod store;

pub use store::{
    CoordinationStore, HostStream, MemoryCoordination, RedisCoordination,
};

use crate::config::CoordinatorConfig;
use crate::errors::CoordinatorError;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub const ACTIVE_FIELD: &str = "active";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    Swapping,
    Unchanged,
}

/// Decides which of the two candidate hosts sharing a worker identity may
/// fire. The shared store holds the authoritative value; each process
/// mirrors it locally and applies every broadcast swap as-is. There is no
/// consensus here: a partitioned host keeps its last belief, and duplicate
/// fires under split-brain are accepted downstream.
pub struct FailoverCoordinator {
    worker: String,
    host: String,
    redundant_host: String,
    key: String,
    active: Arc<RwLock<String>>,
    store: Arc<dyn CoordinationStore>,
}

impl FailoverCoordinator {
    pub fn new(
        config: &CoordinatorConfig,
        store: Arc<dyn CoordinationStore>,
    ) -> Self {
        let prefix: String = config
            .host
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .to_string();
        let redundant_host = if config.host == format!("{}0", prefix) {
            format!("{}1", prefix)
        } else {
            format!("{}0", prefix)
        };
        Self {
            worker: config.worker.clone(),
            host: config.host.clone(),
            redundant_host,
            key: format!("{}_{}", config.key_prefix, config.worker),
            // Default belief until the store says otherwise.
            active: Arc::new(RwLock::new(format!("{}0", prefix))),
            store,
        }
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn redundant_host(&self) -> &str {
        &self.redundant_host
    }

    /// Subscribe for swap broadcasts, then adopt or claim the stored active
    /// host. First writer wins on a cold start; two hosts racing an empty
    /// key is an accepted init-time hazard.
    pub async fn init(&self) -> Result<(), CoordinatorError> {
        let mut swaps = self.store.subscribe(&self.key).await?;
        let active = self.active.clone();
        let key = self.key.clone();
        tokio::spawn(async move {
            while let Some(host) = swaps.next().await {
                info!("{} set to active host in channel {}", host, key);
                *active.write().await = host;
            }
            warn!("active host subscription ended");
        });

        match self.store.get_active(&self.key, ACTIVE_FIELD).await? {
            Some(host) => {
                *self.active.write().await = host;
            }
            None => {
                info!("claiming active host {} for {}", self.host, self.key);
                *self.active.write().await = self.host.clone();
                self.store
                    .set_active(&self.key, ACTIVE_FIELD, &self.host)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn active_host(&self) -> String {
        self.active.read().await.clone()
    }

    pub async fn is_active(&self) -> bool {
        *self.active.read().await == self.host
    }

    /// Operator-requested swap. Publishing lets every candidate converge;
    /// the local belief updates when the broadcast comes back around.
    pub async fn request_active(
        &self,
        target: &str,
    ) -> Result<SwapOutcome, CoordinatorError> {
        if *self.active.read().await == target {
            return Ok(SwapOutcome::Unchanged);
        }
        self.store
            .set_active(&self.key, ACTIVE_FIELD, target)
            .await?;
        self.store.publish(&self.key, target).await?;
        info!("active host swap to {} in progress", target);
        Ok(SwapOutcome::Swapping)
    }

    /// Hand the active role to the other candidate before exiting, keeping
    /// the active-gap window as small as possible.
    pub async fn handoff(&self) {
        if !self.is_active().await {
            return;
        }
        info!("handing off active host to {}", self.redundant_host);
        if let Err(err) = self
            .store
            .set_active(&self.key, ACTIVE_FIELD, &self.redundant_host)
            .await
        {
            error!("failed to store handoff: {}", err);
            return;
        }
        if let Err(err) =
            self.store.publish(&self.key, &self.redundant_host).await
        {
            error!("failed to announce handoff: {}", err);
        }
    }
}
