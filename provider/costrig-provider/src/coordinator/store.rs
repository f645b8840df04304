use crate::errors::CoordinatorError;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::pin::Pin;
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;

pub type HostStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Shared key-value store plus publish/subscribe channel carrying the
/// current active host per worker group.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn get_active(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<String>, CoordinatorError>;
    async fn set_active(
        &self,
        key: &str,
        field: &str,
        host: &str,
    ) -> Result<(), CoordinatorError>;
    async fn publish(
        &self,
        channel: &str,
        host: &str,
    ) -> Result<(), CoordinatorError>;
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<HostStream, CoordinatorError>;
}

/// Redis-backed coordination: one hash per worker plus a pub/sub channel of
/// the same name. The connection manager reconnects on its own.
pub struct RedisCoordination {
    client: redis::Client,
    manager: redis::aio::ConnectionManager,
}

impl RedisCoordination {
    pub async fn connect(url: &str) -> Result<Self, CoordinatorError> {
        let client = redis::Client::open(url)?;
        let manager =
            redis::aio::ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, manager })
    }
}

#[async_trait]
impl CoordinationStore for RedisCoordination {
    async fn get_active(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<String>, CoordinatorError> {
        let mut conn = self.manager.clone();
        Ok(conn.hget(key, field).await?)
    }

    async fn set_active(
        &self,
        key: &str,
        field: &str,
        host: &str,
    ) -> Result<(), CoordinatorError> {
        let mut conn = self.manager.clone();
        let _: () = conn.hset(key, field, host).await?;
        Ok(())
    }

    async fn publish(
        &self,
        channel: &str,
        host: &str,
    ) -> Result<(), CoordinatorError> {
        let mut conn = self.manager.clone();
        let _: () = conn.publish(channel, host).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<HostStream, CoordinatorError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move { msg.get_payload::<String>().ok() });
        Ok(Box::pin(stream))
    }
}

const SWAP_BUFFER: usize = 16;

/// Process-local coordination for single-host deployments and tests;
/// behaves like the redis backend, including publish loop-back to the
/// publisher's own subscription.
pub struct MemoryCoordination {
    entries: RwLock<HashMap<String, String>>,
    swaps: broadcast::Sender<(String, String)>,
}

impl MemoryCoordination {
    pub fn new() -> Self {
        let (swaps, _) = broadcast::channel(SWAP_BUFFER);
        Self {
            entries: RwLock::new(HashMap::new()),
            swaps,
        }
    }

    fn entry_key(key: &str, field: &str) -> String {
        format!("{}:{}", key, field)
    }
}

impl Default for MemoryCoordination {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for MemoryCoordination {
    async fn get_active(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<String>, CoordinatorError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&Self::entry_key(key, field)).cloned())
    }

    async fn set_active(
        &self,
        key: &str,
        field: &str,
        host: &str,
    ) -> Result<(), CoordinatorError> {
        let mut entries = self.entries.write().await;
        entries.insert(Self::entry_key(key, field), host.to_string());
        Ok(())
    }

    async fn publish(
        &self,
        channel: &str,
        host: &str,
    ) -> Result<(), CoordinatorError> {
        let _ = self
            .swaps
            .send((channel.to_string(), host.to_string()));
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<HostStream, CoordinatorError> {
        let channel = channel.to_string();
        let stream = BroadcastStream::new(self.swaps.subscribe()).filter_map(
            move |item| {
                let channel = channel.clone();
                async move {
                    match item {
                        Ok((name, host)) if name == channel => Some(host),
                        _ => None,
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }
}
