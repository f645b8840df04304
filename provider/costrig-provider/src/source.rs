use crate::errors::SourceError;
use async_trait::async_trait;
use costrig_models::TriggerDoc;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capability consumed from the external bucket-polling component: register
/// and unregister the buckets it should watch.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn add(&self, id: &str, doc: &TriggerDoc) -> Result<(), SourceError>;
    async fn remove(&self, id: &str) -> Result<(), SourceError>;
}

/// Callbacks handed to the polling component; invoked when it detects a
/// bucket change or gives up on a subscription.
#[async_trait]
pub trait SourceCallbacks: Send + Sync {
    async fn fire_trigger(&self, id: &str, event: Value);
    async fn disable_trigger(&self, id: &str, reason: String);
}

enum SourceCommand {
    Event { id: String, payload: Value },
    Failure { id: String, reason: String },
}

const COMMAND_BUFFER: usize = 64;

/// Channel-backed event source for development and tests: registrations are
/// tracked in memory and bucket events are injected through an
/// [`EventInjector`] handle instead of being detected by polling.
pub struct ChannelEventSource {
    registered: Arc<DashMap<String, TriggerDoc>>,
    tx: mpsc::Sender<SourceCommand>,
    rx: Arc<Mutex<Option<mpsc::Receiver<SourceCommand>>>>,
}

impl ChannelEventSource {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        Arc::new(Self {
            registered: Arc::new(DashMap::new()),
            tx,
            rx: Arc::new(Mutex::new(Some(rx))),
        })
    }

    pub fn injector(&self) -> EventInjector {
        EventInjector {
            tx: self.tx.clone(),
        }
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.registered.contains_key(id)
    }

    /// Drive injected events into the callbacks until cancelled.
    pub fn start(
        &self,
        callbacks: Arc<dyn SourceCallbacks>,
        token: CancellationToken,
    ) {
        let registered = self.registered.clone();
        let rx_slot = self.rx.clone();
        tokio::spawn(async move {
            let mut rx = match rx_slot.lock().await.take() {
                Some(rx) => rx,
                None => {
                    warn!("event source already started");
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    command = rx.recv() => match command {
                        Some(SourceCommand::Event { id, payload }) => {
                            if registered.contains_key(&id) {
                                callbacks.fire_trigger(&id, payload).await;
                            } else {
                                debug!(
                                    "dropping event for unregistered trigger {}",
                                    id
                                );
                            }
                        }
                        Some(SourceCommand::Failure { id, reason }) => {
                            callbacks.disable_trigger(&id, reason).await;
                        }
                        None => break,
                    }
                }
            }
        });
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn add(&self, id: &str, doc: &TriggerDoc) -> Result<(), SourceError> {
        self.registered.insert(id.to_string(), doc.clone());
        info!("watching bucket {} for trigger {}", doc.bucket, id);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), SourceError> {
        self.registered.remove(id);
        Ok(())
    }
}

/// Handle for pushing bucket events into a [`ChannelEventSource`].
#[derive(Clone)]
pub struct EventInjector {
    tx: mpsc::Sender<SourceCommand>,
}

impl EventInjector {
    /// Returns false when the source has shut down.
    pub async fn inject(&self, id: &str, payload: Value) -> bool {
        self.tx
            .send(SourceCommand::Event {
                id: id.to_string(),
                payload,
            })
            .await
            .is_ok()
    }

    /// Report a subscription the source can no longer service.
    pub async fn report_failure(&self, id: &str, reason: &str) -> bool {
        self.tx
            .send(SourceCommand::Failure {
                id: id.to_string(),
                reason: reason.to_string(),
            })
            .await
            .is_ok()
    }
}
