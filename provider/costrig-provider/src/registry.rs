use crate::source::EventSource;
use costrig_models::{StatusReason, TriggerDoc};
use costrig_storage::TriggerStore;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{error, info};

/// In-memory working set of this worker's active triggers. Membership is the
/// sole signal the event-source adapter uses to decide whether a fire may be
/// attempted, so disabled and deleted triggers are removed, never flagged.
#[derive(Clone)]
pub struct TriggerRegistry {
    triggers: Arc<DashMap<String, TriggerDoc>>,
    store: Arc<dyn TriggerStore>,
    source: Arc<dyn EventSource>,
}

impl TriggerRegistry {
    pub fn new(
        store: Arc<dyn TriggerStore>,
        source: Arc<dyn EventSource>,
    ) -> Self {
        Self {
            triggers: Arc::new(DashMap::new()),
            store,
            source,
        }
    }

    pub fn get(&self, id: &str) -> Option<TriggerDoc> {
        self.triggers.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.triggers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Insert the trigger and register it with the event source. A
    /// registration failure disables the trigger instead of dropping it; the
    /// record survives in the store as disabled.
    pub fn create(&self, doc: TriggerDoc) {
        let id = doc.id.clone();
        self.triggers.insert(id.clone(), doc.clone());

        let registry = self.clone();
        tokio::spawn(async move {
            match registry.source.add(&id, &doc).await {
                Ok(()) => {
                    info!("added trigger {} to event source", id);
                }
                Err(err) => {
                    let message = format!(
                        "Automatically disabled after receiving exception on init trigger: {}",
                        err
                    );
                    registry.disable(&id, None, &message).await;
                    error!(
                        "disabled trigger {} due to exception: {}",
                        id, err
                    );
                }
            }
        });
    }

    /// Remove from memory and unregister from the event source. Removal is
    /// authoritative; unregistration errors are logged, not rolled back.
    pub fn delete(&self, id: &str) {
        if self.triggers.remove(id).is_none() {
            return;
        }

        let registry = self.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            match registry.source.remove(&id).await {
                Ok(()) => info!("trigger {} successfully deleted", id),
                Err(err) => error!("{}", err),
            }
        });
    }

    /// Write an automatic disable transition for a still-active record. A
    /// record that disappeared concurrently only triggers the in-memory
    /// delete; concurrent disables settle last-writer-wins.
    pub async fn disable(
        &self,
        id: &str,
        status_code: Option<u16>,
        message: &str,
    ) {
        match self.store.get_trigger(id).await {
            Ok(Some(mut doc)) => {
                if doc.is_active() {
                    doc.set_status(
                        false,
                        Some(StatusReason::auto(status_code, message)),
                    );
                    match self.store.put_trigger(&doc).await {
                        Ok(()) => info!(
                            "trigger {} successfully disabled in database",
                            id
                        ),
                        Err(err) => error!(
                            "there was an error while disabling {} in database: {}",
                            id, err
                        ),
                    }
                }
            }
            Ok(None) => {
                info!("could not find {} in database", id);
                // make sure it is removed from memory as well
                self.delete(id);
            }
            Err(err) => {
                error!("could not load {} for disabling: {}", id, err);
            }
        }
    }
}
