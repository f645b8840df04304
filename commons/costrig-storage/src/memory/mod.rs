use crate::error::StorageError;
use crate::traits::*;
use async_trait::async_trait;
use costrig_models::TriggerDoc;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

const CHANGE_BUFFER: usize = 256;

/// In-memory trigger store with a broadcast-backed change feed. Used for
/// tests and single-process deployments.
#[derive(Clone)]
pub struct MemoryTriggerStore {
    store: Arc<RwLock<HashMap<String, TriggerDoc>>>,
    changes: broadcast::Sender<TriggerChange>,
}

impl MemoryTriggerStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            changes,
        }
    }
}

impl Default for MemoryTriggerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageHealth for MemoryTriggerStore {
    async fn health(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TriggerStore for MemoryTriggerStore {
    async fn get_trigger(
        &self,
        id: &str,
    ) -> StorageResult<Option<TriggerDoc>> {
        let store = self.store.read().await;
        Ok(store.get(id).cloned())
    }

    async fn put_trigger(&self, doc: &TriggerDoc) -> StorageResult<()> {
        let mut store = self.store.write().await;
        store.insert(doc.id.clone(), doc.clone());
        drop(store);

        // Nobody watching is fine; the feed only serves live subscribers.
        let _ = self.changes.send(TriggerChange {
            id: doc.id.clone(),
            doc: doc.clone(),
        });
        Ok(())
    }

    async fn delete_trigger(&self, id: &str) -> StorageResult<()> {
        let mut store = self.store.write().await;
        store.remove(id);
        Ok(())
    }

    async fn list_by_worker(
        &self,
        worker: &str,
    ) -> StorageResult<Vec<TriggerDoc>> {
        let store = self.store.read().await;
        let mut docs: Vec<TriggerDoc> = store
            .values()
            .filter(|doc| doc.worker == worker)
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }

    async fn watch_worker(
        &self,
        worker: &str,
    ) -> StorageResult<TriggerChangeStream> {
        let worker = worker.to_string();
        let stream = BroadcastStream::new(self.changes.subscribe())
            .filter_map(move |item| {
                let worker = worker.clone();
                async move {
                    match item {
                        Ok(change) if change.doc.worker == worker => {
                            Some(Ok(change))
                        }
                        Ok(_) => None,
                        Err(BroadcastStreamRecvError::Lagged(missed)) => {
                            Some(Err(StorageError::Backend(format!(
                                "change feed lagged, {} changes dropped",
                                missed
                            ))))
                        }
                    }
                }
            });
        Ok(Box::pin(stream))
    }
}
