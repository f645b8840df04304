use crate::error::StorageError;
use async_trait::async_trait;
use costrig_models::TriggerDoc;
use futures_util::Stream;
use std::pin::Pin;

pub type StorageResult<T> = Result<T, StorageError>;

/// One mutation observed on the change feed. `include_docs` semantics: the
/// updated document always rides along with the change.
#[derive(Debug, Clone)]
pub struct TriggerChange {
    pub id: String,
    pub doc: TriggerDoc,
}

pub type TriggerChangeStream =
    Pin<Box<dyn Stream<Item = StorageResult<TriggerChange>> + Send>>;

#[async_trait]
pub trait StorageHealth: Send + Sync {
    /// Lightweight connectivity check to the backing store.
    /// Should return Ok(()) if the backend is reachable and responding.
    async fn health(&self) -> StorageResult<()>;
}

#[async_trait]
pub trait TriggerStore: Send + Sync + StorageHealth {
    async fn get_trigger(
        &self,
        id: &str,
    ) -> StorageResult<Option<TriggerDoc>>;
    async fn put_trigger(&self, doc: &TriggerDoc) -> StorageResult<()>;
    async fn delete_trigger(&self, id: &str) -> StorageResult<()>;
    /// All triggers assigned to the given worker, via the worker view.
    async fn list_by_worker(
        &self,
        worker: &str,
    ) -> StorageResult<Vec<TriggerDoc>>;
    /// Continuous change feed filtered to the given worker, starting from
    /// "now". Historical state is covered by `list_by_worker`, not the feed.
    async fn watch_worker(
        &self,
        worker: &str,
    ) -> StorageResult<TriggerChangeStream>;
}
