use crate::config::{StorageConfig, StorageType};
use anyhow::{Context, Result};
use costrig_storage::{CouchTriggerStore, MemoryTriggerStore, TriggerStore};
use std::sync::Arc;

pub async fn create_trigger_store(
    config: &StorageConfig,
) -> Result<Arc<dyn TriggerStore>> {
    match config.storage_type {
        StorageType::Memory => Ok(Arc::new(MemoryTriggerStore::new())),
        StorageType::Couch => {
            let couch = config
                .couch
                .as_ref()
                .context("couch storage selected but not configured")?;
            let store = CouchTriggerStore::new(
                &couch.url,
                &couch.db_name,
                couch.timeout_seconds,
            )?;
            Ok(Arc::new(store))
        }
    }
}
