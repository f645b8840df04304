use costrig_models::{StatusReason, TriggerDoc};
use costrig_storage::{MemoryTriggerStore, TriggerStore};
use futures_util::StreamExt;
use std::time::Duration;

fn trigger(id: &str, worker: &str) -> TriggerDoc {
    TriggerDoc {
        id: id.to_string(),
        rev: None,
        apikey: Some("uuid:key".to_string()),
        bucket: "bucket".to_string(),
        endpoint: None,
        bucket_apikey: None,
        interval: 1,
        worker: worker.to_string(),
        status: None,
        additional_data: None,
    }
}

#[tokio::test]
async fn memory_store_crud() {
    let store = MemoryTriggerStore::new();
    let doc = trigger("/ns/t1", "worker0");

    store.put_trigger(&doc).await.unwrap();
    let loaded = store.get_trigger("/ns/t1").await.unwrap();
    assert_eq!(loaded, Some(doc));

    store.delete_trigger("/ns/t1").await.unwrap();
    let loaded = store.get_trigger("/ns/t1").await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn list_filters_by_worker() {
    let store = MemoryTriggerStore::new();
    store.put_trigger(&trigger("/ns/a", "worker0")).await.unwrap();
    store.put_trigger(&trigger("/ns/b", "worker1")).await.unwrap();
    store.put_trigger(&trigger("/ns/c", "worker0")).await.unwrap();

    let docs = store.list_by_worker("worker0").await.unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["/ns/a", "/ns/c"]);
}

#[tokio::test]
async fn watch_delivers_updates_for_own_worker_only() {
    let store = MemoryTriggerStore::new();
    let mut feed = store.watch_worker("worker0").await.unwrap();

    store.put_trigger(&trigger("/ns/other", "worker1")).await.unwrap();
    let mut mine = trigger("/ns/mine", "worker0");
    mine.set_status(false, Some(StatusReason::auto(Some(404), "gone")));
    store.put_trigger(&mine).await.unwrap();

    let change = tokio::time::timeout(Duration::from_secs(1), feed.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(change.id, "/ns/mine");
    assert!(!change.doc.is_active());
}

#[tokio::test]
async fn watch_starts_from_now() {
    let store = MemoryTriggerStore::new();
    store.put_trigger(&trigger("/ns/old", "worker0")).await.unwrap();

    let mut feed = store.watch_worker("worker0").await.unwrap();
    store.put_trigger(&trigger("/ns/new", "worker0")).await.unwrap();

    let change = tokio::time::timeout(Duration::from_secs(1), feed.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(change.id, "/ns/new");
}
