use crate::auth;
use crate::fire::{router_base, should_disable, trigger_url};
use crate::registry::TriggerRegistry;
use costrig_models::TriggerDoc;
use costrig_storage::{TriggerChange, TriggerStore};
use futures_util::StreamExt;
use reqwest::StatusCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Keeps the in-memory registry synchronized with the persisted store: a
/// full reconciliation pass at startup, then the worker-filtered change
/// feed for everything after.
pub struct ChangeFeedWatcher {
    registry: Arc<TriggerRegistry>,
    store: Arc<dyn TriggerStore>,
    http: reqwest::Client,
    router_base: String,
    worker: String,
}

impl ChangeFeedWatcher {
    pub fn new(
        registry: Arc<TriggerRegistry>,
        store: Arc<dyn TriggerStore>,
        http: reqwest::Client,
        router_host: &str,
        worker: &str,
    ) -> Self {
        Self {
            registry,
            store,
            http,
            router_base: router_base(router_host),
            worker: worker.to_string(),
        }
    }

    /// Reset the working set from the store's last persisted state. Triggers
    /// whose platform counterpart is gone are disabled instead of
    /// registered.
    pub async fn reconcile(&self) {
        info!("resetting system from last state");
        let docs = match self.store.list_by_worker(&self.worker).await {
            Ok(docs) => docs,
            Err(err) => {
                error!(
                    "could not get latest state from database: {}",
                    err
                );
                return;
            }
        };
        for doc in docs {
            if self.registry.contains(&doc.id) || !doc.is_active() {
                continue;
            }
            match self.verify_upstream(&doc).await {
                Some(status) if should_disable(status) => {
                    let message = format!(
                        "Automatically disabled after receiving a {} status code on init trigger",
                        status.as_u16()
                    );
                    error!(
                        "trigger {} has been disabled due to status code: {}",
                        doc.id,
                        status.as_u16()
                    );
                    self.registry
                        .disable(&doc.id, Some(status.as_u16()), &message)
                        .await;
                }
                _ => self.registry.create(doc),
            }
        }
    }

    /// Check whether the platform trigger still exists upstream. Transport
    /// failures lean towards registering; only a definite disable-eligible
    /// status prevents it.
    async fn verify_upstream(&self, doc: &TriggerDoc) -> Option<StatusCode> {
        info!("checking if trigger {} still exists", doc.id);
        let url = trigger_url(&self.router_base, &doc.id);
        let request = self.http.get(url);
        let request =
            match auth::authenticated(&self.http, doc, request).await {
                Ok(request) => request,
                Err(err) => {
                    error!(
                        "existence check for {} could not authenticate: {}",
                        doc.id, err
                    );
                    return None;
                }
            };
        match request.send().await {
            Ok(resp) => Some(resp.status()),
            Err(err) => {
                error!("existence check for {} failed: {}", doc.id, err);
                None
            }
        }
    }

    /// Consume the change feed until cancelled. Stream errors are logged
    /// and skipped; reconnection belongs to the storage backend.
    pub async fn run(&self, token: CancellationToken) {
        let mut feed = match self.store.watch_worker(&self.worker).await {
            Ok(feed) => feed,
            Err(err) => {
                error!("could not open change feed: {}", err);
                return;
            }
        };
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                next = feed.next() => match next {
                    Some(Ok(change)) => self.apply_change(change),
                    Some(Err(err)) => error!("change feed error: {}", err),
                    None => {
                        warn!("change feed ended");
                        break;
                    }
                }
            }
        }
    }

    /// A registered trigger that went inactive is deleted; an unregistered
    /// one that is active (or has no status yet) is created. Identical
    /// repeated changes are no-ops.
    pub fn apply_change(&self, change: TriggerChange) {
        if self.registry.contains(&change.id) {
            if !change.doc.is_active() {
                self.registry.delete(&change.id);
            }
        } else if change.doc.is_active() {
            self.registry.create(change.doc);
        }
    }
}
