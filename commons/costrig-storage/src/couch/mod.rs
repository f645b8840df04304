use crate::traits::*;
use crate::error::StorageError;
use async_trait::async_trait;
use costrig_models::TriggerDoc;
use futures_util::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};

pub const VIEWS_DESIGN_DOC: &str = "triggerViews";
pub const FILTERS_DESIGN_DOC: &str = "triggerFilters";
pub const TRIGGERS_BY_WORKER: &str = "triggers_by_worker";

const FEED_HEARTBEAT_MS: u64 = 30000;
const CHANGE_BUFFER: usize = 64;

/// CouchDB-style document store backend. Trigger documents live in a single
/// database; the worker view and the worker change-feed filter are server-side
/// design documents provisioned with the database.
pub struct CouchTriggerStore {
    http: reqwest::Client,
    db_url: String,
    timeout: Duration,
}

impl CouchTriggerStore {
    pub fn new(
        url: &str,
        db_name: &str,
        timeout_seconds: u64,
    ) -> Result<Self, StorageError> {
        // The change feed is a long-lived request, so the client carries no
        // global timeout; regular operations set one per request.
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self {
            http,
            db_url: format!("{}/{}", url.trim_end_matches('/'), db_name),
            timeout: Duration::from_secs(timeout_seconds),
        })
    }

    fn doc_url(&self, id: &str) -> String {
        // Trigger ids contain slashes; they must stay one path segment.
        format!("{}/{}", self.db_url, id.replace('%', "%25").replace('/', "%2F"))
    }
}

#[derive(Debug, Deserialize)]
struct ViewResponse {
    rows: Vec<ViewRow>,
}

#[derive(Debug, Deserialize)]
struct ViewRow {
    #[allow(unused)]
    id: String,
    doc: Option<TriggerDoc>,
}

#[derive(Debug, Deserialize)]
struct ChangeRow {
    id: String,
    #[serde(default)]
    deleted: bool,
    doc: Option<TriggerDoc>,
}

#[async_trait]
impl StorageHealth for CouchTriggerStore {
    async fn health(&self) -> StorageResult<()> {
        let resp = self
            .http
            .get(&self.db_url)
            .timeout(self.timeout)
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::Connection(format!(
                "database responded with status {}",
                resp.status()
            )))
        }
    }
}

#[async_trait]
impl TriggerStore for CouchTriggerStore {
    async fn get_trigger(
        &self,
        id: &str,
    ) -> StorageResult<Option<TriggerDoc>> {
        let resp = self
            .http
            .get(self.doc_url(id))
            .timeout(self.timeout)
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(Some(resp.json().await?)),
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            s => Err(StorageError::Backend(format!(
                "get {} returned status {}",
                id, s
            ))),
        }
    }

    async fn put_trigger(&self, doc: &TriggerDoc) -> StorageResult<()> {
        let resp = self
            .http
            .put(self.doc_url(&doc.id))
            .timeout(self.timeout)
            .json(doc)
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            reqwest::StatusCode::CONFLICT => {
                Err(StorageError::AlreadyExists(doc.id.clone()))
            }
            s => Err(StorageError::Backend(format!(
                "put {} returned status {}",
                doc.id, s
            ))),
        }
    }

    async fn delete_trigger(&self, id: &str) -> StorageResult<()> {
        let Some(existing) = self.get_trigger(id).await? else {
            return Ok(());
        };
        let Some(rev) = existing.rev else {
            return Err(StorageError::Backend(format!(
                "document {} has no revision",
                id
            )));
        };
        let resp = self
            .http
            .delete(self.doc_url(id))
            .timeout(self.timeout)
            .query(&[("rev", rev)])
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => Ok(()),
            s => Err(StorageError::Backend(format!(
                "delete {} returned status {}",
                id, s
            ))),
        }
    }

    async fn list_by_worker(
        &self,
        worker: &str,
    ) -> StorageResult<Vec<TriggerDoc>> {
        let url = format!(
            "{}/_design/{}/_view/{}",
            self.db_url, VIEWS_DESIGN_DOC, TRIGGERS_BY_WORKER
        );
        let key = serde_json::to_string(worker)?;
        let resp = self
            .http
            .get(url)
            .timeout(self.timeout)
            .query(&[
                ("key", key.as_str()),
                ("include_docs", "true"),
                ("reduce", "false"),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(StorageError::Backend(format!(
                "worker view returned status {}",
                resp.status()
            )));
        }
        let view: ViewResponse = resp.json().await?;
        Ok(view.rows.into_iter().filter_map(|row| row.doc).collect())
    }

    async fn watch_worker(
        &self,
        worker: &str,
    ) -> StorageResult<TriggerChangeStream> {
        let url = format!("{}/_changes", self.db_url);
        let filter = format!("{}/{}", FILTERS_DESIGN_DOC, TRIGGERS_BY_WORKER);
        let heartbeat = FEED_HEARTBEAT_MS.to_string();
        let resp = self
            .http
            .get(url)
            .query(&[
                ("feed", "continuous"),
                ("since", "now"),
                ("include_docs", "true"),
                ("heartbeat", heartbeat.as_str()),
                ("filter", filter.as_str()),
                ("worker", worker),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(StorageError::Backend(format!(
                "change feed returned status {}",
                resp.status()
            )));
        }

        let (tx, rx) = mpsc::channel(CHANGE_BUFFER);
        tokio::spawn(async move {
            let mut body = resp.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = tx.send(Err(StorageError::Http(err))).await;
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n')
                {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    let line = line.trim();
                    if line.is_empty() {
                        // Heartbeat newline keeps the connection alive.
                        continue;
                    }
                    match serde_json::from_str::<ChangeRow>(line) {
                        Ok(row) => {
                            if row.deleted {
                                continue;
                            }
                            let Some(doc) = row.doc else { continue };
                            let change = TriggerChange { id: row.id, doc };
                            if tx.send(Ok(change)).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            warn!(
                                "could not decode change feed line: {}",
                                err
                            );
                            if tx
                                .send(Err(StorageError::Serialization(err)))
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                    }
                }
            }
            error!("change feed connection closed");
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
