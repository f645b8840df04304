use crate::auth;
use crate::errors::FireError;
use crate::registry::TriggerRegistry;
use costrig_models::{QName, TriggerDoc};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub const RETRY_ATTEMPTS: u32 = 10;

/// A fire failure is permanent for any client error except the soft
/// statuses that signal congestion rather than misconfiguration.
pub fn should_disable(status: StatusCode) -> bool {
    status.is_client_error()
        && !matches!(
            status,
            StatusCode::REQUEST_TIMEOUT
                | StatusCode::TOO_MANY_REQUESTS
                | StatusCode::CONFLICT
        )
}

/// Quadratic backoff, except the first retry after a 429 waits a full
/// minute to let the rate limit clear.
pub fn retry_delay(status: Option<StatusCode>, retry_count: u32) -> Duration {
    if status == Some(StatusCode::TOO_MANY_REQUESTS) && retry_count == 0 {
        Duration::from_millis(60000)
    } else {
        Duration::from_millis(1000 * u64::from(retry_count + 1).pow(2))
    }
}

pub fn router_base(router_host: &str) -> String {
    if router_host.starts_with("http://")
        || router_host.starts_with("https://")
    {
        router_host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", router_host)
    }
}

pub fn trigger_url(router_base: &str, id: &str) -> String {
    let qname = QName::parse(id);
    format!(
        "{}/api/v1/namespaces/{}/triggers/{}",
        router_base, qname.namespace, qname.name
    )
}

enum Attempt {
    Status(StatusCode, Option<String>),
    Unreachable(String),
}

/// Executes the outbound notification for a bucket event with
/// status-code-driven retry and disable policy.
pub struct FireEngine {
    http: reqwest::Client,
    router_base: String,
    registry: Arc<TriggerRegistry>,
}

impl FireEngine {
    pub fn new(
        http: reqwest::Client,
        router_host: &str,
        registry: Arc<TriggerRegistry>,
    ) -> Self {
        Self {
            http,
            router_base: router_base(router_host),
            registry,
        }
    }

    /// POST the bucket-change event to the platform trigger endpoint. The
    /// same event payload rides along on every retry, and the sequence runs
    /// to completion even if the trigger is deleted in the interim.
    pub async fn fire(
        &self,
        trigger: &TriggerDoc,
        event: &Value,
    ) -> Result<String, FireError> {
        let url = trigger_url(&self.router_base, &trigger.id);
        let mut retry_count = 0u32;
        loop {
            let status = match self.post_once(trigger, event, &url).await {
                Attempt::Status(status, message) => {
                    info!(
                        "{} http post request, STATUS: {}",
                        trigger.id,
                        status.as_u16()
                    );
                    if status.as_u16() < 400 {
                        info!("fired {}", trigger.id);
                        return Ok(trigger.id.clone());
                    }
                    error!(
                        "there was an error invoking {}: {}",
                        trigger.id,
                        status.as_u16()
                    );
                    if should_disable(status) {
                        let message = message.unwrap_or_else(|| {
                            format!(
                                "Received a {} status code when firing the trigger",
                                status.as_u16()
                            )
                        });
                        self.registry
                            .disable(
                                &trigger.id,
                                Some(status.as_u16()),
                                &format!(
                                    "Trigger automatically disabled: {}",
                                    message
                                ),
                            )
                            .await;
                        return Err(FireError::Disabled {
                            id: trigger.id.clone(),
                            status_code: status.as_u16(),
                            message,
                        });
                    }
                    Some(status)
                }
                Attempt::Unreachable(err) => {
                    error!(
                        "there was an error invoking {}: {}",
                        trigger.id, err
                    );
                    None
                }
            };

            if retry_count >= RETRY_ATTEMPTS {
                return Err(FireError::RetriesExhausted(trigger.id.clone()));
            }
            let delay = retry_delay(status, retry_count);
            info!(
                "attempting to fire trigger again {}, retry count: {}",
                trigger.id,
                retry_count + 1
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
        }
    }

    async fn post_once(
        &self,
        trigger: &TriggerDoc,
        event: &Value,
        url: &str,
    ) -> Attempt {
        let request = self.http.post(url).json(event);
        let request =
            match auth::authenticated(&self.http, trigger, request).await {
                Ok(request) => request,
                Err(err) => return Attempt::Unreachable(err.to_string()),
            };
        match request.send().await {
            Ok(resp) => {
                let status = resp.status();
                let message = if status.as_u16() >= 400 {
                    extract_error_message(resp).await
                } else {
                    None
                };
                Attempt::Status(status, message)
            }
            Err(err) => Attempt::Unreachable(err.to_string()),
        }
    }
}

/// Best-effort extraction of the platform's error message from the
/// response body.
async fn extract_error_message(resp: reqwest::Response) -> Option<String> {
    let body: Value = resp.json().await.ok()?;
    if let Some(message) = body
        .pointer("/error/errorMessage")
        .and_then(|v| v.as_str())
    {
        return Some(message.to_string());
    }
    body.get("error")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
