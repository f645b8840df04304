use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A durable trigger subscription linking a storage bucket + polling
/// interval to a platform trigger endpoint. Serialization matches the
/// document store's JSON shape (`_id`/`_rev` keys included).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerDoc {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Platform credential in `uuid:key` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apikey: Option<String>,
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_apikey: Option<String>,
    /// Polling cadence in minutes; owned by the event source once registered.
    pub interval: u64,
    /// Worker this trigger is permanently assigned to at creation time.
    pub worker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TriggerStatus>,
    /// Opaque credential context (e.g. token issuer endpoint and scope),
    /// passed through to auth strategy selection.
    #[serde(
        rename = "additionalData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_data: Option<serde_json::Value>,
}

impl TriggerDoc {
    /// A missing status block counts as active.
    pub fn is_active(&self) -> bool {
        self.status.as_ref().map_or(true, |s| s.active)
    }

    /// Record a status transition. `date_changed` strictly increases across
    /// transitions even when the clock does not.
    pub fn set_status(&mut self, active: bool, reason: Option<StatusReason>) {
        let now = Utc::now().timestamp_millis();
        let date_changed = match &self.status {
            Some(prev) if prev.date_changed >= now => prev.date_changed + 1,
            _ => now,
        };
        self.status = Some(TriggerStatus {
            active,
            date_changed,
            reason,
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerStatus {
    pub active: bool,
    #[serde(rename = "dateChanged")]
    pub date_changed: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<StatusReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReason {
    pub kind: ReasonKind,
    #[serde(
        rename = "statusCode",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusReason {
    pub fn auto(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: ReasonKind::Auto,
            status_code,
            message: Some(message.into()),
        }
    }

    pub fn manual(message: impl Into<String>) -> Self {
        Self {
            kind: ReasonKind::Manual,
            status_code: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReasonKind {
    Manual,
    Auto,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TriggerDoc {
        TriggerDoc {
            id: "/ns/t1".to_string(),
            rev: None,
            apikey: Some("uuid:key".to_string()),
            bucket: "my-bucket".to_string(),
            endpoint: Some("s3.example.com".to_string()),
            bucket_apikey: None,
            interval: 1,
            worker: "worker0".to_string(),
            status: None,
            additional_data: None,
        }
    }

    #[test]
    fn missing_status_is_active() {
        assert!(sample().is_active());
    }

    #[test]
    fn disabled_status_is_inactive() {
        let mut doc = sample();
        doc.set_status(false, Some(StatusReason::auto(Some(404), "gone")));
        assert!(!doc.is_active());
        let status = doc.status.unwrap();
        let reason = status.reason.unwrap();
        assert_eq!(reason.kind, ReasonKind::Auto);
        assert_eq!(reason.status_code, Some(404));
    }

    #[test]
    fn date_changed_strictly_increases() {
        let mut doc = sample();
        doc.set_status(true, None);
        let first = doc.status.as_ref().unwrap().date_changed;
        doc.set_status(false, None);
        let second = doc.status.as_ref().unwrap().date_changed;
        assert!(second > first);
    }

    #[test]
    fn serde_uses_document_store_keys() {
        let mut doc = sample();
        doc.set_status(false, Some(StatusReason::auto(Some(410), "dead")));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], "/ns/t1");
        assert!(json.get("_rev").is_none());
        assert_eq!(json["status"]["reason"]["kind"], "AUTO");
        assert_eq!(json["status"]["reason"]["statusCode"], 410);
        assert!(json["status"]["dateChanged"].is_i64());

        let back: TriggerDoc = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }
}
