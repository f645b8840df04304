use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ActiveResponse {
    pub worker: String,
    pub host: String,
    /// `true`/`false`, or the string `"swapping"` while an override is in
    /// flight.
    pub active: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActiveQuery {
    pub active: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    #[serde(rename = "triggerCount")]
    pub trigger_count: usize,
    pub memory: MemorySnapshot,
    pub cpu: CpuSnapshot,
    #[serde(rename = "uptimeSeconds")]
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct MemorySnapshot {
    pub total: u64,
    pub used: u64,
    pub available: u64,
}

#[derive(Debug, Serialize)]
pub struct CpuSnapshot {
    pub cores: usize,
    #[serde(rename = "loadAverage")]
    pub load_average: LoadSnapshot,
}

#[derive(Debug, Serialize)]
pub struct LoadSnapshot {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}
