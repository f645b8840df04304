use crate::api::views::{
    ActiveQuery, ActiveResponse, CpuSnapshot, HealthResponse, LoadSnapshot,
    MemorySnapshot,
};
use crate::coordinator::SwapOutcome;
use crate::errors::ApiError;
use crate::server::AppState;
use axum::{
    Json,
    extract::{Query, State},
};
use serde_json::json;
use tracing::{error, info};

/// Report whether this host is the active firer; `?active=true|false`
/// requests a swap towards (or away from) this host.
pub async fn get_active(
    State(state): State<AppState>,
    Query(query): Query<ActiveQuery>,
) -> Result<Json<ActiveResponse>, ApiError> {
    let coordinator = &state.coordinator;
    let mut response = ActiveResponse {
        worker: coordinator.worker().to_string(),
        host: coordinator.host().to_string(),
        active: json!(coordinator.is_active().await),
        message: None,
    };

    let Some(requested) = query.active else {
        return Ok(Json(response));
    };
    let target = match requested.to_lowercase().as_str() {
        "true" => coordinator.host().to_string(),
        "false" => coordinator.redundant_host().to_string(),
        _ => {
            return Err(ApiError::BadRequest(
                "Invalid query string".to_string(),
            ));
        }
    };

    match coordinator.request_active(&target).await {
        Ok(SwapOutcome::Swapping) => {
            info!("active host swap in progress");
            response.active = json!("swapping");
            response.message =
                Some(format!("Active host swap to {} in progress", target));
        }
        Ok(SwapOutcome::Unchanged) => {}
        Err(err) => {
            error!("active host swap failed: {}", err);
            return Err(ApiError::InternalServerError(format!(
                "Failed to swap active host: {}",
                err
            )));
        }
    }
    Ok(Json(response))
}

/// Resource snapshot plus the size of the in-memory trigger set.
pub async fn get_health(
    State(state): State<AppState>,
) -> Json<HealthResponse> {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    sys.refresh_cpu_all();
    let load = sysinfo::System::load_average();

    Json(HealthResponse {
        trigger_count: state.registry.len(),
        memory: MemorySnapshot {
            total: sys.total_memory(),
            used: sys.used_memory(),
            available: sys.available_memory(),
        },
        cpu: CpuSnapshot {
            cores: sys.cpus().len(),
            load_average: LoadSnapshot {
                one: load.one,
                five: load.five,
                fifteen: load.fifteen,
            },
        },
        uptime_seconds: sysinfo::System::uptime(),
    })
}
