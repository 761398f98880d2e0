use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub queue: QueueHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueHealth {
    pub running: bool,
    pub pending: usize,
    pub processing: usize,
}

/// GET /health: liveness plus a glance at the job queue.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let counts = state.status.queue_status();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        queue: QueueHealth {
            running: state.status.is_running(),
            pending: counts.pending,
            processing: counts.processing,
        },
    })
}
