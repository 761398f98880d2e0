use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::job::JobKind;
use crate::models::queue::{
    AnalyzeBatchRequest, AnalyzeResponse, JobStatusQuery, JobStatusQueryResponse, QueueCounts,
};
use crate::routes::error::ApiError;
use crate::services::media::validate_resource_id;

/// GET /api/images/queue-status: aggregate queue counts.
pub async fn get_queue_status(State(state): State<AppState>) -> Json<QueueCounts> {
    Json(state.status.queue_status())
}

/// POST /api/images/queue-status: job status per image id, for UI polling.
pub async fn get_job_statuses(
    State(state): State<AppState>,
    body: Result<Json<JobStatusQuery>, JsonRejection>,
) -> Result<Json<JobStatusQueryResponse>, ApiError> {
    let Json(query) =
        body.map_err(|_| ApiError::BadRequest("imageIds must be an array".to_string()))?;

    Ok(Json(JobStatusQueryResponse {
        jobs: state.status.jobs_by_resource_ids(&query.image_ids),
    }))
}

/// POST /api/images/analyze-batch: queue AI analysis for many images.
pub async fn analyze_batch(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeBatchRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let bad_request = || ApiError::BadRequest("imageIds must be a non-empty array".to_string());
    let Json(request) = body.map_err(|_| bad_request())?;
    request.validate().map_err(|_| bad_request())?;
    for image_id in &request.image_ids {
        validate_resource_id(image_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }

    tracing::info!(count = request.image_ids.len(), "Queuing images for AI analysis");
    for image_id in &request.image_ids {
        state.queue.enqueue(image_id.clone(), JobKind::AiAnalysis);
    }

    let count = request.image_ids.len();
    Ok(Json(AnalyzeResponse {
        success: true,
        message: format!("Queued {count} images for AI analysis"),
        count,
    }))
}

/// POST /api/images/{id}/analyze: queue AI analysis for one image.
pub async fn analyze_one(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    validate_resource_id(&image_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.queue.enqueue(image_id, JobKind::AiAnalysis);

    Ok(Json(AnalyzeResponse {
        success: true,
        message: "AI analysis queued".to_string(),
        count: 1,
    }))
}
