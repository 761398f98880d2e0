use axum::extract::{Multipart, State};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::JobKind;
use crate::models::queue::{UploadResponse, UploadResult};
use crate::routes::error::ApiError;

/// POST /api/upload: store uploaded images and queue their post-processing.
///
/// Each accepted file gets a metadata-and-thumbnail job followed by an
/// AI analysis job. Per-file failures are reported in the result list
/// without failing the whole request.
pub async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("files") {
            continue;
        }
        // Checked before anything is stored or queued.
        if files.len() >= state.max_files_per_batch {
            return Err(ApiError::BadRequest(format!(
                "At most {} files may be uploaded per batch",
                state.max_files_per_batch
            )));
        }

        let filename = field.file_name().unwrap_or("unknown").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
        files.push((filename, data));
    }

    let mut results = Vec::with_capacity(files.len());
    for (filename, data) in files {
        results.push(store_upload(&state, filename, &data).await);
    }

    if results.is_empty() {
        return Err(ApiError::BadRequest("No valid files uploaded".to_string()));
    }

    Ok(Json(UploadResponse {
        success: true,
        count: results.len(),
        results,
    }))
}

async fn store_upload(state: &AppState, filename: String, data: &[u8]) -> UploadResult {
    let format = match image::guess_format(data) {
        Ok(format) => format,
        Err(_) => {
            tracing::warn!(filename = %filename, "Rejected upload with unsupported format");
            return UploadResult {
                id: None,
                filename,
                status: "error".to_string(),
                ai_queued: None,
                error: Some("Unsupported image format".to_string()),
            };
        }
    };

    let ext = format.extensions_str().first().copied().unwrap_or("img");
    let resource_id = format!("{}.{}", Uuid::new_v4().simple(), ext);

    if let Err(e) = state.media.save_original(&resource_id, data).await {
        tracing::error!(filename = %filename, error = %e, "Failed to store upload");
        return UploadResult {
            id: None,
            filename,
            status: "error".to_string(),
            ai_queued: None,
            error: Some("Failed to process file".to_string()),
        };
    }

    state
        .queue
        .enqueue(resource_id.clone(), JobKind::MetadataAndThumbnail);
    state.queue.enqueue(resource_id.clone(), JobKind::AiAnalysis);

    tracing::info!(resource_id = %resource_id, filename = %filename, "Image uploaded, processing queued");

    UploadResult {
        id: Some(resource_id),
        filename,
        status: "success".to_string(),
        ai_queued: Some(true),
        error: None,
    }
}
