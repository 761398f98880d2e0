use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::QueryStatus;

/// Aggregate counts over the queue store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

/// Most relevant known job state for one requested resource id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceJobStatus {
    pub resource_id: String,
    pub status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourceJobStatus {
    pub fn not_found(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            status: QueryStatus::NotFound,
            error: None,
        }
    }
}

/// Body of `POST /api/images/queue-status`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusQuery {
    pub image_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusQueryResponse {
    pub jobs: Vec<ResourceJobStatus>,
}

/// Body of `POST /api/images/analyze-batch`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBatchRequest {
    #[garde(length(min = 1), inner(length(min = 1, max = 200)))]
    pub image_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
}

/// Per-file outcome of `POST /api/upload`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub filename: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_queued: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub count: usize,
    pub results: Vec<UploadResult>,
}
