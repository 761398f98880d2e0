use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Opaque identifier assigned to a job at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// The closed set of post-upload work a job can represent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum JobKind {
    MetadataAndThumbnail,
    #[default]
    AiAnalysis,
}

/// Lifecycle of a job: `pending -> processing -> {complete | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// Status reported to callers asking about a resource id.
///
/// Adds `NotFound` for ids that were never enqueued or whose jobs have
/// already been evicted from the finished log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum QueryStatus {
    Pending,
    Processing,
    Complete,
    Failed,
    NotFound,
}

impl From<JobStatus> for QueryStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => QueryStatus::Pending,
            JobStatus::Processing => QueryStatus::Processing,
            JobStatus::Complete => QueryStatus::Complete,
            JobStatus::Failed => QueryStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal job transition from {from} to {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One unit of deferred work tied to a resource (image) id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub resource_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(resource_id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            id: JobId::new(),
            kind,
            resource_id: resource_id.into(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            processed_at: None,
            error: None,
        }
    }

    /// Move a pending job into `processing`.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        if self.status != JobStatus::Pending {
            return Err(TransitionError {
                from: self.status,
                to: JobStatus::Processing,
            });
        }
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Move a processing job into its terminal state.
    ///
    /// `Err(message)` marks the job failed and keeps the message.
    pub fn finish(&mut self, outcome: Result<(), String>) -> Result<(), TransitionError> {
        let to = if outcome.is_ok() {
            JobStatus::Complete
        } else {
            JobStatus::Failed
        };
        if self.status != JobStatus::Processing {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.error = outcome.err();
        self.processed_at = Some(Utc::now());
        Ok(())
    }

    /// Wall time between claim and settle, once the job has finished.
    pub fn run_time(&self) -> Option<Duration> {
        let (started, processed) = self.started_at.zip(self.processed_at)?;
        processed.signed_duration_since(started).to_std().ok()
    }
}
