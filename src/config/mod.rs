use serde::Deserialize;
use std::time::Duration;

use crate::services::queue::QueueConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory holding originals, thumbnails and sidecars
    #[serde(default = "default_media_root")]
    pub media_root: String,

    /// Maximum number of jobs running at once
    #[serde(default = "default_queue_concurrency")]
    pub queue_concurrency: usize,

    /// How long finished jobs stay visible to status queries
    #[serde(default = "default_finished_job_retention_secs")]
    pub finished_job_retention_secs: u64,

    /// Upper bound on retained finished jobs
    #[serde(default = "default_max_finished_jobs")]
    pub max_finished_jobs: usize,

    #[serde(default = "default_thumbnail_max_width")]
    pub thumbnail_max_width: u32,

    /// Anthropic API key. AI analysis jobs fail while unset.
    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    #[serde(default = "default_claude_model")]
    pub claude_model: String,

    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,

    /// Request body limit for uploads, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_max_files_per_batch")]
    pub max_files_per_batch: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_media_root() -> String {
    "./media".to_string()
}

fn default_queue_concurrency() -> usize {
    3
}

fn default_finished_job_retention_secs() -> u64 {
    600
}

fn default_max_finished_jobs() -> usize {
    1000
}

fn default_thumbnail_max_width() -> u32 {
    400
}

fn default_claude_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_max_files_per_batch() -> usize {
    50
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            concurrency: self.queue_concurrency,
            finished_retention: Duration::from_secs(self.finished_job_retention_secs),
            max_finished_jobs: self.max_finished_jobs,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            media_root: default_media_root(),
            queue_concurrency: default_queue_concurrency(),
            finished_job_retention_secs: default_finished_job_retention_secs(),
            max_finished_jobs: default_max_finished_jobs(),
            thumbnail_max_width: default_thumbnail_max_width(),
            anthropic_api_key: None,
            claude_model: default_claude_model(),
            anthropic_base_url: default_anthropic_base_url(),
            max_upload_bytes: default_max_upload_bytes(),
            max_files_per_batch: default_max_files_per_batch(),
        }
    }
}
