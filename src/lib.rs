//! Media gallery job service
//!
//! Uploaded images are post-processed by an in-process job queue with a
//! fixed concurrency limit: metadata extraction and thumbnailing, then AI
//! classification. The HTTP layer enqueues work and polls job status.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use app_state::AppState;
use config::AppConfig;
use models::job::JobKind;
use routes::metrics::MetricsState;
use services::{
    ai::{AiAnalyzer, AiClient},
    handlers::HandlerRegistry,
    image_processing::ThumbnailProcessor,
    media::MediaLibrary,
};

/// Handlers for every job kind, backed by the media library and AI client.
pub fn build_handlers(config: &AppConfig, media: &MediaLibrary) -> HandlerRegistry {
    let ai_client = Arc::new(AiClient::new(
        config.anthropic_base_url.clone(),
        config.anthropic_api_key.clone(),
        config.claude_model.clone(),
    ));

    HandlerRegistry::builder()
        .register(
            JobKind::MetadataAndThumbnail,
            ThumbnailProcessor::new(media.clone(), config.thumbnail_max_width),
        )
        .register(JobKind::AiAnalysis, AiAnalyzer::new(ai_client, media.clone()))
        .build()
}

/// The full HTTP surface, shared by the server binary and black-box tests.
pub fn build_router(state: AppState, metrics: Arc<PrometheusHandle>, max_upload_bytes: usize) -> Router {
    let metrics_state = MetricsState {
        handle: metrics,
        status: state.status.clone(),
    };

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/images/queue-status",
            get(routes::queue::get_queue_status).post(routes::queue::get_job_statuses),
        )
        .route("/api/images/analyze-batch", post(routes::queue::analyze_batch))
        .route("/api/images/{id}/analyze", post(routes::queue::analyze_one))
        .route("/api/upload", post(routes::upload::upload_images))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(metrics_state),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}
