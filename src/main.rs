use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use gallery_jobs::{
    app_state::AppState,
    build_handlers, build_router,
    config::AppConfig,
    services::{media::MediaLibrary, queue::JobQueue},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing gallery-jobs server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("media_jobs_enqueued_total", "Total jobs enqueued");
    metrics::describe_counter!("media_jobs_completed_total", "Total jobs completed");
    metrics::describe_counter!("media_jobs_failed_total", "Total jobs that failed");
    metrics::describe_histogram!(
        "media_job_duration_seconds",
        "Wall-clock time spent in a job handler"
    );
    metrics::describe_gauge!("media_jobs_pending", "Jobs waiting for a free slot");
    metrics::describe_gauge!("media_jobs_processing", "Jobs currently running");

    // Prepare media directories
    let media = MediaLibrary::new(&config.media_root);
    media
        .init()
        .await
        .expect("Failed to create media directories");
    tracing::info!(media_root = %config.media_root, "Media library ready");

    if config.anthropic_api_key.is_none() {
        tracing::warn!("ANTHROPIC_API_KEY is not set; AI analysis jobs will fail");
    }

    // Initialize the job queue
    let handlers = build_handlers(&config, &media);
    let queue = JobQueue::new(config.queue_config(), handlers)
        .expect("Failed to initialize job queue");
    tracing::info!(concurrency = queue.concurrency(), "Job queue ready");

    let state = AppState::new(queue.clone(), media, config.max_files_per_batch);
    let app = build_router(state, prometheus_handle, config.max_upload_bytes);

    tracing::info!("Starting gallery-jobs on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Jobs are in memory only; let running work settle before exiting.
    tracing::info!("Waiting for queued jobs to finish");
    queue.wait_idle().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
