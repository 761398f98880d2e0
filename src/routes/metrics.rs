use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::services::queue::StatusReporter;

#[derive(Clone)]
pub struct MetricsState {
    pub handle: Arc<PrometheusHandle>,
    pub status: StatusReporter,
}

/// Prometheus metrics scrape endpoint.
///
/// Queue gauges are refreshed from the store before rendering so an idle
/// dispatcher still reports current depth.
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    let counts = state.status.queue_status();
    metrics::gauge!("media_jobs_pending").set(counts.pending as f64);
    metrics::gauge!("media_jobs_processing").set(counts.processing as f64);
    state.handle.render()
}
