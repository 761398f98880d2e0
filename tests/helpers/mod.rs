//! Test helper utilities for black-box API testing

use metrics_exporter_prometheus::PrometheusBuilder;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use gallery_jobs::app_state::AppState;
use gallery_jobs::build_router;
use gallery_jobs::models::job::{JobKind, QueryStatus};
use gallery_jobs::models::queue::JobStatusQueryResponse;
use gallery_jobs::services::handlers::{HandlerError, HandlerRegistry};
use gallery_jobs::services::image_processing::ThumbnailProcessor;
use gallery_jobs::services::media::MediaLibrary;
use gallery_jobs::services::queue::{JobQueue, QueueConfig};

pub struct TestServer {
    pub base_url: String,
    pub queue: JobQueue,
    pub media: MediaLibrary,
    media_dir: tempfile::TempDir,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Serve the real router on an ephemeral port. Thumbnails run for real;
    /// AI analysis is replaced by a stub that fails for ids containing "fail".
    pub async fn spawn() -> Self {
        let media_dir = tempfile::tempdir().expect("failed to create media dir");
        let media = MediaLibrary::new(media_dir.path());
        media.init().await.expect("failed to init media library");

        let registry = HandlerRegistry::builder()
            .register(
                JobKind::MetadataAndThumbnail,
                ThumbnailProcessor::new(media.clone(), 64),
            )
            .register(JobKind::AiAnalysis, |id: String| async move {
                sleep(Duration::from_millis(10)).await;
                if id.contains("fail") {
                    Err(HandlerError::from("AI provider rejected the image"))
                } else {
                    Ok(())
                }
            })
            .build();
        let queue = JobQueue::new(QueueConfig::default(), registry).expect("failed to build queue");

        let state = AppState::new(queue.clone(), media.clone(), 3);
        let metrics = Arc::new(PrometheusBuilder::new().build_recorder().handle());
        let app = build_router(state, metrics, 5 * 1024 * 1024);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            queue,
            media,
            media_dir,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Number of stored originals in the media directory.
    pub fn originals_on_disk(&self) -> usize {
        std::fs::read_dir(self.media_dir.path().join("originals"))
            .expect("originals dir exists")
            .count()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn json<T: DeserializeOwned>(response: reqwest::Response) -> T {
    response.json::<T>().await.expect("response was not valid JSON")
}

/// Poll the batch status endpoint until every id reaches a terminal state.
pub async fn wait_for_terminal(
    client: &reqwest::Client,
    server: &TestServer,
    ids: &[String],
) -> JobStatusQueryResponse {
    for _ in 0..200 {
        let response = client
            .post(server.url("/api/images/queue-status"))
            .json(&serde_json::json!({ "imageIds": ids }))
            .send()
            .await
            .unwrap();
        let body: JobStatusQueryResponse = json(response).await;
        let done = body
            .jobs
            .iter()
            .all(|j| matches!(j.status, QueryStatus::Complete | QueryStatus::Failed));
        if done {
            return body;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("jobs did not reach a terminal state in time");
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
