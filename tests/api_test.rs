//! Black-box tests of the HTTP surface: the real router on an ephemeral
//! port, driven with reqwest.

mod helpers;

use helpers::*;
use reqwest::multipart;
use reqwest::StatusCode;
use serde_json::{json, Value};

use gallery_jobs::models::job::QueryStatus;
use gallery_jobs::models::queue::{
    AnalyzeResponse, JobStatusQueryResponse, QueueCounts, UploadResponse,
};
use gallery_jobs::routes::health::HealthResponse;

#[tokio::test]
async fn test_health_reports_idle_queue() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: HealthResponse = json(response).await;
    assert_eq!(body.status, "ok");
    assert!(!body.queue.running);
    assert_eq!(body.queue.pending, 0);
}

#[tokio::test]
async fn test_queue_status_starts_empty() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let response = client
            .get(server.url("/api/images/queue-status"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let counts: QueueCounts = json(response).await;
        assert_eq!(counts, QueueCounts::default());
    }
}

#[tokio::test]
async fn test_job_status_query_validates_body() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/images/queue-status"))
        .json(&json!({ "imageIds": "img1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json(response).await;
    assert_eq!(body["error"], "imageIds must be an array");

    let response = client
        .post(server.url("/api/images/queue-status"))
        .json(&json!({ "imageIds": ["unknown-id"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = json(response).await;
    assert_eq!(
        body,
        json!({ "jobs": [{ "resourceId": "unknown-id", "status": "not-found" }] })
    );
}

#[tokio::test]
async fn test_analyze_batch_queues_and_reports_outcomes() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/images/analyze-batch"))
        .json(&json!({ "imageIds": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let ids = vec!["img-ok".to_string(), "img-fail".to_string()];
    let response = client
        .post(server.url("/api/images/analyze-batch"))
        .json(&json!({ "imageIds": ids }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: AnalyzeResponse = json(response).await;
    assert!(body.success);
    assert_eq!(body.count, 2);
    assert_eq!(body.message, "Queued 2 images for AI analysis");

    let statuses = wait_for_terminal(&client, &server, &ids).await;
    assert_eq!(statuses.jobs[0].status, QueryStatus::Complete);
    assert_eq!(statuses.jobs[1].status, QueryStatus::Failed);
    assert_eq!(
        statuses.jobs[1].error.as_deref(),
        Some("AI provider rejected the image")
    );

    let counts = server.queue.queue_status();
    assert_eq!((counts.completed, counts.failed), (1, 1));
}

#[tokio::test]
async fn test_analyze_batch_rejects_unsafe_ids_before_queuing() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/images/analyze-batch"))
        .json(&json!({ "imageIds": ["img-ok", "../x"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json(response).await;
    assert_eq!(body["error"], "Invalid resource id: \"../x\"");

    assert_eq!(server.queue.queue_status(), QueueCounts::default());
}

#[tokio::test]
async fn test_single_analyze_goes_through_queue() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/images/photo1.jpg/analyze"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: AnalyzeResponse = json(response).await;
    assert_eq!(body.message, "AI analysis queued");

    let statuses = wait_for_terminal(&client, &server, &["photo1.jpg".to_string()]).await;
    assert_eq!(statuses.jobs[0].status, QueryStatus::Complete);
}

#[tokio::test]
async fn test_upload_stores_original_and_runs_both_jobs() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let form = multipart::Form::new()
        .part(
            "files",
            multipart::Part::bytes(png_bytes(256, 128))
                .file_name("sunset.png")
                .mime_str("image/png")
                .unwrap(),
        )
        .part(
            "files",
            multipart::Part::bytes(b"plain text".to_vec())
                .file_name("notes.txt")
                .mime_str("text/plain")
                .unwrap(),
        );

    let response = client
        .post(server.url("/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: UploadResponse = json(response).await;
    assert_eq!(body.count, 2);

    let stored = &body.results[0];
    assert_eq!(stored.status, "success");
    assert_eq!(stored.filename, "sunset.png");
    assert_eq!(stored.ai_queued, Some(true));
    let id = stored.id.clone().expect("accepted upload has an id");
    assert!(id.ends_with(".png"));

    let rejected = &body.results[1];
    assert_eq!(rejected.status, "error");
    assert_eq!(rejected.error.as_deref(), Some("Unsupported image format"));

    let statuses: JobStatusQueryResponse =
        wait_for_terminal(&client, &server, &[id.clone()]).await;
    assert_eq!(statuses.jobs[0].status, QueryStatus::Complete);

    server.queue.wait_idle().await;
    let counts = server.queue.queue_status();
    assert_eq!((counts.completed, counts.failed), (2, 0));

    let thumb = image::open(server.media.thumbnail_path(&id).unwrap()).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (64, 32));
}

#[tokio::test]
async fn test_upload_over_batch_limit_stores_nothing() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let mut form = multipart::Form::new();
    for n in 0..4 {
        form = form.part(
            "files",
            multipart::Part::bytes(png_bytes(16, 16))
                .file_name(format!("shot{n}.png"))
                .mime_str("image/png")
                .unwrap(),
        );
    }

    let response = client
        .post(server.url("/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json(response).await;
    assert_eq!(body["error"], "At most 3 files may be uploaded per batch");

    assert_eq!(server.originals_on_disk(), 0);
    assert_eq!(server.queue.queue_status(), QueueCounts::default());
}

#[tokio::test]
async fn test_upload_without_files_is_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let form = multipart::Form::new().text("caption", "no files here");
    let response = client
        .post(server.url("/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json(response).await;
    assert_eq!(body["error"], "No valid files uploaded");
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/metrics")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
