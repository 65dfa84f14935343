//! Route-level tests driving the axum router in process, no listener.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use datadock::api::{self, AppState};
use datadock::config::{Config, FetchConfig, LlmConfig};
use datadock::fetch::HttpSourceFetcher;
use datadock::llm::OpenAiClient;
use datadock::warehouse::{EmbeddedWarehouse, Warehouse};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

fn test_config(data_dir: &Path, upload_dir: &Path) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        data_dir: data_dir.to_path_buf(),
        upload_dir: upload_dir.to_path_buf(),
        max_result_rows: 1000,
        llm: LlmConfig {
            api_key: "dummy-api-key".to_string(),
            model: "gpt-4".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        },
        fetch: FetchConfig::default(),
    }
}

fn test_app(config: Config) -> (Router, Arc<EmbeddedWarehouse>) {
    let warehouse = Arc::new(EmbeddedWarehouse::new(config.data_dir.clone()));
    let fetcher = HttpSourceFetcher::new(&config.fetch).unwrap();
    let state = AppState {
        warehouse: warehouse.clone(),
        llm: Arc::new(OpenAiClient::new(&config.llm)),
        fetcher: Arc::new(fetcher),
        config: Arc::new(config),
    };
    (api::router(state), warehouse)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

const BOUNDARY: &str = "dock-test-boundary";

fn multipart_upload(filename: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_upload_strips_path_components() {
    let root = tempfile::tempdir().unwrap();
    let data_dir = root.path().join("data");
    let upload_dir = root.path().join("uploads");
    let (app, warehouse) = test_app(test_config(&data_dir, &upload_dir));

    let request = multipart_upload("../evil.csv", "region,total\nnorth,1.5\nsouth,2.5");
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["tables_loaded"], 1);

    // The file landed under the upload dir with its basename, not beside it.
    assert!(upload_dir.join("evil.csv").is_file());
    assert!(!root.path().join("evil.csv").exists());

    let session = warehouse.connect().await.unwrap();
    assert_eq!(session.row_count("EVIL").await.unwrap(), 2);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let (app, _) = test_app(test_config(
        &root.path().join("data"),
        &root.path().join("uploads"),
    ));

    let body = format!("--{BOUNDARY}--\r\n");
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_load_route_reports_per_source_outcome() {
    let root = tempfile::tempdir().unwrap();
    let csv_path = root.path().join("sales.csv");
    std::fs::write(&csv_path, "region,total\nnorth,10.0\nsouth,20.0\neast,30.0").unwrap();

    let (app, warehouse) = test_app(test_config(
        &root.path().join("data"),
        &root.path().join("uploads"),
    ));

    let payload = serde_json::json!({
        "sources": [csv_path.to_string_lossy(), "missing.parquet"]
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/load")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Business failures ride in the body: the run completes with one table
    // loaded and an error event for the missing source.
    let body = json_body(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["tables_loaded"], 1);
    let events = body["events"].as_array().unwrap();
    assert!(events
        .iter()
        .any(|e| e["level"] == "error" && e["source"] == "source_2"));

    let session = warehouse.connect().await.unwrap();
    assert_eq!(session.row_count("SALES").await.unwrap(), 3);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_health_shape() {
    let root = tempfile::tempdir().unwrap();
    let (app, _) = test_app(test_config(
        &root.path().join("data"),
        &root.path().join("uploads"),
    ));

    let request = Request::builder()
        .method("GET")
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["warehouse"].as_str().unwrap().contains("embedded warehouse"));
    assert_eq!(body["chart_engines"]["plotters"], true);
}

#[tokio::test]
async fn test_ask_with_empty_question_is_bad_request() {
    let root = tempfile::tempdir().unwrap();
    let (app, _) = test_app(test_config(
        &root.path().join("data"),
        &root.path().join("uploads"),
    ));

    let request = Request::builder()
        .method("POST")
        .uri("/api/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"question": "  "}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
