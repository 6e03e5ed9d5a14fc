use super::*;
use crate::Config;
use crate::config::RetryConfig;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::MockServer;


const BOUNDARY: &str = "catalog-fetch-test-boundary";

/// Config pointing every upstream at `server`, writing spreadsheets into `dir`
fn test_config(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.catalog.base_url = server.uri();
    config.upload.url = format!("{}/api/upload", server.uri());
    config.upload.public_base_url = "http://localhost:8001".into();
    config.export.path = dir.path().join("Book1.xlsx");
    config.fetch.concurrency = 4;
    config.retry = RetryConfig::none();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    config
}

fn test_service(config: Config) -> Arc<CatalogService> {
    Arc::new(CatalogService::new(config).unwrap())
}

async fn test_router() -> (Router, MockServer, TempDir) {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let router = create_router(test_service(test_config(&server, &dir)));
    (router, server, dir)
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Build a multipart/form-data body with text fields and an optional `file` part
fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _server, _dir) = test_router().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _server, _dir) = test_router().await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, &dir);
    config.api.cors_enabled = false;
    let app = create_router(test_service(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _server, _dir) = test_router().await;

    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc-123");
}

#[tokio::test]
async fn test_transaction_id_becomes_request_id() {
    let (app, _server, _dir) = test_router().await;

    let request = Request::builder()
        .uri("/health")
        .header(TRANSACTION_ID_HEADER, "tx-77")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "tx-77");
}

#[tokio::test]
async fn test_request_id_is_generated() {
    let (app, _server, _dir) = test_router().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _server, _dir) = test_router().await;

    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_server_stops_on_shutdown_and_cancels_batches() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let service = test_service(test_config(&server, &dir));
    let batches = service.shutdown_token();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(serve(listener, service, async move {
        let _ = rx.await;
    }));

    let health = reqwest::get(format!("http://{}/health", address))
        .await
        .unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();

    assert!(result.is_ok());
    assert!(batches.is_cancelled());
}
