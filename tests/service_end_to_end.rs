//! End-to-end tests of `CatalogService` against a mocked catalog and file service

use catalog_fetch::catalog::{ProductDraft, ReportStatus};
use catalog_fetch::config::RetryConfig;
use catalog_fetch::{CatalogService, Config, Error};
use serde_json::json;
use std::io::Read;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.catalog.base_url = server.uri();
    config.upload.url = format!("{}/api/upload", server.uri());
    config.upload.public_base_url = "https://files.example.com".into();
    config.export.path = dir.path().join("catalog.xlsx");
    config.fetch.concurrency = 3;
    config.fetch.chunk_size = 4;
    config.retry = RetryConfig::none();
    config
}

async fn mount_catalog(server: &MockServer, count: usize) {
    let data: Vec<_> = (1..=count).map(|i| json!({"ID": i.to_string()})).collect();
    Mock::given(method("GET"))
        .and(path("/api/product"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "ok",
            "statusCode": 200,
            "data": data,
            "total": count
        })))
        .expect(1)
        .mount(server)
        .await;

    for i in 1..=count {
        Mock::given(method("GET"))
            .and(path(format!("/api/product/{}", i)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(20))
                    .set_body_json(json!({
                        "data": {
                            "ID": i.to_string(),
                            "Name": format!("Widget {}", i),
                            "Description": "steel",
                            "Price": i as f64 * 1.5,
                            "Image": "",
                            "Stock": i
                        }
                    })),
            )
            .expect(1)
            .mount(server)
            .await;
    }
}

fn shared_strings(path: &std::path::Path) -> String {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut xml = String::new();
    archive
        .by_name("xl/sharedStrings.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    xml
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fetches_whole_catalog_and_exports_it() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(&server, 10).await;
    let service = CatalogService::new(config_for(&server, &dir)).unwrap();

    let report = service.fetch_all(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.status, ReportStatus::Success);
    assert_eq!(report.total, 10);
    let names: Vec<_> = report.products.iter().map(|p| p.name.clone()).collect();
    let expected: Vec<_> = (1..=10).map(|i| format!("Widget {}", i)).collect();
    assert_eq!(names, expected);

    let sheet = report.spreadsheet.unwrap();
    assert_eq!(sheet, dir.path().join("catalog.xlsx"));
    let strings = shared_strings(&sheet);
    assert!(strings.contains("Widget 1"));
    assert!(strings.contains("Widget 10"));
}

#[tokio::test]
async fn cached_catalog_is_reused() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(&server, 2).await;
    let service = CatalogService::new(config_for(&server, &dir)).unwrap();

    assert_eq!(service.load_catalog().await.unwrap(), 2);
    assert_eq!(service.cached_ids().await, vec!["1", "2"]);

    let report = service
        .fetch_sequential(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.total, 2);
    // `expect(1)` on the listing mock verifies no second list call on drop
}

#[tokio::test]
async fn cancelled_sequential_fetch_returns_cancelled() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&server, &dir);
    config.export.enabled = false;
    Mock::given(method("GET"))
        .and(path("/api/product"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "message": "ok", "statusCode": 200,
            "data": [{"ID": "1"}], "total": 1
        })))
        .mount(&server)
        .await;
    let service = CatalogService::new(config).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = service.fetch_sequential(&cancel).await;

    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn creates_product_with_uploaded_image() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "uploaded",
            "statusCode": 201,
            "data": {
                "id": "f-9",
                "href": "{BASE_URL}/api/download?filename=Lamp.jpg&filePath=products",
                "fileName": "Lamp.jpg",
                "filePath": "public/images/products",
                "mimetype": "image/jpeg",
                "size": 3
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/product"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "message": "created",
            "statusCode": 201,
            "data": {
                "id": "p-9",
                "name": "Lamp",
                "price": 20.0,
                "stock": 1,
                "description": "desk",
                "image": "https://files.example.com/api/download?filename=Lamp.jpg&filePath=products"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    let service = CatalogService::new(config_for(&server, &dir)).unwrap();

    let created = service
        .create_product(ProductDraft {
            name: "Lamp".into(),
            price: 20.0,
            description: "desk".into(),
            stock: 1,
            file_name: "lamp.jpg".into(),
            content_type: Some("image/jpeg".into()),
            image: vec![1, 2, 3],
        })
        .await
        .unwrap();

    assert_eq!(created.id, "p-9");
    assert!(created.image.starts_with("https://files.example.com/"));

    let requests = server.received_requests().await.unwrap();
    let create = requests
        .iter()
        .find(|r| r.url.path() == "/api/product")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&create.body).unwrap();
    assert_eq!(
        body["image"],
        "https://files.example.com/api/download?filename=Lamp.jpg&filePath=products"
    );
}
