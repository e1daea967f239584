use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use estate_media::config::{StorageConfig, UploadConfig};
use estate_media::services::media_service::MediaService;
use estate_media::services::storage::{MemoryObjectStore, ObjectStore, StorageError};
use estate_media::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------987654321098765432109876543";

/// Store that refuses every put, counting the attempts
#[derive(Default)]
struct RefusingStore {
    puts: AtomicUsize,
}

#[async_trait]
impl ObjectStore for RefusingStore {
    async fn put_object(
        &self,
        _key: &str,
        _body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Transport("connection reset".to_string()))
    }

    async fn delete_object(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unauthorized("AccessDenied".to_string()))
    }

    fn object_url(&self, key: &str) -> String {
        format!("https://refusing.example.com/{}", key)
    }

    fn bucket(&self) -> &str {
        "refusing"
    }
}

/// Memory store that refuses puts for one file name and counts deletes
struct PartialStore {
    inner: MemoryObjectStore,
    failing_suffix: &'static str,
    deletes: AtomicUsize,
}

#[async_trait]
impl ObjectStore for PartialStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if key.ends_with(self.failing_suffix) {
            return Err(StorageError::Service("InternalError".to_string()));
        }
        self.inner.put_object(key, body, content_type).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_object(key).await
    }

    fn object_url(&self, key: &str) -> String {
        self.inner.object_url(key)
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }
}

fn app_with(store: Arc<dyn ObjectStore>, config: UploadConfig) -> axum::Router {
    let _ = tracing_subscriber::fmt::try_init();

    create_app(AppState {
        media: Arc::new(MediaService::new(store)),
        config,
        storage: StorageConfig::development(),
    })
}

fn config_for(staging: &Path) -> UploadConfig {
    let mut config = UploadConfig::default();
    config.staging_dir = staging.to_path_buf();
    config
}

fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, content_type, data) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                Content-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post_upload(app: axum::Router, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn dir_is_empty(dir: &Path) -> bool {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

#[tokio::test]
async fn test_rejects_disallowed_types_before_staging() {
    let tmp = TempDir::new().unwrap();
    let staging = tmp.path().join("uploads");
    let store = Arc::new(MemoryObjectStore::new("b"));

    for (filename, content_type) in [
        ("brochure.pdf", "application/pdf"),
        ("notes.txt", "text/plain"),
        ("payload.html", "text/html"),
    ] {
        let app = app_with(store.clone(), config_for(&staging));
        let (status, json) = post_upload(
            app,
            "/upload?folder=property/",
            multipart_body(&[(filename, content_type, &b"not an image"[..])]),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{} accepted", content_type);
        let error = json["error"].as_str().unwrap();
        assert!(error.contains("Invalid file type"));
        assert!(error.contains(content_type));
    }

    // The staging directory was never even created
    assert!(!staging.exists());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_rejects_too_many_files() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new("b"));

    let mut config = config_for(tmp.path());
    config.max_files = 2;

    let body = multipart_body(&[
        ("a.jpg", "image/jpeg", &b"a"[..]),
        ("b.jpg", "image/jpeg", &b"b"[..]),
        ("c.jpg", "image/jpeg", &b"c"[..]),
    ]);

    let (status, json) = post_upload(app_with(store.clone(), config), "/upload", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("At most 2 files"));
    // Files staged before the rejection were dropped
    assert!(dir_is_empty(tmp.path()));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_rejects_oversized_file_while_streaming() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new("b"));

    let mut config = config_for(tmp.path());
    config.max_file_size = 1024;

    let big = vec![0x42u8; 4096];
    let (status, json) = post_upload(
        app_with(store.clone(), config),
        "/upload",
        multipart_body(&[("huge.png", "image/png", big.as_slice())]),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(json["error"].as_str().unwrap().contains("exceeds maximum"));
    assert!(dir_is_empty(tmp.path()));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_rejects_hidden_and_traversal_folder() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new("b"));

    let (status, _) = post_upload(
        app_with(store.clone(), config_for(tmp.path())),
        "/upload",
        multipart_body(&[(".hidden.png", "image/png", &b"png"[..])]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = post_upload(
        app_with(store.clone(), config_for(tmp.path())),
        "/upload?folder=../other-bucket",
        multipart_body(&[("ok.png", "image/png", &b"png"[..])]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Invalid folder"));

    assert!(dir_is_empty(tmp.path()));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_store_failure_maps_to_server_error() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(RefusingStore::default());

    let (status, json) = post_upload(
        app_with(store.clone(), config_for(tmp.path())),
        "/upload?folder=property/",
        multipart_body(&[("house.jpg", "image/jpeg", &[0xFFu8, 0xD8, 0xFF][..])]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "S3 upload failed");
    assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    assert!(dir_is_empty(tmp.path()));

    let response = app_with(store, config_for(tmp.path()))
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/media?key=property/1-house.jpg")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_partial_batch_failure_rolls_back_stored_objects() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(PartialStore {
        inner: MemoryObjectStore::new("b"),
        failing_suffix: "-porch.jpg",
        deletes: AtomicUsize::new(0),
    });

    let body = multipart_body(&[
        ("kitchen.jpg", "image/jpeg", &b"kitchen"[..]),
        ("porch.jpg", "image/jpeg", &b"porch"[..]),
        ("garden.jpg", "image/jpeg", &b"garden"[..]),
    ]);

    let (status, json) = post_upload(
        app_with(store.clone(), config_for(tmp.path())),
        "/upload?folder=property/",
        body,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "S3 upload failed");
    // The two files that did land were removed again
    assert_eq!(store.deletes.load(Ordering::SeqCst), 2);
    assert!(store.inner.is_empty().await);
    assert!(dir_is_empty(tmp.path()));
}
