//! Shared fixtures for the router and client tests.

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use tokio::net::TcpListener;
use wedding_snaps::{
    AppState, Config, PhotoRecord, build_router,
    database::{MemoryMetadataStore, MetadataError, MetadataStore},
    storage::{BlobStore, MemoryStorage, StorageError, StoredBlob},
};

pub const ADMIN_TOKEN: &str = "let-me-delete";
pub const BOUNDARY: &str = "----snaps-test-boundary";

pub fn test_config() -> Config {
    Config {
        public_base_url: "http://localhost:3000/blobs".to_string(),
        admin_token: Some(ADMIN_TOKEN.to_string()),
        ..Config::default()
    }
}

/// Memory blob store whose operations can be made to fail.
#[derive(Clone, Default)]
pub struct FlakyStorage {
    pub inner: MemoryStorage,
    pub fail_put: Arc<AtomicBool>,
    pub fail_delete: Arc<AtomicBool>,
}

#[async_trait]
impl BlobStore for FlakyStorage {
    async fn put(&self, key: &str, content: Bytes, content_type: &str) -> Result<(), StorageError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::UploadError("bucket unavailable".into()));
        }
        self.inner.put(key, content, content_type).await
    }

    async fn get(&self, key: &str) -> Result<StoredBlob, StorageError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteError("bucket unavailable".into()));
        }
        self.inner.delete(key).await
    }
}

/// Metadata store whose inserts can be made to fail, and whose deletes can
/// lose a race with another request.
#[derive(Clone, Default)]
pub struct FlakyMetadata {
    pub inner: MemoryMetadataStore,
    pub fail_insert: Arc<AtomicBool>,
    pub lose_delete_race: Arc<AtomicBool>,
}

#[async_trait]
impl MetadataStore for FlakyMetadata {
    async fn insert(&self, record: &PhotoRecord) -> Result<(), MetadataError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(MetadataError::Unavailable("database locked".into()));
        }
        self.inner.insert(record).await
    }

    async fn list(&self) -> Result<Vec<PhotoRecord>, MetadataError> {
        self.inner.list().await
    }

    async fn find(&self, id: &str) -> Result<Option<PhotoRecord>, MetadataError> {
        self.inner.find(id).await
    }

    async fn delete(&self, id: &str) -> Result<bool, MetadataError> {
        if self.lose_delete_race.load(Ordering::SeqCst) {
            // Someone else got there first.
            self.inner.delete(id).await?;
            return Ok(false);
        }
        self.inner.delete(id).await
    }
}

/// A router over flaky in-memory backends, with handles to poke at them.
pub struct TestApp {
    pub router: Router,
    pub storage: FlakyStorage,
    pub metadata: FlakyMetadata,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let storage = FlakyStorage::default();
        let metadata = FlakyMetadata::default();
        let state = AppState::new(config, Arc::new(metadata.clone()), Arc::new(storage.clone()));
        Self {
            router: build_router(state),
            storage,
            metadata,
        }
    }
}

/// Multipart body with a single `file` part.
pub fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/photos")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body("file", filename, content_type, data)))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::ORIGIN, "https://gallery.example")
        .body(Body::empty())
        .unwrap()
}

pub fn delete_request(id: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("DELETE")
        .uri(format!("/api/photos/{id}"));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Serve `config` on an ephemeral port with in-memory backends.
/// `public_base_url` is pointed at the bound address.
pub async fn spawn_server(mut config: Config) -> (SocketAddr, TestApp) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.public_base_url = format!("http://{addr}/blobs");

    let app = TestApp::with_config(config);
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, app)
}
