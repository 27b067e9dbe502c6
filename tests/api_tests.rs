//! Ingestion endpoint tests, driving the router directly.

mod common;

use std::{collections::HashSet, sync::atomic::Ordering};

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::*;
use tower::ServiceExt;
use wedding_snaps::{
    AppState, Config, PhotoRecord, build_router,
    database::{MetadataStore, SqliteMetadataStore},
    storage::{BlobStore, MemoryStorage},
};

async fn upload(app: &TestApp, filename: &str, content_type: &str, data: &[u8]) -> PhotoRecord {
    let response = app
        .router
        .clone()
        .oneshot(upload_request(filename, content_type, data))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    serde_json::from_value(body_json(response).await).unwrap()
}

async fn list(app: &TestApp) -> Vec<PhotoRecord> {
    let response = app.router.clone().oneshot(get_request("/api/photos")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_value(body_json(response).await).unwrap()
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn preflight_is_answered_with_no_content() {
    let app = TestApp::new();

    for uri in ["/api/photos", "/api/photos/some-id"] {
        let request = Request::builder()
            .method("OPTIONS")
            .uri(uri)
            .header(header::ORIGIN, "https://gallery.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("POST") && methods.contains("DELETE"));
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
        assert!(body_bytes(response).await.is_empty());
    }
}

#[tokio::test]
async fn regular_responses_carry_cors_headers() {
    let app = TestApp::new();
    let response = app.router.clone().oneshot(get_request("/api/photos")).await.unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/photos/unknown"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

// =============================================================================
// POST
// =============================================================================

#[tokio::test]
async fn upload_creates_record_and_blob() {
    let app = TestApp::new();
    let record = upload(&app, "Kiss.JPG", "image/jpeg", b"fake jpeg").await;

    assert_eq!(record.media_type.as_str(), "image");
    assert!(record.url.starts_with("http://localhost:3000/blobs/"));
    assert!(record.url.ends_with(&format!("{}.jpg", record.id)));

    let key = format!("{}.jpg", record.id);
    let blob = app.storage.inner.get(&key).await.unwrap();
    assert_eq!(&blob.content[..], b"fake jpeg");
    assert_eq!(blob.content_type, "image/jpeg");
}

#[tokio::test]
async fn response_shape_matches_the_wire_contract() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(upload_request("dance.mp4", "video/mp4", b"frames"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let object = json.as_object().unwrap();
    let mut fields: Vec<_> = object.keys().map(String::as_str).collect();
    fields.sort_unstable();
    assert_eq!(fields, ["created_at", "id", "type", "url"]);
    assert_eq!(json["type"], "video");
    assert!(json["created_at"].is_i64());
}

#[tokio::test]
async fn missing_extension_falls_back_to_bin() {
    let app = TestApp::new();
    let record = upload(&app, "IMG_0001", "image/heic", b"heic").await;
    assert!(record.url.ends_with(&format!("{}.bin", record.id)));
}

#[tokio::test]
async fn content_type_is_guessed_when_part_has_none() {
    let app = TestApp::new();
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"toast.mov\"\r\n\r\nmoov\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/photos")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["type"], "video");
}

#[tokio::test]
async fn non_multipart_request_is_rejected() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/api/photos")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Content-Type must be multipart/form-data"
    );
    assert!(list(&app).await.is_empty());
}

#[tokio::test]
async fn form_without_file_field_is_rejected() {
    let app = TestApp::new();
    let body = multipart_body("photo", "a.jpg", "image/jpeg", b"data");
    let request = Request::builder()
        .method("POST")
        .uri("/api/photos")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file provided");
    assert_eq!(app.storage.inner.len().await, 0);
}

#[tokio::test]
async fn non_media_upload_is_unsupported() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(upload_request("menu.pdf", "application/pdf", b"%PDF"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(app.storage.inner.len().await, 0);
    assert!(list(&app).await.is_empty());
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = TestApp::with_config(Config {
        max_file_size: 8,
        ..test_config()
    });

    let response = app
        .router
        .clone()
        .oneshot(upload_request("big.jpg", "image/jpeg", b"more than eight bytes"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.storage.inner.len().await, 0);
}

#[tokio::test]
async fn failed_blob_write_creates_no_row() {
    let app = TestApp::new();
    app.storage.fail_put.store(true, Ordering::SeqCst);

    let response = app
        .router
        .clone()
        .oneshot(upload_request("a.jpg", "image/jpeg", b"data"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.metadata.inner.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_metadata_insert_removes_the_blob() {
    let app = TestApp::new();
    app.metadata.fail_insert.store(true, Ordering::SeqCst);

    let response = app
        .router
        .clone()
        .oneshot(upload_request("a.jpg", "image/jpeg", b"data"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.storage.inner.len().await, 0);
}

#[tokio::test]
async fn orphan_is_kept_when_cleanup_is_disabled() {
    let app = TestApp::with_config(Config {
        cleanup_orphans: false,
        ..test_config()
    });
    app.metadata.fail_insert.store(true, Ordering::SeqCst);

    let response = app
        .router
        .clone()
        .oneshot(upload_request("a.jpg", "image/jpeg", b"data"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.storage.inner.len().await, 1);
}

#[tokio::test]
async fn ids_and_keys_never_collide() {
    let app = TestApp::new();
    let mut ids = HashSet::new();
    let mut urls = HashSet::new();

    for i in 0..50 {
        let record = upload(&app, &format!("guest-{i}.png"), "image/png", b"png").await;
        assert!(ids.insert(record.id));
        assert!(urls.insert(record.url));
    }
    assert_eq!(app.storage.inner.len().await, 50);
}

// =============================================================================
// GET
// =============================================================================

#[tokio::test]
async fn list_is_newest_first() {
    let app = TestApp::new();
    let first = upload(&app, "1.jpg", "image/jpeg", b"1").await;
    let second = upload(&app, "2.mp4", "video/mp4", b"2").await;
    let third = upload(&app, "3.jpg", "image/jpeg", b"3").await;

    let photos = list(&app).await;
    let ids: Vec<_> = photos.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, [third.id.as_str(), second.id.as_str(), first.id.as_str()]);
    assert!(photos.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn list_on_fresh_sqlite_database_is_empty() {
    let metadata = SqliteMetadataStore::connect("sqlite::memory:").await.unwrap();
    let state = AppState::new(test_config(), std::sync::Arc::new(metadata), std::sync::Arc::new(MemoryStorage::new()));
    let router = build_router(state);

    let response = router.clone().oneshot(get_request("/api/photos")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));

    let response = router
        .clone()
        .oneshot(upload_request("a.jpg", "image/jpeg", b"a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router.oneshot(get_request("/api/photos")).await.unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

// =============================================================================
// DELETE
// =============================================================================

#[tokio::test]
async fn post_get_delete_get_round_trip() {
    let app = TestApp::new();
    let record = upload(&app, "cake.jpg", "image/jpeg", b"cake").await;

    let photos = list(&app).await;
    assert_eq!(photos.iter().filter(|p| p.id == record.id && p.url == record.url).count(), 1);

    let response = app
        .router
        .clone()
        .oneshot(delete_request(&record.id, Some(ADMIN_TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], record.id.as_str());
    assert_eq!(json["deleted"], true);
    assert_eq!(json["blob_deleted"], true);

    assert!(list(&app).await.is_empty());
    assert_eq!(app.storage.inner.len().await, 0);
}

#[tokio::test]
async fn deleting_unknown_id_is_not_found() {
    let app = TestApp::new();
    upload(&app, "a.jpg", "image/jpeg", b"a").await;

    let response = app
        .router
        .clone()
        .oneshot(delete_request("does-not-exist", Some(ADMIN_TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(list(&app).await.len(), 1);
}

#[tokio::test]
async fn delete_that_loses_a_race_is_not_found() {
    let app = TestApp::new();
    let record = upload(&app, "a.jpg", "image/jpeg", b"a").await;
    app.metadata.lose_delete_race.store(true, Ordering::SeqCst);

    let response = app
        .router
        .clone()
        .oneshot(delete_request(&record.id, Some(ADMIN_TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Photo not found");
    assert!(list(&app).await.is_empty());
}

#[tokio::test]
async fn delete_without_id_is_bad_request() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("DELETE")
        .uri("/api/photos/")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing photo id");
}

#[tokio::test]
async fn delete_requires_the_admin_token() {
    let app = TestApp::new();
    let record = upload(&app, "a.jpg", "image/jpeg", b"a").await;

    for token in [None, Some("guess"), Some("")] {
        let response = app
            .router
            .clone()
            .oneshot(delete_request(&record.id, token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "token {token:?}");
    }

    assert_eq!(list(&app).await.len(), 1);
    assert_eq!(app.storage.inner.len().await, 1);
}

#[tokio::test]
async fn delete_is_disabled_without_configured_token() {
    let app = TestApp::with_config(Config {
        admin_token: None,
        ..test_config()
    });
    let record = upload(&app, "a.jpg", "image/jpeg", b"a").await;

    let response = app
        .router
        .clone()
        .oneshot(delete_request(&record.id, Some(ADMIN_TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(list(&app).await.len(), 1);
}

#[tokio::test]
async fn row_is_removed_even_if_blob_delete_fails() {
    let app = TestApp::new();
    let record = upload(&app, "a.jpg", "image/jpeg", b"a").await;
    app.storage.fail_delete.store(true, Ordering::SeqCst);

    let response = app
        .router
        .clone()
        .oneshot(delete_request(&record.id, Some(ADMIN_TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["blob_deleted"], false);
    assert!(list(&app).await.is_empty());
    assert_eq!(app.storage.inner.len().await, 1);
}

// =============================================================================
// Blobs and health
// =============================================================================

#[tokio::test]
async fn blobs_are_served_with_their_content_type() {
    let app = TestApp::new();
    let record = upload(&app, "vows.mp4", "video/mp4", b"vows").await;
    let key = record.url.rsplit('/').next().unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/blobs/{key}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(&body_bytes(response).await[..], b"vows");
}

#[tokio::test]
async fn unknown_or_invalid_blob_keys_are_refused() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/blobs/missing.jpg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/blobs/.env"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_check_is_ok() {
    let app = TestApp::new();
    let response = app.router.clone().oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"OK");
}
