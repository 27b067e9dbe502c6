use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::RequireAdmin,
    error::AppError,
    models::{DeleteResponse, MediaType, PhotoRecord},
    state::AppState,
    storage::StorageError,
    utils::{
        is_accepted_media_type, is_valid_storage_key, key_from_url, public_url,
        resolve_content_type, storage_key,
    },
};

/// The `file` part of an upload form.
struct UploadedFile {
    data: Bytes,
    filename: Option<String>,
    content_type: Option<String>,
}

/// Body-limit hits surface as 413, everything else as a bad form.
fn multipart_error(err: MultipartError, context: &str) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the request size limit".into())
    } else {
        AppError::BadRequest(format!("{}: {}", context, err))
    }
}

/// Pull the first `file` field out of the form; other fields are ignored.
async fn read_file_field(mut multipart: Multipart) -> Result<Option<UploadedFile>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Error parsing multipart: {}", e);
        multipart_error(e, "Failed to parse multipart form")
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            error!("Error reading file bytes: {}", e);
            multipart_error(e, "Failed to read the file")
        })?;

        return Ok(Some(UploadedFile {
            data,
            filename,
            content_type,
        }));
    }

    Ok(None)
}

/// Ingest one photo or video sent as multipart/form-data field `file`.
pub async fn upload_photo(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<PhotoRecord>), AppError> {
    let multipart = multipart.map_err(|rejection| {
        warn!("Rejected upload: {}", rejection);
        AppError::BadRequest("Content-Type must be multipart/form-data".into())
    })?;

    let file = read_file_field(multipart)
        .await?
        .ok_or_else(|| AppError::BadRequest("No file provided".into()))?;

    let content_type = resolve_content_type(file.content_type.as_deref(), file.filename.as_deref());
    let size = file.data.len() as u64;

    info!(
        "Received file: {}, type: {}, size: {} bytes",
        file.filename.as_deref().unwrap_or("<unnamed>"),
        content_type,
        size
    );

    if size > state.config.max_file_size {
        error!(
            "File size {} exceeds maximum limit of {} bytes",
            size, state.config.max_file_size
        );
        return Err(AppError::PayloadTooLarge(format!(
            "File size {} exceeds maximum limit of {} bytes",
            size, state.config.max_file_size
        )));
    }

    if !is_accepted_media_type(&content_type) {
        return Err(AppError::UnsupportedMediaType(format!(
            "Only images and videos can be uploaded, got {}",
            content_type
        )));
    }

    let id = Uuid::new_v4().to_string();
    let key = storage_key(&id, file.filename.as_deref());

    // Blob first: if this fails no row is written.
    state
        .storage
        .put(&key, file.data, &content_type)
        .await
        .map_err(|e| {
            error!("Error storing blob {}: {}", key, e);
            AppError::InternalServerError("Failed to store file".into())
        })?;

    let record = PhotoRecord {
        url: public_url(&state.config.public_base_url, &key),
        created_at: state.clock.now_millis(),
        media_type: MediaType::from_content_type(&content_type),
        id,
    };

    if let Err(e) = state.metadata.insert(&record).await {
        error!("Failed to save metadata for {}: {}", record.id, e);
        if state.config.cleanup_orphans {
            match state.storage.delete(&key).await {
                Ok(()) => info!("Removed blob {} after failed metadata insert", key),
                Err(cleanup) => error!("Orphaned blob {}: cleanup failed: {}", key, cleanup),
            }
        } else {
            warn!("Orphaned blob {} left in storage", key);
        }
        return Err(AppError::InternalServerError(
            "Failed to save file metadata to database".into(),
        ));
    }

    info!("Photo uploaded: {} ({} bytes) -> {}", record.id, size, record.url);
    Ok((StatusCode::CREATED, Json(record)))
}

/// List every photo, most recent first.
pub async fn list_photos(State(state): State<AppState>) -> Result<Json<Vec<PhotoRecord>>, AppError> {
    let photos = state.metadata.list().await?;
    Ok(Json(photos))
}

/// Delete a photo's blob and metadata row.
pub async fn delete_photo(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::BadRequest("Missing photo id".into()));
    }

    let photo = state
        .metadata
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Photo not found".into()))?;

    let key = key_from_url(&photo.url);

    // A failed blob delete must not keep the row visible in listings.
    let blob_deleted = match state.storage.delete(key).await {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to delete blob {} for photo {}: {}", key, photo.id, e);
            false
        }
    };

    // Another request may have removed the row since `find`.
    if !state.metadata.delete(&photo.id).await? {
        warn!("Photo {} was deleted concurrently", photo.id);
        return Err(AppError::NotFound("Photo not found".into()));
    }

    info!("Photo deleted: {} (blob removed: {})", photo.id, blob_deleted);

    Ok(Json(DeleteResponse {
        id: photo.id,
        deleted: true,
        blob_deleted,
    }))
}

/// `DELETE /api/photos/` without an id.
pub async fn missing_photo_id() -> AppError {
    AppError::BadRequest("Missing photo id".into())
}

/// Serve a stored blob; public URLs of the local and memory backends point here.
pub async fn serve_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    if !is_valid_storage_key(&key) {
        return Err(AppError::BadRequest("Invalid blob key".into()));
    }

    let blob = state.storage.get(&key).await.map_err(|e| match e {
        StorageError::NotFound(_) => AppError::NotFound("Blob not found".into()),
        other => {
            error!("Error reading blob {}: {}", key, other);
            AppError::InternalServerError("Failed to read file".into())
        }
    })?;

    let content_type = header::HeaderValue::from_str(&blob.content_type)
        .unwrap_or_else(|_| header::HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CACHE_CONTROL,
                header::HeaderValue::from_static("public, max-age=31536000, immutable"),
            ),
        ],
        blob.content,
    )
        .into_response())
}

pub async fn health_check() -> &'static str {
    "OK"
}
