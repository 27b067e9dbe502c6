//! Router assembly and the `serve` entry point.
//!
//! ## Routes
//! - `GET     /health`           liveness
//! - `GET     /api/photos`       list photos, newest first
//! - `POST    /api/photos`       ingest one file (multipart field `file`)
//! - `DELETE  /api/photos/{id}`  remove blob and row (admin token)
//! - `GET     /blobs/{key}`      serve a stored blob
//!
//! Every route answers `OPTIONS` with `204 No Content` and the CORS headers.

use std::{io::ErrorKind, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{Method, StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get},
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::Config,
    database::init_metadata,
    handlers::{
        delete_photo, health_check, list_photos, missing_photo_id, serve_blob, upload_photo,
    },
    state::AppState,
    storage::init_storage,
};

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86_400))
}

/// The CORS layer answers preflights itself with `200`; report them as `204`.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Build the application router around an already initialized state.
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/photos", get(list_photos).post(upload_photo))
        .route("/api/photos/", delete(missing_photo_id))
        .route("/api/photos/{id}", delete(delete_photo))
        .route("/blobs/{key}", get(serve_blob))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer())
        .layer(middleware::from_fn(preflight_no_content))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize backends from `config` and serve until the process is stopped.
pub async fn run(config: Config) -> Result<()> {
    if config.admin_token.is_none() {
        warn!("ADMIN_TOKEN is not set; deleting photos is disabled");
    }

    let metadata = init_metadata(&config).await?;
    let storage = init_storage(&config).await?;

    let addr = config.addr();
    let host = config.host.clone();
    let port = config.port;
    let app = build_router(AppState::new(config, metadata, storage));

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied && matches!(host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", port);
            warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr, err, fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
