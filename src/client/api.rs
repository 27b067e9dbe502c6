use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::{StatusCode, multipart};
use serde::Deserialize;
use thiserror::Error;

use super::LocalFile;
use crate::models::{DeleteResponse, PhotoRecord};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Server responded {status}: {message}")]
    Api { status: u16, message: String },

    #[error("{name} is {size} bytes; the limit is {limit} bytes")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("Invalid API URL {0}")]
    InvalidUrl(String),
}

/// Operations the client needs from the ingestion endpoint.
#[async_trait]
pub trait PhotoApi: Send + Sync {
    async fn upload(&self, file: &LocalFile) -> Result<PhotoRecord, ClientError>;

    async fn list(&self) -> Result<Vec<PhotoRecord>, ClientError>;

    async fn delete(&self, id: &str) -> Result<DeleteResponse, ClientError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`PhotoApi`] over HTTP. No timeouts or retries beyond reqwest's defaults.
#[derive(Clone)]
pub struct HttpPhotoApi {
    client: reqwest::Client,
    base_url: String,
    admin_token: Option<String>,
}

impl HttpPhotoApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_token: None,
        }
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    fn photos_url(&self) -> String {
        format!("{}/api/photos", self.base_url)
    }

    /// `{base}/api/photos/{id}` with the id encoded as a single path segment.
    fn photo_url(&self, id: &str) -> Result<reqwest::Url, ClientError> {
        let photos_url = self.photos_url();
        let mut url = reqwest::Url::parse(&photos_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", photos_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(photos_url.clone()))?
            .push(id);
        Ok(url)
    }

    /// Turn a non-success response into [`ClientError::Api`].
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or_else(|_| {
                if text.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                } else {
                    text
                }
            });

        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PhotoApi for HttpPhotoApi {
    async fn upload(&self, file: &LocalFile) -> Result<PhotoRecord, ClientError> {
        let bytes = tokio::fs::read(&file.path).await.map_err(|source| ClientError::Io {
            path: file.path.clone(),
            source,
        })?;

        let part = multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;
        let form = multipart::Form::new().part("file", part);

        let response = self.client.post(self.photos_url()).multipart(form).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<PhotoRecord>().await?)
    }

    async fn list(&self) -> Result<Vec<PhotoRecord>, ClientError> {
        let response = self.client.get(self.photos_url()).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<Vec<PhotoRecord>>().await?)
    }

    async fn delete(&self, id: &str) -> Result<DeleteResponse, ClientError> {
        let mut request = self.client.delete(self.photo_url(id)?);
        if let Some(token) = &self.admin_token {
            request = request.bearer_auth(token);
        }

        let response = Self::check(request.send().await?).await?;
        Ok(response.json::<DeleteResponse>().await?)
    }
}

impl ClientError {
    /// Whether the server reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }
}
