use std::{env, str::FromStr};

use dotenvy::dotenv;
use thiserror::Error;
use validator::Validate;

/// Largest upload the service accepts by default (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value `{value}` for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Where photo metadata rows live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Sqlite,
    Memory,
}

impl FromStr for MetadataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(MetadataKind::Sqlite),
            "memory" => Ok(MetadataKind::Memory),
            other => Err(format!("expected `sqlite` or `memory`, got `{}`", other)),
        }
    }
}

/// Where uploaded blobs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    S3,
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "s3" => Ok(StorageKind::S3),
            "memory" => Ok(StorageKind::Memory),
            other => Err(format!("expected `local`, `s3` or `memory`, got `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub metadata_backend: MetadataKind,
    pub database_url: String,
    pub storage_backend: StorageKind,
    pub local_storage_dir: String,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub s3_bucket: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    /// Base URL blob keys are appended to when building public URLs.
    #[validate(url)]
    pub public_base_url: String,
    #[validate(range(min = 1, max = 104857600))] // Max 100MB
    pub max_file_size: u64,
    /// Shared secret for destructive operations. Deletes are refused when unset.
    pub admin_token: Option<String>,
    /// Delete the blob again when the metadata insert after it fails.
    pub cleanup_orphans: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            metadata_backend: MetadataKind::Sqlite,
            database_url: "sqlite://data/photos.db".to_string(),
            storage_backend: StorageKind::Local,
            local_storage_dir: "uploads".to_string(),
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            s3_bucket: "wedding-snaps".to_string(),
            s3_access_key: "minioadmin".to_string(),
            s3_secret_key: "minioadmin".to_string(),
            public_base_url: "http://localhost:3000/blobs".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            admin_token: None,
            cleanup_orphans: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load environment variables from `.env` file (if it exists)
        dotenv().ok();

        let defaults = Config::default();

        let config = Config {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT")?.unwrap_or(defaults.port),
            metadata_backend: parse_var("METADATA_BACKEND")?.unwrap_or(defaults.metadata_backend),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            storage_backend: parse_var("STORAGE_BACKEND")?.unwrap_or(defaults.storage_backend),
            local_storage_dir: env::var("LOCAL_STORAGE_DIR").unwrap_or(defaults.local_storage_dir),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            s3_region: env::var("S3_REGION").unwrap_or(defaults.s3_region),
            s3_bucket: env::var("S3_BUCKET").unwrap_or(defaults.s3_bucket),
            s3_access_key: env::var("S3_ACCESS_KEY").unwrap_or(defaults.s3_access_key),
            s3_secret_key: env::var("S3_SECRET_KEY").unwrap_or(defaults.s3_secret_key),
            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            max_file_size: parse_var("MAX_FILE_SIZE")?.unwrap_or(defaults.max_file_size),
            admin_token: env::var("ADMIN_TOKEN").ok().filter(|s| !s.is_empty()),
            cleanup_orphans: parse_var("CLEANUP_ORPHANS")?.unwrap_or(defaults.cleanup_orphans),
        };

        // Validate configuration values (e.g. file size range)
        config.validate()?;
        Ok(config)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                name,
                value,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
