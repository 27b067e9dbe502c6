use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
};
use tracing::{info, warn};

use super::{MetadataError, MetadataStore};
use crate::models::{MediaType, PhotoRecord};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS photos (
        id TEXT PRIMARY KEY,
        url TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        type TEXT NOT NULL
    )
"#;

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_photos_created_at ON photos (created_at DESC)";

/// Metadata rows in an SQLite database.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Connect to `database_url`, creating the database file if needed.
    ///
    /// The `photos` table itself is created lazily, when an insert or list
    /// finds it missing.
    pub async fn connect(database_url: &str) -> Result<Self, MetadataError> {
        info!("Connecting to database...");

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let in_memory = database_url.contains(":memory:");

        if !in_memory {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| MetadataError::Unavailable(e.to_string()))?;
                }
            }
        }

        // Every connection to `:memory:` is its own database, so keep exactly one alive.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        info!("Database connection established");
        Ok(Self { pool })
    }

    async fn ensure_schema(&self) -> Result<(), MetadataError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

fn is_missing_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().contains("no such table"),
        _ => false,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

async fn insert_row(pool: &SqlitePool, record: &PhotoRecord) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO photos (id, url, created_at, type) VALUES (?, ?, ?, ?)")
        .bind(&record.id)
        .bind(&record.url)
        .bind(record.created_at)
        .bind(record.media_type.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

fn record_from_row(row: &SqliteRow) -> Result<PhotoRecord, MetadataError> {
    let id: String = row.try_get("id")?;
    let media_type: String = row.try_get("type")?;
    let media_type = media_type
        .parse::<MediaType>()
        .map_err(|reason| MetadataError::CorruptRow {
            id: id.clone(),
            reason,
        })?;

    Ok(PhotoRecord {
        url: row.try_get("url")?,
        created_at: row.try_get("created_at")?,
        media_type,
        id,
    })
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert(&self, record: &PhotoRecord) -> Result<(), MetadataError> {
        let result = match insert_row(&self.pool, record).await {
            Err(e) if is_missing_table(&e) => {
                info!("Creating photos table");
                self.ensure_schema().await?;
                insert_row(&self.pool, record).await
            }
            other => other,
        };

        result.map_err(|e| {
            if is_unique_violation(&e) {
                MetadataError::Duplicate(record.id.clone())
            } else {
                MetadataError::Database(e)
            }
        })
    }

    async fn list(&self) -> Result<Vec<PhotoRecord>, MetadataError> {
        let rows = match sqlx::query(
            "SELECT id, url, created_at, type FROM photos ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        {
            Ok(rows) => rows,
            Err(e) if is_missing_table(&e) => {
                warn!("photos table missing; creating it and returning no records");
                self.ensure_schema().await?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        rows.iter().map(record_from_row).collect()
    }

    async fn find(&self, id: &str) -> Result<Option<PhotoRecord>, MetadataError> {
        let row = match sqlx::query("SELECT id, url, created_at, type FROM photos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row,
            Err(e) if is_missing_table(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        row.as_ref().map(record_from_row).transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool, MetadataError> {
        let result = match sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(result) => result,
            Err(e) if is_missing_table(&e) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        Ok(result.rows_affected() > 0)
    }
}
