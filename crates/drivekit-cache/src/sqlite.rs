//! SQLite-backed cache.
//!
//! Records are stored as serialized JSON keyed by id; sessions get an
//! autoincrement local id so the account picker can address them. Schema is
//! created on connect, no migration history is kept for a disposable cache.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use async_trait::async_trait;
use drivekit_core::models::{FileRecord, SessionRecord};
use drivekit_core::{AppError, ClientConfig};

use crate::backend::CacheBackend;

fn db_err(err: sqlx::Error) -> AppError {
    AppError::Cache(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// SQLite cache repository.
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Connect and create the schema.
    ///
    /// The pool is capped at `cache_max_connections`; an in-memory database
    /// needs exactly one connection or each acquire would see a fresh empty
    /// database.
    pub async fn connect(config: &ClientConfig) -> Result<Self, AppError> {
        tracing::info!(url = %config.cache_database_url, "Opening local cache");

        let options = SqliteConnectOptions::from_str(&config.cache_database_url)
            .map_err(db_err)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.cache_max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let cache = Self { pool };
        cache.create_schema().await?;
        Ok(cache)
    }

    async fn create_schema(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS media (
                id TEXT PRIMARY KEY,
                record TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                local_id INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                email TEXT NOT NULL,
                avatar TEXT,
                token TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    fn session_from_row(row: &SqliteRow) -> Result<SessionRecord, AppError> {
        Ok(SessionRecord {
            local_id: Some(row.try_get("local_id").map_err(db_err)?),
            id: row.try_get("id").map_err(db_err)?,
            email: row.try_get("email").map_err(db_err)?,
            avatar: row.try_get("avatar").map_err(db_err)?,
            token: row.try_get("token").map_err(db_err)?,
        })
    }
}

#[async_trait]
impl CacheBackend for SqliteCache {
    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select", db.record_id = %id))]
    async fn get_media(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query("SELECT record FROM media WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("record").map_err(db_err)?;
                let record = serde_json::from_str(&raw)
                    .map_err(|e| AppError::Cache(format!("corrupt media row {}: {}", id, e)))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "media", db.operation = "insert", db.record_id = %record.id))]
    async fn put_media(&self, record: &FileRecord) -> Result<(), AppError> {
        let raw = serde_json::to_string(record)
            .map_err(|e| AppError::Cache(format!("serialize media {}: {}", record.id, e)))?;

        sqlx::query("INSERT INTO media (id, record) VALUES ($1, $2)")
            .bind(record.id.to_string())
            .bind(raw)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Cache(format!("media {} already cached", record.id))
                } else {
                    db_err(e)
                }
            })?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "delete", db.record_id = %id))]
    async fn delete_media(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "delete"))]
    async fn clear_media(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM media")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "sessions", db.operation = "select"))]
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT local_id, id, email, avatar, token FROM sessions ORDER BY local_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::session_from_row).collect()
    }

    #[tracing::instrument(skip(self, session), fields(db.table = "sessions", db.operation = "insert"))]
    async fn put_session(&self, session: &SessionRecord) -> Result<SessionRecord, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO sessions (id, email, avatar, token)
            VALUES ($1, $2, $3, $4)
            RETURNING local_id, id, email, avatar, token
            "#,
        )
        .bind(&session.id)
        .bind(&session.email)
        .bind(&session.avatar)
        .bind(&session.token)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Self::session_from_row(&row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "sessions", db.operation = "delete"))]
    async fn delete_session(&self, local_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE local_id = $1")
            .bind(local_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM media")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM sessions")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        tracing::debug!("Local cache cleared");
        Ok(())
    }
}
