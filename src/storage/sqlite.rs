use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Invocation, Storage};
use crate::analysis::{FeedbackItem, Verdict};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone, Debug)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        Self::connect(pool_options, options).await
    }

    /// In-memory database on a single connection, for tests and one-shot runs
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                StorageError::Connection {
                    message: format!("Invalid database URL: {}", e),
                }
            })?;

        // The database lives and dies with its one connection.
        let pool_options = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
        Self::connect(pool_options, options).await
    }

    async fn connect(
        pool_options: SqlitePoolOptions,
        options: SqliteConnectOptions,
    ) -> StorageResult<Self> {
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn append_feedback(&self, item: &FeedbackItem) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO feedback (id, analysis_id, verdict, comment, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(item.analysis_id.to_string())
        .bind(item.verdict.as_str())
        .bind(&item.comment)
        .bind(item.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_feedback(&self, analysis_id: Option<Uuid>) -> StorageResult<Vec<FeedbackItem>> {
        let rows: Vec<FeedbackRow> = match analysis_id {
            Some(id) => {
                sqlx::query_as(
                    r#"
                    SELECT analysis_id, verdict, comment, created_at
                    FROM feedback
                    WHERE analysis_id = ?
                    ORDER BY rowid ASC
                    "#,
                )
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT analysis_id, verdict, comment, created_at
                    FROM feedback
                    ORDER BY rowid ASC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().filter_map(FeedbackRow::into_item).collect())
    }

    async fn log_invocation(&self, invocation: &Invocation) -> StorageResult<()> {
        let input = serde_json::to_string(&invocation.input).unwrap_or_default();
        let output = invocation
            .output
            .as_ref()
            .map(|o| serde_json::to_string(o).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO invocations (id, analysis_id, tool_name, model, input, output, latency_ms, success, error_code, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invocation.id)
        .bind(&invocation.analysis_id)
        .bind(&invocation.tool_name)
        .bind(&invocation.model)
        .bind(&input)
        .bind(&output)
        .bind(invocation.latency_ms)
        .bind(invocation.success)
        .bind(&invocation.error_code)
        .bind(invocation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_invocations(&self, limit: u32) -> StorageResult<Vec<Invocation>> {
        let rows: Vec<InvocationRow> = sqlx::query_as(
            r#"
            SELECT id, analysis_id, tool_name, model, input, output, latency_ms, success, error_code, created_at
            FROM invocations
            ORDER BY rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct FeedbackRow {
    analysis_id: String,
    verdict: String,
    comment: Option<String>,
    created_at: String,
}

impl FeedbackRow {
    /// Rows with an unparseable id or verdict are skipped.
    fn into_item(self) -> Option<FeedbackItem> {
        let analysis_id = match Uuid::parse_str(&self.analysis_id) {
            Ok(id) => id,
            Err(e) => {
                warn!(analysis_id = %self.analysis_id, error = %e, "Skipping feedback row with invalid id");
                return None;
            }
        };
        let verdict = match self.verdict.parse::<Verdict>() {
            Ok(v) => v,
            Err(e) => {
                warn!(verdict = %self.verdict, error = %e, "Skipping feedback row with invalid verdict");
                return None;
            }
        };

        Some(FeedbackItem {
            analysis_id,
            verdict,
            comment: self.comment,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct InvocationRow {
    id: String,
    analysis_id: Option<String>,
    tool_name: String,
    model: Option<String>,
    input: String,
    output: Option<String>,
    latency_ms: Option<i64>,
    success: bool,
    error_code: Option<String>,
    created_at: String,
}

impl From<InvocationRow> for Invocation {
    fn from(row: InvocationRow) -> Self {
        Self {
            id: row.id,
            analysis_id: row.analysis_id,
            tool_name: row.tool_name,
            model: row.model,
            input: serde_json::from_str(&row.input).unwrap_or_default(),
            output: row.output.and_then(|s| serde_json::from_str(&s).ok()),
            latency_ms: row.latency_ms,
            success: row.success,
            error_code: row.error_code,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}
