//! Storage layer for feedback and invocation history.
//!
//! Feedback is append-only. Invocations record every analysis tool call for
//! debugging and replay.

mod sqlite;


pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::FeedbackItem;
use crate::error::StorageResult;

/// Invocation log entry for debugging and tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Unique invocation identifier.
    pub id: String,
    /// Analysis the invocation produced or attempted.
    pub analysis_id: Option<String>,
    /// Name of the MCP tool invoked.
    pub tool_name: String,
    /// Model that answered, after any fallback.
    pub model: Option<String>,
    /// Input parameters as JSON.
    pub input: serde_json::Value,
    /// Output result as JSON (if successful).
    pub output: Option<serde_json::Value>,
    /// Latency in milliseconds.
    pub latency_ms: Option<i64>,
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Public error code (if failed).
    pub error_code: Option<String>,
    /// When the invocation occurred.
    pub created_at: DateTime<Utc>,
}

impl Invocation {
    /// Create a new invocation log entry
    pub fn new(tool_name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            analysis_id: None,
            tool_name: tool_name.into(),
            model: None,
            input,
            output: None,
            latency_ms: None,
            success: true,
            error_code: None,
            created_at: Utc::now(),
        }
    }

    /// Set the analysis ID
    pub fn with_analysis(mut self, analysis_id: impl ToString) -> Self {
        self.analysis_id = Some(analysis_id.to_string());
        self
    }

    /// Set the model that answered
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Mark as successful with output
    pub fn success(mut self, output: serde_json::Value, latency_ms: i64) -> Self {
        self.success = true;
        self.output = Some(output);
        self.latency_ms = Some(latency_ms);
        self
    }

    /// Mark as failed with a public error code
    pub fn failure(mut self, error_code: impl Into<String>, latency_ms: i64) -> Self {
        self.success = false;
        self.error_code = Some(error_code.into());
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Persistence operations used by the analysis core and the server.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Append one feedback item.
    async fn append_feedback(&self, item: &FeedbackItem) -> StorageResult<()>;

    /// Feedback in insertion order, optionally for a single analysis.
    async fn list_feedback(&self, analysis_id: Option<Uuid>) -> StorageResult<Vec<FeedbackItem>>;

    /// Log a tool invocation for debugging.
    async fn log_invocation(&self, invocation: &Invocation) -> StorageResult<()>;

    /// Most recent invocations first.
    async fn list_invocations(&self, limit: u32) -> StorageResult<Vec<Invocation>>;
}
