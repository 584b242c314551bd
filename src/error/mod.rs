use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::EnsembleErrorItem;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Model client error: {0}")]
    Model(#[from] ModelError),
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Errors from the reasoning-model transport
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("GEMINI_API_KEY is not configured")]
    ApiKeyMissing,

    #[error("Model '{model}' not found")]
    NotFound { model: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Terminal outcomes of an analysis, each with a fixed public code.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("GEMINI_API_KEY is not set")]
    ApiKeyMissing,

    #[error("Model call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Model output invalid: {message}")]
    OutputInvalid { message: String },

    #[error("Model '{model}' unavailable: {message}")]
    ModelUnavailable { model: String, message: String },

    #[error("Upstream model error: {message}")]
    Upstream { message: String },

    #[error("Invalid request: {field} - {reason}")]
    InvalidRequest { field: String, reason: String },

    #[error("Demo result unavailable: {message}")]
    DemoUnavailable { message: String },

    #[error("Ensemble failed with {succeeded} successful run(s)")]
    EnsembleFailed {
        succeeded: usize,
        errors: Vec<EnsembleErrorItem>,
    },
}

/// Public `{code, message}` pair for a failed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Wire envelope: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

impl AnalysisError {
    /// Stable, enumerable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::ApiKeyMissing => "GEMINI_API_KEY_MISSING",
            AnalysisError::Timeout { .. } => "MODEL_TIMEOUT",
            AnalysisError::OutputInvalid { .. } => "MODEL_OUTPUT_INVALID",
            AnalysisError::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
            AnalysisError::Upstream { .. } => "MODEL_UPSTREAM_ERROR",
            AnalysisError::InvalidRequest { .. } => "INVALID_REQUEST",
            AnalysisError::EnsembleFailed { .. } => "MODEL_ENSEMBLE_FAILED",
            AnalysisError::DemoUnavailable { .. } => "DEMO_UNAVAILABLE",
        }
    }

    /// HTTP status an HTTP front end should use for this outcome.
    pub fn http_status(&self) -> u16 {
        match self {
            AnalysisError::ApiKeyMissing | AnalysisError::DemoUnavailable { .. } => 500,
            AnalysisError::Timeout { .. } => 504,
            AnalysisError::InvalidRequest { .. } => 400,
            AnalysisError::OutputInvalid { .. }
            | AnalysisError::ModelUnavailable { .. }
            | AnalysisError::Upstream { .. }
            | AnalysisError::EnsembleFailed { .. } => 502,
        }
    }

    /// User-facing message. Never carries provider error text.
    pub fn public_message(&self) -> String {
        match self {
            AnalysisError::ApiKeyMissing => {
                "GEMINI_API_KEY is not set in the runtime environment.".to_string()
            }
            AnalysisError::Timeout { .. } => "Gemini request timed out. Try again.".to_string(),
            AnalysisError::OutputInvalid { .. } => {
                "Model output did not match required JSON schema.".to_string()
            }
            AnalysisError::ModelUnavailable { .. } => {
                "Configured model is unavailable and no fallback model was found.".to_string()
            }
            AnalysisError::Upstream { .. } => "Gemini request failed.".to_string(),
            AnalysisError::InvalidRequest { field, reason } => {
                format!("Invalid request: {} - {}", field, reason)
            }
            AnalysisError::EnsembleFailed { .. } => {
                "Ensemble did not get enough successful runs (need at least 2).".to_string()
            }
            AnalysisError::DemoUnavailable { .. } => {
                "Demo result did not match schema.".to_string()
            }
        }
    }

    /// Structured body for callers.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.public_message(),
            },
        }
    }

    /// Shorthand for request validation failures.
    pub fn invalid_request(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidRequest {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<ModelError> for AnalysisError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::ApiKeyMissing => AnalysisError::ApiKeyMissing,
            ModelError::Timeout { timeout_ms } => AnalysisError::Timeout { timeout_ms },
            ModelError::NotFound { model } => AnalysisError::ModelUnavailable {
                message: format!("model '{}' not found", model),
                model,
            },
            other => AnalysisError::Upstream {
                message: other.to_string(),
            },
        }
    }
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Structured `{code, message}` body for a failed tool call.
    pub fn to_body(&self) -> ErrorBody {
        let (code, message) = match self {
            McpError::Analysis(e) => return e.to_body(),
            McpError::InvalidParameters { message, .. } => {
                ("INVALID_REQUEST", format!("Invalid request: {}", message))
            }
            McpError::UnknownTool { tool_name } => {
                ("UNKNOWN_TOOL", format!("Unknown tool: {}", tool_name))
            }
            McpError::ExecutionFailed { .. } | McpError::Json(_) => {
                ("INTERNAL_ERROR", "Tool execution failed.".to_string())
            }
        };

        ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        }
    }
}

impl From<StorageError> for McpError {
    fn from(err: StorageError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for model transport operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type alias for analysis operations
pub type AnalysisOutcome<T> = Result<T, AnalysisError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
