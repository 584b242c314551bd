use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

/// Default model identifier used when `GEMINI_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
}

/// Gemini API configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key; `None` is reported per call as `GEMINI_API_KEY_MISSING`.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Informational only, the Gemini API endpoint is global.
    pub location: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Model call budgets and generation settings
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Wall-clock budget for a single analyze call.
    pub analyze_timeout_ms: u64,
    /// Wall-clock budget for each call inside an ensemble.
    pub ensemble_call_timeout_ms: u64,
    /// Overall ensemble deadline; supersedes the per-call budget.
    pub ensemble_deadline_ms: u64,
    pub temperature: f64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let gemini = GeminiConfig {
            api_key: env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            location: env::var("GEMINI_LOCATION").unwrap_or_else(|_| "global".to_string()),
        };

        if gemini.model.trim().is_empty() {
            return Err(AppError::Config {
                message: "GEMINI_MODEL cannot be empty".to_string(),
            });
        }

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/drift.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = RequestConfig::default();
        let request = RequestConfig {
            analyze_timeout_ms: parse_env("ANALYZE_TIMEOUT_MS", defaults.analyze_timeout_ms),
            ensemble_call_timeout_ms: parse_env(
                "ENSEMBLE_CALL_TIMEOUT_MS",
                defaults.ensemble_call_timeout_ms,
            ),
            ensemble_deadline_ms: parse_env("ENSEMBLE_DEADLINE_MS", defaults.ensemble_deadline_ms),
            temperature: parse_env("MODEL_TEMPERATURE", defaults.temperature),
        };

        Ok(Config {
            gemini,
            database,
            logging,
            request,
        })
    }

    /// Warning for a preview model configured with a regional location.
    ///
    /// Preview models are served from the global endpoint only; a regional
    /// location usually ends in 404s that look like a missing model.
    pub fn model_location_warning(&self) -> Option<String> {
        let model = self.gemini.model.to_lowercase();
        let location = self.gemini.location.to_lowercase();
        if model.contains("preview") && location != "global" {
            Some(format!(
                "Preview model '{}' configured with location '{}'; preview models are global-only, set GEMINI_LOCATION=global",
                self.gemini.model, self.gemini.location
            ))
        } else {
            None
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl RequestConfig {
    /// Budget for a single analyze call.
    pub fn analyze_timeout(&self) -> Duration {
        Duration::from_millis(self.analyze_timeout_ms)
    }

    /// Budget for one call inside an ensemble.
    pub fn ensemble_call_timeout(&self) -> Duration {
        Duration::from_millis(self.ensemble_call_timeout_ms)
    }

    /// Overall ensemble deadline.
    pub fn ensemble_deadline(&self) -> Duration {
        Duration::from_millis(self.ensemble_deadline_ms)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            analyze_timeout_ms: 25_000,
            ensemble_call_timeout_ms: 50_000,
            ensemble_deadline_ms: 90_000,
            temperature: 0.1,
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: DEFAULT_MODEL.to_string(),
            location: "global".to_string(),
        }
    }
}
