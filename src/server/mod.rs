//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;

use crate::analysis::{DriftAnalyzer, EnsembleOrchestrator, ModelCaller};
use crate::config::Config;
use crate::gemini::ReasoningModel;
use crate::storage::SqliteStorage;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend.
    pub storage: SqliteStorage,
    /// Single-call analysis.
    pub analyzer: DriftAnalyzer,
    /// Multi-level ensemble analysis.
    pub ensemble: EnsembleOrchestrator,
}

impl AppState {
    /// Create new application state around a reasoning model.
    pub fn new(config: Config, storage: SqliteStorage, model: Arc<dyn ReasoningModel>) -> Self {
        tracing::info!(
            model = %config.gemini.model,
            analyze_timeout_ms = config.request.analyze_timeout_ms,
            ensemble_deadline_ms = config.request.ensemble_deadline_ms,
            "AppState initializing"
        );

        let caller = ModelCaller::new(model, config.gemini.model.clone());
        let analyzer = DriftAnalyzer::new(caller.clone(), storage.clone(), &config.request);
        let ensemble = EnsembleOrchestrator::new(caller, storage.clone(), &config.request);

        Self {
            config,
            storage,
            analyzer,
            ensemble,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
