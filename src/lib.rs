//! # Intent Drift Radar
//!
//! A Model Context Protocol (MCP) server that detects intent drift: a
//! material change between the goal a user started with and the goal their
//! latest day-labelled signals point to. The heavy lifting is delegated to
//! a Gemini reasoning model; this crate owns the orchestration around it.
//!
//! ## Features
//!
//! - **Prompt Builder**: fixed output contract, per-thinking-level directives,
//!   baseline/current windows and prior feedback
//! - **Model Caller**: one repair retry on invalid output, one fallback on a
//!   missing model, all under a single wall-clock budget
//! - **Validator & Guardrails**: JSON extraction, schema checks and
//!   idempotent normalization of signatures, directions and card refs
//! - **Ensemble**: parallel low/medium/high runs under one deadline folded
//!   into a deterministic consensus with an agreement report
//! - **Feedback**: append-only verdict storage in SQLite
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (Rust) → Gemini generateContent (HTTP)
//!                    ↓
//!              SQLite (feedback, invocations)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use intent_drift_radar::{Config, AppState, McpServer};
//! use intent_drift_radar::gemini::GeminiClient;
//! use intent_drift_radar::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let gemini = GeminiClient::new(&config.gemini, &config.request)?;
//!     let state = Arc::new(AppState::new(config, storage, Arc::new(gemini)));
//!     let server = McpServer::new(state);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Intent drift analysis: prompts, model calls, validation, guardrails, ensemble.
pub mod analysis;
/// Configuration management for the MCP server.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Gemini API client and the reasoning-model seam.
pub mod gemini;
/// Prompt text for the drift analysis contract.
pub mod prompts;
/// MCP server implementation and request handling.
pub mod server;
/// SQLite storage layer for persistence.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, McpServer, SharedState};
