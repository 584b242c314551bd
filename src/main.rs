use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use intent_drift_radar::{
    analysis::{AnalyzeParams, EnsembleParams},
    config::{Config, LogFormat},
    error::AnalysisError,
    AppError, AppResult,
    gemini::GeminiClient,
    server::{AppState, McpServer, SharedState},
    storage::SqliteStorage,
};

#[derive(Parser)]
#[command(name = "intent-drift-radar")]
#[command(about = "Intent drift detection over day-labelled signals", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdio (default)
    Serve,

    /// Analyze a signals file once and print the JSON result
    Analyze {
        /// JSON file with `signals` and optional `settings`, `feedback`, `modes`
        #[arg(long, short)]
        input: PathBuf,

        /// Run the multi-level ensemble instead of a single call
        #[arg(long)]
        ensemble: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %config.gemini.model,
        location = %config.gemini.location,
        "Intent Drift Radar starting..."
    );

    if let Some(warning) = config.model_location_warning() {
        warn!("{}", warning);
    }

    let state = build_state(config).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(state).await,
        Commands::Analyze { input, ensemble } => {
            let exit_code = analyze_once(&state, &input, ensemble).await?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

/// Open storage and the Gemini client and assemble the shared state.
async fn build_state(config: Config) -> AppResult<SharedState> {
    let storage = SqliteStorage::new(&config.database).await.map_err(|e| {
        error!(error = %e, "Failed to initialize database");
        AppError::from(e)
    })?;
    info!(path = %config.database.path.display(), "Database initialized");

    let gemini = GeminiClient::new(&config.gemini, &config.request).map_err(|e| {
        error!(error = %e, "Failed to initialize Gemini client");
        AppError::from(e)
    })?;
    info!(base_url = %gemini.base_url(), "Gemini client initialized");

    if !gemini.has_api_key() {
        warn!("GEMINI_API_KEY is not set; analysis calls will fail with GEMINI_API_KEY_MISSING");
    }

    Ok(Arc::new(AppState::new(config, storage, Arc::new(gemini))))
}

async fn serve(state: SharedState) -> anyhow::Result<()> {
    let server = McpServer::new(state);

    info!("Server ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Run one analysis from a file. Prints the result or an error body and
/// returns the process exit code.
async fn analyze_once(state: &SharedState, input: &Path, ensemble: bool) -> anyhow::Result<i32> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read input file {}", input.display()))?;

    let outcome = if ensemble {
        match parse_input::<EnsembleParams>(&raw) {
            Ok(params) => state
                .ensemble
                .run(params)
                .await
                .map(|response| serde_json::to_value(response)),
            Err(e) => Err(e),
        }
    } else {
        match parse_input::<AnalyzeParams>(&raw) {
            Ok(params) => state
                .analyzer
                .analyze(params)
                .await
                .map(|result| serde_json::to_value(result)),
            Err(e) => Err(e),
        }
    };

    match outcome {
        Ok(value) => {
            let value: Value = value.context("Failed to serialize result")?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(0)
        }
        Err(e) => {
            error!(code = e.code(), error = %e, "Analysis failed");
            println!("{}", serde_json::to_string_pretty(&e.to_body())?);
            Ok(1)
        }
    }
}

fn parse_input<T: DeserializeOwned>(raw: &str) -> Result<T, AnalysisError> {
    serde_json::from_str(raw).map_err(|e| AnalysisError::invalid_request("input", e.to_string()))
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // stdout carries MCP traffic, so logs go to stderr.
    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
