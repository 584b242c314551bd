use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{SharedState, PROTOCOL_VERSION, SERVER_NAME};
use crate::analysis::{
    demo, AnalyzeParams, EnsembleParams, FeedbackItem, Verdict, ANALYZE_TOOL, ENSEMBLE_TOOL,
};
use crate::error::{McpError, McpResult};
use crate::storage::Storage;

/// Tool name for recording a verdict on a past analysis.
pub const FEEDBACK_SUBMIT_TOOL: &str = "drift_feedback_submit";

/// Tool name for listing stored feedback.
pub const FEEDBACK_LIST_TOOL: &str = "drift_feedback_list";

/// Tool name for the bundled sample analysis.
pub const DEMO_TOOL: &str = "drift_demo";

/// Tool name for build and model information.
pub const VERSION_TOOL: &str = "drift_version";

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        ANALYZE_TOOL => handle_analyze(state, arguments).await,
        ENSEMBLE_TOOL => handle_analyze_ensemble(state, arguments).await,
        FEEDBACK_SUBMIT_TOOL => handle_feedback_submit(state, arguments).await,
        FEEDBACK_LIST_TOOL => handle_feedback_list(state, arguments).await,
        DEMO_TOOL => handle_demo(),
        VERSION_TOOL => handle_version(state),
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

// ============================================================================
// Analysis handlers
// ============================================================================

/// Arguments of `drift_analyze`.
#[derive(Debug, Deserialize)]
struct AnalyzeToolParams {
    #[serde(flatten)]
    params: AnalyzeParams,
    /// Feed stored feedback into the prompt when none is supplied.
    #[serde(default)]
    use_stored_feedback: bool,
}

/// Arguments of `drift_analyze_ensemble`.
#[derive(Debug, Deserialize)]
struct EnsembleToolParams {
    #[serde(flatten)]
    params: EnsembleParams,
    #[serde(default)]
    use_stored_feedback: bool,
}

/// Handle drift_analyze tool call
async fn handle_analyze(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let AnalyzeToolParams {
        mut params,
        use_stored_feedback,
    } = parse_arguments(ANALYZE_TOOL, arguments)?;

    if use_stored_feedback && params.feedback.is_empty() {
        params.feedback = state.storage.list_feedback(None).await?;
    }

    let result = state.analyzer.analyze(params).await?;
    serde_json::to_value(result).map_err(McpError::Json)
}

/// Handle drift_analyze_ensemble tool call
async fn handle_analyze_ensemble(
    state: &SharedState,
    arguments: Option<Value>,
) -> McpResult<Value> {
    let EnsembleToolParams {
        mut params,
        use_stored_feedback,
    } = parse_arguments(ENSEMBLE_TOOL, arguments)?;

    if use_stored_feedback && params.feedback.is_empty() {
        params.feedback = state.storage.list_feedback(None).await?;
    }

    let response = state.ensemble.run(params).await?;
    serde_json::to_value(response).map_err(McpError::Json)
}

// ============================================================================
// Feedback handlers
// ============================================================================

/// Arguments of `drift_feedback_submit`.
#[derive(Debug, Deserialize)]
struct FeedbackSubmitParams {
    analysis_id: Uuid,
    verdict: Verdict,
    #[serde(default)]
    comment: Option<String>,
}

/// Arguments of `drift_feedback_list`.
#[derive(Debug, Default, Deserialize)]
struct FeedbackListParams {
    #[serde(default)]
    analysis_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct FeedbackSubmitResponse {
    ok: bool,
    saved: bool,
    feedback: FeedbackItem,
}

#[derive(Debug, Serialize)]
struct FeedbackListResponse {
    feedback: Vec<FeedbackItem>,
}

/// Handle drift_feedback_submit tool call
async fn handle_feedback_submit(
    state: &SharedState,
    arguments: Option<Value>,
) -> McpResult<Value> {
    let params: FeedbackSubmitParams = parse_arguments(FEEDBACK_SUBMIT_TOOL, arguments)?;

    let mut item = FeedbackItem::new(params.analysis_id, params.verdict);
    if let Some(comment) = params.comment.filter(|c| !c.trim().is_empty()) {
        item = item.with_comment(comment);
    }

    state.storage.append_feedback(&item).await?;

    info!(
        analysis_id = %item.analysis_id,
        verdict = item.verdict.as_str(),
        "Feedback recorded"
    );

    serde_json::to_value(FeedbackSubmitResponse {
        ok: true,
        saved: true,
        feedback: item,
    })
    .map_err(McpError::Json)
}

/// Handle drift_feedback_list tool call
async fn handle_feedback_list(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    // No arguments lists everything.
    let params: FeedbackListParams = match arguments {
        Some(args) => parse_arguments(FEEDBACK_LIST_TOOL, Some(args))?,
        None => FeedbackListParams::default(),
    };

    let feedback = state.storage.list_feedback(params.analysis_id).await?;
    serde_json::to_value(FeedbackListResponse { feedback }).map_err(McpError::Json)
}

// ============================================================================
// Demo and version handlers
// ============================================================================

/// Server identity and the model it is configured for.
#[derive(Debug, Serialize)]
struct VersionResponse {
    service_name: &'static str,
    version: &'static str,
    protocol_version: &'static str,
    gemini_model: String,
}

/// Handle drift_demo tool call. Arguments are ignored.
fn handle_demo() -> McpResult<Value> {
    let result = demo::demo_result()?;
    serde_json::to_value(result).map_err(McpError::Json)
}

/// Handle drift_version tool call
fn handle_version(state: &SharedState) -> McpResult<Value> {
    serde_json::to_value(VersionResponse {
        service_name: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
        protocol_version: PROTOCOL_VERSION,
        gemini_model: state.config.gemini.model.clone(),
    })
    .map_err(McpError::Json)
}

// ============================================================================
// Helper functions
// ============================================================================

/// Helper to parse arguments with consistent error handling
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}
