//! MCP over stdio: JSON-RPC 2.0 framing, the handshake, and tool dispatch.
//!
//! One request per line on stdin, one response per line on stdout.
//! Requests without an `id` are notifications and never get a response.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use super::{
    handle_tool_call, SharedState, DEMO_TOOL, FEEDBACK_LIST_TOOL, FEEDBACK_SUBMIT_TOOL,
    VERSION_TOOL,
};
use crate::analysis::{ANALYZE_TOOL, ENSEMBLE_TOOL};
use crate::error::McpError;

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// MCP protocol revision spoken by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name reported in `serverInfo` and by the version tool.
pub const SERVER_NAME: &str = "intent-drift-radar";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

/// Incoming JSON-RPC message.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent for notifications.
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Outgoing JSON-RPC message. Exactly one of `result` and `error` is set.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// `null` when the request id could not be read.
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// Protocol-level failure. Tool failures are reported inside a result instead.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

/// `serverInfo` of the initialize result.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Capabilities advertised during the handshake.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub tools: ToolCapabilities,
}

#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// The tool list is fixed for the life of the process.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Reply to `initialize`.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: Capabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Entry of the `tools/list` catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// `params` of a `tools/call` request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// One text block of a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Reply to `tools/call`.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolResultContent>,
    /// Set only for failed tool calls.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

impl ToolCallResult {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolResultContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error: is_error.then_some(true),
        }
    }
}

/// MCP server bound to the process's stdin and stdout.
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Serve requests until stdin closes.
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Intent Drift Radar MCP server starting...");

        let mut reader = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                info!("EOF received, shutting down");
                return Ok(());
            }

            let message = line.trim();
            if message.is_empty() {
                continue;
            }
            debug!(request = %message, "Received request");

            let response = match serde_json::from_str::<JsonRpcRequest>(message) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    Some(JsonRpcResponse::error(
                        None,
                        PARSE_ERROR,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            let Some(response) = response else {
                continue;
            };

            let mut encoded = serde_json::to_string(&response)?;
            debug!(response = %encoded, "Sending response");
            encoded.push('\n');
            stdout.write_all(encoded.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    /// Answer one message; `None` for notifications.
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification received");
            return None;
        };
        let id = Some(id);

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tool_call(id, request.params).await,
            method => {
                warn!(method = %method, "Unknown method");
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
            }
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling initialize request");

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: Capabilities {
                tools: ToolCapabilities {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        respond(id, result)
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling tools/list request");
        JsonRpcResponse::success(id, json!({ "tools": tool_definitions() }))
    }

    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params = match params.map(serde_json::from_value::<ToolCallParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e))
            }
            None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params"),
        };

        info!(tool = %params.name, "Handling tool call");

        let result = match handle_tool_call(&self.state, &params.name, params.arguments).await {
            Ok(value) => ToolCallResult::text(
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
                false,
            ),
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool call failed");
                ToolCallResult::text(error_text(&e), true)
            }
        };
        respond(id, result)
    }
}

/// Serialize `result` into a success response, or an internal error.
fn respond(id: Option<Value>, result: impl Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => {
            error!(error = %e, "Failed to serialize result");
            JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Internal error: {}", e))
        }
    }
}

/// Render a tool failure as its `{"error": {"code", "message"}}` body.
fn error_text(err: &McpError) -> String {
    let body = err.to_body();
    serde_json::to_string_pretty(&body).unwrap_or_else(|_| format!("Error: {}", err))
}

/// Every tool this server exposes, in listing order.
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        get_analyze_tool(),
        get_analyze_ensemble_tool(),
        get_feedback_submit_tool(),
        get_feedback_list_tool(),
        get_demo_tool(),
        get_version_tool(),
    ]
}

fn signals_schema() -> Value {
    serde_json::json!({
        "type": "array",
        "minItems": 1,
        "description": "Day-labelled signals in chronological order",
        "items": {
            "type": "object",
            "properties": {
                "day": {
                    "type": "string",
                    "description": "Day label, e.g. \"Day 3\""
                },
                "type": {
                    "type": "string",
                    "enum": ["declaration", "research", "action", "question"]
                },
                "content": {
                    "type": "string",
                    "description": "What the user said or did"
                }
            },
            "required": ["day", "type", "content"]
        }
    })
}

fn settings_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "baseline_window_size": {
                "type": "integer",
                "minimum": 1,
                "default": 2,
                "description": "Number of earliest signals anchoring the baseline intent"
            },
            "current_window_size": {
                "type": "integer",
                "minimum": 1,
                "default": 2,
                "description": "Number of latest signals anchoring the current intent"
            },
            "thinking_level": {
                "type": "string",
                "enum": ["low", "medium", "high"],
                "default": "medium"
            }
        }
    })
}

fn feedback_schema() -> Value {
    serde_json::json!({
        "type": "array",
        "description": "Prior verdicts to take into account",
        "items": {
            "type": "object",
            "properties": {
                "analysis_id": { "type": "string", "format": "uuid" },
                "verdict": { "type": "string", "enum": ["confirm", "reject"] },
                "comment": { "type": "string" },
                "created_at": { "type": "string", "format": "date-time" }
            },
            "required": ["analysis_id", "verdict"]
        }
    })
}

/// Get the single-call analysis tool definition
fn get_analyze_tool() -> Tool {
    Tool {
        name: ANALYZE_TOOL.to_string(),
        description: "Detect intent drift across day-labelled signals. Returns baseline and current intent, evidence, five reasoning cards and a machine-readable drift signature.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "signals": signals_schema(),
                "settings": settings_schema(),
                "feedback": feedback_schema(),
                "use_stored_feedback": {
                    "type": "boolean",
                    "default": false,
                    "description": "Use stored feedback when no feedback is supplied"
                }
            },
            "required": ["signals"],
            "additionalProperties": false
        }),
    }
}

/// Get the ensemble analysis tool definition
fn get_analyze_ensemble_tool() -> Tool {
    Tool {
        name: ENSEMBLE_TOOL.to_string(),
        description: "Run drift analysis at several thinking levels in parallel and return every analysis, a deterministic consensus and an agreement report. Needs at least 2 successful runs.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "signals": signals_schema(),
                "modes": {
                    "type": "array",
                    "items": { "type": "string", "enum": ["low", "medium", "high"] },
                    "minItems": 2,
                    "description": "Thinking levels to run (default: all three)"
                },
                "settings": settings_schema(),
                "feedback": feedback_schema(),
                "use_stored_feedback": {
                    "type": "boolean",
                    "default": false,
                    "description": "Use stored feedback when no feedback is supplied"
                }
            },
            "required": ["signals"],
            "additionalProperties": false
        }),
    }
}

/// Get the feedback submission tool definition
fn get_feedback_submit_tool() -> Tool {
    Tool {
        name: FEEDBACK_SUBMIT_TOOL.to_string(),
        description: "Record whether a past analysis was right (confirm) or wrong (reject).".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "analysis_id": {
                    "type": "string",
                    "format": "uuid",
                    "description": "ID of the analysis being judged"
                },
                "verdict": {
                    "type": "string",
                    "enum": ["confirm", "reject"]
                },
                "comment": {
                    "type": "string",
                    "description": "Optional free-text comment"
                }
            },
            "required": ["analysis_id", "verdict"],
            "additionalProperties": false
        }),
    }
}

/// Get the feedback listing tool definition
fn get_feedback_list_tool() -> Tool {
    Tool {
        name: FEEDBACK_LIST_TOOL.to_string(),
        description: "List stored feedback, oldest first, optionally for one analysis.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "analysis_id": {
                    "type": "string",
                    "format": "uuid",
                    "description": "Only return feedback for this analysis"
                }
            },
            "additionalProperties": false
        }),
    }
}

/// Get the demo tool definition
fn get_demo_tool() -> Tool {
    Tool {
        name: DEMO_TOOL.to_string(),
        description: "Return a bundled sample analysis of a five-day education-to-creator pivot without calling the model. The result passes the same validation and guardrails as a live analysis.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

/// Get the version tool definition
fn get_version_tool() -> Tool {
    Tool {
        name: VERSION_TOOL.to_string(),
        description: "Report the server name, version, MCP protocol revision and configured Gemini model.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}
