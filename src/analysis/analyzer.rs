use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::caller::ModelCaller;
use super::prompt::build_prompt;
use super::types::{AnalysisResult, AnalyzeParams, Settings, Signal};
use super::{record_invocation, ANALYZE_TOOL};
use crate::config::RequestConfig;
use crate::error::{AnalysisError, AnalysisOutcome};
use crate::storage::{Invocation, SqliteStorage};

/// Reject requests the model cannot meaningfully answer.
pub fn validate_request(signals: &[Signal], settings: &Settings) -> AnalysisOutcome<()> {
    if signals.is_empty() {
        return Err(AnalysisError::invalid_request(
            "signals",
            "at least one signal is required",
        ));
    }

    if let Some(index) = signals.iter().position(|s| s.day.trim().is_empty()) {
        return Err(AnalysisError::invalid_request(
            format!("signals[{}].day", index),
            "day label cannot be empty",
        ));
    }

    if settings.baseline_window_size < 1 {
        return Err(AnalysisError::invalid_request(
            "settings.baseline_window_size",
            "must be at least 1",
        ));
    }
    if settings.current_window_size < 1 {
        return Err(AnalysisError::invalid_request(
            "settings.current_window_size",
            "must be at least 1",
        ));
    }

    Ok(())
}

/// Single-call drift analysis.
#[derive(Clone)]
pub struct DriftAnalyzer {
    caller: ModelCaller,
    storage: SqliteStorage,
    timeout: Duration,
}

impl DriftAnalyzer {
    /// Create a new analyzer
    pub fn new(caller: ModelCaller, storage: SqliteStorage, config: &RequestConfig) -> Self {
        Self {
            caller,
            storage,
            timeout: config.analyze_timeout(),
        }
    }

    /// Analyze one request and return the postprocessed result.
    pub async fn analyze(&self, params: AnalyzeParams) -> AnalysisOutcome<AnalysisResult> {
        validate_request(&params.signals, &params.settings)?;

        let start = Instant::now();
        let analysis_id = Uuid::new_v4();
        let prompt = build_prompt(&params.signals, &params.settings, &params.feedback);

        debug!(
            %analysis_id,
            signals = params.signals.len(),
            feedback = params.feedback.len(),
            thinking_level = %params.settings.thinking_level,
            "Starting drift analysis"
        );

        let invocation = Invocation::new(
            ANALYZE_TOOL,
            serde_json::to_value(&params).unwrap_or_default(),
        )
        .with_analysis(analysis_id);

        match self.caller.call(&prompt, analysis_id, self.timeout).await {
            Ok(outcome) => {
                let latency = start.elapsed().as_millis() as i64;
                let invocation = invocation.with_model(&outcome.model_used).success(
                    serde_json::to_value(&outcome.result).unwrap_or_default(),
                    latency,
                );
                record_invocation(&self.storage, &invocation).await;

                info!(
                    %analysis_id,
                    model_used = %outcome.model_used,
                    drift_detected = outcome.result.drift_detected,
                    confidence = outcome.result.confidence,
                    latency_ms = latency,
                    "Drift analysis completed"
                );
                Ok(outcome.result)
            }
            Err(e) => {
                let latency = start.elapsed().as_millis() as i64;
                let invocation = invocation
                    .with_model(self.caller.model_id())
                    .failure(e.code(), latency);
                record_invocation(&self.storage, &invocation).await;
                Err(e)
            }
        }
    }
}
