//! Model Caller: one timed reasoning call with a single repair retry and a
//! single model fallback.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::postprocess;
use super::types::AnalysisResult;
use super::validate::{check_card_contract, parse_analysis};
use crate::error::{AnalysisError, AnalysisOutcome, ModelError, ModelResult};
use crate::gemini::{select_fallback_model, ReasoningModel};
use crate::prompts::repair_instruction;

/// Validated result plus the identifier of the model that produced it.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub result: AnalysisResult,
    /// Model that answered; differs from the configured one after a fallback.
    pub model_used: String,
    /// Generation calls issued, including fallback and repair.
    pub attempts: u32,
}

/// Issues reasoning calls against one configured model.
#[derive(Clone)]
pub struct ModelCaller {
    model: Arc<dyn ReasoningModel>,
    model_id: String,
}

impl ModelCaller {
    /// Create a caller for the configured model identifier.
    pub fn new(model: Arc<dyn ReasoningModel>, model_id: impl Into<String>) -> Self {
        Self {
            model,
            model_id: model_id.into(),
        }
    }

    /// Configured model identifier.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Run `prompt` to a validated, postprocessed result within `budget`.
    ///
    /// The budget is one deadline shared by the first call, the fallback
    /// lookup and call, and the repair call.
    pub async fn call(
        &self,
        prompt: &str,
        analysis_id: Uuid,
        budget: Duration,
    ) -> AnalysisOutcome<CallOutcome> {
        let deadline = Instant::now() + budget;
        let start = Instant::now();

        let mut model = self.model_id.clone();
        let mut request = prompt.to_string();
        let mut attempts = 0u32;
        let mut fell_back = false;
        let mut repaired = false;

        loop {
            attempts += 1;
            debug!(%analysis_id, model = %model, attempt = attempts, "Calling reasoning model");

            let raw = match self.generate_until(&request, &model, deadline, budget).await {
                Ok(raw) => raw,
                Err(ModelError::NotFound { .. }) if !fell_back => {
                    fell_back = true;
                    model = self.find_fallback(&model, deadline, budget).await?;
                    warn!(
                        %analysis_id,
                        configured = %self.model_id,
                        fallback = %model,
                        "Configured model not found, retrying with fallback"
                    );
                    continue;
                }
                Err(ModelError::Timeout { timeout_ms }) => {
                    warn!(%analysis_id, model = %model, timeout_ms, "Reasoning call timed out");
                    return Err(AnalysisError::Timeout { timeout_ms });
                }
                Err(e) => {
                    warn!(%analysis_id, model = %model, error = %e, "Reasoning call failed");
                    return Err(e.into());
                }
            };

            match finish(&raw, analysis_id) {
                Ok(result) => {
                    info!(
                        %analysis_id,
                        model_used = %model,
                        attempts,
                        latency_ms = start.elapsed().as_millis() as u64,
                        "Analysis call completed"
                    );
                    return Ok(CallOutcome {
                        result,
                        model_used: model,
                        attempts,
                    });
                }
                Err(AnalysisError::OutputInvalid { message }) if !repaired => {
                    repaired = true;
                    warn!(%analysis_id, model = %model, reason = %message, "Invalid model output, requesting repair");
                    request = format!("{}\n\n{}", prompt, repair_instruction(&message));
                }
                Err(e) => {
                    warn!(%analysis_id, model = %model, error = %e, "Model output rejected after repair");
                    return Err(e);
                }
            }
        }
    }

    /// One generation call bounded by what is left of the deadline.
    async fn generate_until(
        &self,
        prompt: &str,
        model: &str,
        deadline: Instant,
        budget: Duration,
    ) -> ModelResult<String> {
        let timeout_ms = budget.as_millis() as u64;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ModelError::Timeout { timeout_ms });
        }

        match tokio::time::timeout(remaining, self.model.generate(prompt, model, remaining)).await {
            Ok(result) => result.map_err(|e| match e {
                ModelError::Timeout { .. } => ModelError::Timeout { timeout_ms },
                other => other,
            }),
            Err(_) => Err(ModelError::Timeout { timeout_ms }),
        }
    }

    /// First preferred model the provider lists, other than `rejected`.
    async fn find_fallback(
        &self,
        rejected: &str,
        deadline: Instant,
        budget: Duration,
    ) -> AnalysisOutcome<String> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let available = match tokio::time::timeout(remaining, self.model.list_available_models()).await
        {
            Ok(Ok(models)) => models,
            Ok(Err(ModelError::ApiKeyMissing)) => return Err(AnalysisError::ApiKeyMissing),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to list available models");
                Vec::new()
            }
            Err(_) => {
                return Err(AnalysisError::Timeout {
                    timeout_ms: budget.as_millis() as u64,
                })
            }
        };

        select_fallback_model(&available, rejected).ok_or_else(|| {
            warn!(rejected = %rejected, available = available.len(), "No fallback model available");
            AnalysisError::ModelUnavailable {
                model: rejected.to_string(),
                message: "no model from the preference list is available".to_string(),
            }
        })
    }
}

/// Validate, postprocess and contract-check one raw completion.
fn finish(raw: &str, analysis_id: Uuid) -> AnalysisOutcome<AnalysisResult> {
    let parsed = parse_analysis(raw, analysis_id)?;
    let result = postprocess::apply(parsed)?;
    check_card_contract(&result)?;
    Ok(result)
}

#[cfg(test)]
#[path = "caller_tests.rs"]
mod caller_tests;
