//! Ensemble Orchestrator.
//!
//! Runs the single-call pipeline once per thinking level in parallel and
//! folds the survivors into a consensus result plus an agreement report.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::caller::{CallOutcome, ModelCaller};
use super::postprocess;
use super::prompt::build_prompt;
use super::types::{
    AgreementReport, AnalysisResult, DirectionVote, DriftVotes, EnsembleErrorItem, EnsembleMeta,
    EnsembleParams, EnsembleResponse, EvidenceAgreement, EvidenceItem, ThinkingLevel,
};
use super::validate::MAX_CONFIDENCE;
use super::{record_invocation, validate_request, ENSEMBLE_TOOL};
use crate::config::RequestConfig;
use crate::error::{AnalysisError, AnalysisOutcome};
use crate::storage::{Invocation, SqliteStorage};

/// Fewest successful runs that still yield a consensus.
pub const MIN_SUCCESS_COUNT: usize = 2;

/// Parallel multi-level analysis.
#[derive(Clone)]
pub struct EnsembleOrchestrator {
    caller: ModelCaller,
    storage: SqliteStorage,
    call_timeout: Duration,
    deadline: Duration,
}

impl EnsembleOrchestrator {
    /// Create a new orchestrator
    pub fn new(caller: ModelCaller, storage: SqliteStorage, config: &RequestConfig) -> Self {
        Self {
            caller,
            storage,
            call_timeout: config.ensemble_call_timeout(),
            deadline: config.ensemble_deadline(),
        }
    }

    /// Run every requested level and compute the consensus.
    pub async fn run(&self, params: EnsembleParams) -> AnalysisOutcome<EnsembleResponse> {
        validate_request(&params.signals, &params.settings)?;
        let modes = resolve_modes(params.modes.as_deref())?;

        let ensemble_id = Uuid::new_v4();
        let start = Instant::now();
        let invocation = Invocation::new(
            ENSEMBLE_TOOL,
            serde_json::to_value(&params).unwrap_or_default(),
        )
        .with_analysis(ensemble_id);

        info!(%ensemble_id, modes = ?modes, "Starting ensemble analysis");

        let (successes, errors) = self.fan_out(&params, &modes, start + self.deadline).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let models_used = models_used(&successes, self.caller.model_id());
        let invocation = invocation.with_model(models_used.as_str());

        if successes.len() < MIN_SUCCESS_COUNT {
            error!(
                %ensemble_id,
                succeeded = successes.len(),
                failed = errors.len(),
                duration_ms,
                "Ensemble failed"
            );
            let err = AnalysisError::EnsembleFailed {
                succeeded: successes.len(),
                errors,
            };
            record_invocation(
                &self.storage,
                &invocation.failure(err.code(), duration_ms as i64),
            )
            .await;
            return Err(err);
        }

        let ranked: Vec<(ThinkingLevel, AnalysisResult)> = successes
            .into_iter()
            .map(|(mode, outcome)| (mode, outcome.result))
            .collect();
        let (consensus, agreement) = compute_consensus(&ranked, ensemble_id)?;

        let partial = !errors.is_empty();
        let response = EnsembleResponse {
            analysis_id: ensemble_id,
            analyses: ranked.into_iter().map(|(_, result)| result).collect(),
            consensus,
            agreement,
            meta: EnsembleMeta {
                modes,
                duration_ms,
                partial,
                errors: if partial { Some(errors) } else { None },
            },
        };

        record_invocation(
            &self.storage,
            &invocation.success(
                serde_json::to_value(&response).unwrap_or_default(),
                duration_ms as i64,
            ),
        )
        .await;

        info!(
            %ensemble_id,
            succeeded = response.analyses.len(),
            partial,
            models_used = %models_used,
            drift_detected = response.consensus.drift_detected,
            confidence = response.consensus.confidence,
            duration_ms,
            "Ensemble analysis completed"
        );

        Ok(response)
    }

    /// Launch one task per level and collect results until all settle or
    /// the deadline passes. Both lists come back in level order.
    async fn fan_out(
        &self,
        params: &EnsembleParams,
        modes: &[ThinkingLevel],
        deadline: Instant,
    ) -> (Vec<(ThinkingLevel, CallOutcome)>, Vec<EnsembleErrorItem>) {
        let signals = Arc::new(params.signals.clone());
        let feedback = Arc::new(params.feedback.clone());

        let mut tasks = JoinSet::new();
        for &mode in modes {
            let caller = self.caller.clone();
            let signals = Arc::clone(&signals);
            let feedback = Arc::clone(&feedback);
            let settings = params.settings.with_thinking_level(mode);
            let call_timeout = self.call_timeout;

            tasks.spawn(async move {
                let analysis_id = Uuid::new_v4();
                let prompt = build_prompt(&signals, &settings, &feedback);
                debug!(%analysis_id, mode = %mode, "Ensemble run started");
                (mode, caller.call(&prompt, analysis_id, call_timeout).await)
            });
        }

        let mut settled: HashMap<ThinkingLevel, AnalysisOutcome<CallOutcome>> = HashMap::new();
        let mut deadline_hit = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((mode, outcome)))) => {
                    match &outcome {
                        Ok(done) => info!(
                            mode = %mode,
                            model_used = %done.model_used,
                            attempts = done.attempts,
                            "Ensemble run completed"
                        ),
                        Err(e) => {
                            warn!(mode = %mode, code = e.code(), error = %e, "Ensemble run failed")
                        }
                    }
                    settled.insert(mode, outcome);
                }
                Ok(Some(Err(join_err))) => {
                    error!(error = %join_err, "Ensemble task aborted");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = tasks.len(),
                        deadline_ms = self.deadline.as_millis() as u64,
                        "Ensemble deadline reached, cancelling remaining runs"
                    );
                    tasks.abort_all();
                    deadline_hit = true;
                    break;
                }
            }
        }

        let mut successes = Vec::new();
        let mut errors = Vec::new();
        for &mode in modes {
            match settled.remove(&mode) {
                Some(Ok(outcome)) => successes.push((mode, outcome)),
                Some(Err(e)) => errors.push(EnsembleErrorItem {
                    mode,
                    code: e.code().to_string(),
                    message: e.public_message(),
                }),
                None if deadline_hit => {
                    let timeout = AnalysisError::Timeout {
                        timeout_ms: self.deadline.as_millis() as u64,
                    };
                    errors.push(EnsembleErrorItem {
                        mode,
                        code: timeout.code().to_string(),
                        message: timeout.public_message(),
                    });
                }
                None => errors.push(EnsembleErrorItem {
                    mode,
                    code: "MODEL_UPSTREAM_ERROR".to_string(),
                    message: "Analysis run did not complete.".to_string(),
                }),
            }
        }

        (successes, errors)
    }
}

/// Distinct models that answered, in level order, joined with `,`.
/// Falls back to the configured model when no run succeeded.
fn models_used(successes: &[(ThinkingLevel, CallOutcome)], configured: &str) -> String {
    let mut models: Vec<&str> = Vec::new();
    for (_, outcome) in successes {
        if !models.contains(&outcome.model_used.as_str()) {
            models.push(&outcome.model_used);
        }
    }

    if models.is_empty() {
        configured.to_string()
    } else {
        models.join(",")
    }
}

/// Distinct requested levels in level order; all three when unspecified.
fn resolve_modes(requested: Option<&[ThinkingLevel]>) -> AnalysisOutcome<Vec<ThinkingLevel>> {
    let mut modes = match requested {
        Some(modes) => modes.to_vec(),
        None => ThinkingLevel::ALL.to_vec(),
    };
    modes.sort();
    modes.dedup();

    if modes.len() < MIN_SUCCESS_COUNT {
        return Err(AnalysisError::invalid_request(
            "modes",
            format!("at least {} distinct thinking levels are required", MIN_SUCCESS_COUNT),
        ));
    }

    Ok(modes)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Median, with the mean of the middle pair for even counts.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Deterministic consensus over the successful runs.
///
/// Input order does not matter; runs are ranked by thinking level before
/// any tie is broken. `analysis_id` becomes the consensus id.
pub fn compute_consensus(
    results: &[(ThinkingLevel, AnalysisResult)],
    analysis_id: Uuid,
) -> AnalysisOutcome<(AnalysisResult, AgreementReport)> {
    if results.len() < MIN_SUCCESS_COUNT {
        return Err(AnalysisError::EnsembleFailed {
            succeeded: results.len(),
            errors: Vec::new(),
        });
    }

    let mut ranked: Vec<&(ThinkingLevel, AnalysisResult)> = results.iter().collect();
    ranked.sort_by_key(|(mode, _)| *mode);
    let analyses: Vec<&AnalysisResult> = ranked.iter().map(|(_, r)| r).collect();

    let n = analyses.len();
    let yes = analyses.iter().filter(|r| r.drift_detected).count();
    // Two agreeing runs are needed to call drift; a 1-1 split is no drift.
    let drift_detected = yes >= MIN_SUCCESS_COUNT;

    let confidences: Vec<f64> = analyses.iter().map(|r| r.confidence).collect();
    let confidence = round2(median(&confidences)).min(MAX_CONFIDENCE);
    let confidence_min = confidences.iter().copied().fold(f64::INFINITY, f64::min);
    let confidence_max = confidences.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    // First-seen order doubles as the level-order tie-break.
    let mut direction_votes: Vec<DirectionVote> = Vec::new();
    for result in &analyses {
        let value = result.drift_direction.trim();
        match direction_votes.iter_mut().find(|v| v.value == value) {
            Some(vote) => vote.count += 1,
            None => direction_votes.push(DirectionVote {
                value: value.to_string(),
                count: 1,
            }),
        }
    }
    direction_votes.sort_by(|a, b| b.count.cmp(&a.count));
    let winning_direction = direction_votes
        .first()
        .map(|v| v.value.clone())
        .unwrap_or_default();

    let winner = analyses
        .iter()
        .find(|r| r.drift_direction.trim() == winning_direction)
        .copied()
        .unwrap_or(analyses[0]);

    let mut consensus = winner.clone();
    consensus.analysis_id = analysis_id;
    consensus.drift_detected = drift_detected;
    consensus.confidence = confidence;
    // Rewrites `conf=` to the aggregate confidence.
    let consensus = postprocess::apply(consensus)?;

    let agreement = AgreementReport {
        drift_detected_votes: DriftVotes {
            yes: yes as u32,
            no: (n - yes) as u32,
        },
        confidence_min,
        confidence_max,
        direction_votes,
        evidence_agreement: evidence_agreement(&analyses),
    };

    Ok((consensus, agreement))
}

/// Bucket distinct `(day, reason)` items by how many runs produced them.
fn evidence_agreement(analyses: &[&AnalysisResult]) -> EvidenceAgreement {
    let mut tally: Vec<(EvidenceItem, usize)> = Vec::new();

    for result in analyses {
        let mut seen: HashSet<&EvidenceItem> = HashSet::new();
        for item in &result.evidence {
            if !seen.insert(item) {
                continue;
            }
            match tally.iter_mut().find(|(known, _)| known == item) {
                Some((_, count)) => *count += 1,
                None => tally.push((item.clone(), 1)),
            }
        }
    }

    let mut agreement = EvidenceAgreement::default();
    for (item, count) in tally {
        match count {
            0 | 1 => agreement.one_of_three.push(item),
            2 => agreement.two_of_three.push(item),
            _ => agreement.three_of_three.push(item),
        }
    }
    agreement
}

#[cfg(test)]
#[path = "ensemble_tests.rs"]
mod ensemble_tests;
