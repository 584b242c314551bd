//! Guardrail Postprocessor.
//!
//! Deterministic repairs applied to schema-valid results. Every rule is
//! idempotent, so running [`apply`] twice is the same as running it once.

use std::collections::HashSet;

use super::types::{AnalysisResult, CardTitle};
use crate::error::{AnalysisError, AnalysisOutcome};

/// Literal prefix of every delivered drift signature.
pub const SIGNATURE_PREFIX: &str = "IDR:v1|";

/// Collapse doubled `>` separators and force the `IDR:v1|` prefix.
pub fn normalize_signature(signature: &str) -> String {
    let mut out = signature.trim().to_string();
    while out.contains(">>") {
        out = out.replace(">>", ">");
    }

    if out.starts_with(SIGNATURE_PREFIX) {
        out
    } else {
        format!("{}{}", SIGNATURE_PREFIX, out)
    }
}

/// Rewrite the `e=` and `conf=` fields from the result's own values.
///
/// Both fields are moved to the end of the signature in that order; every
/// other field keeps its position.
pub fn sync_signature_fields(signature: &str, evidence_count: usize, confidence: f64) -> String {
    let mut fields: Vec<String> = signature
        .split('|')
        .filter(|field| !field.is_empty())
        .filter(|field| !field.starts_with("e=") && !field.starts_with("conf="))
        .map(str::to_string)
        .collect();

    fields.push(format!("e={}", evidence_count));
    fields.push(format!("conf={:.2}", confidence));
    fields.join("|")
}

/// Canonical direction text derived from the two intent titles.
pub fn canonical_direction(result: &AnalysisResult) -> String {
    format!(
        "{} → {}",
        result.baseline_intent.title.trim(),
        result.current_intent.title.trim()
    )
}

/// Distinct evidence days in first-seen order.
pub fn evidence_days(result: &AnalysisResult) -> Vec<String> {
    let mut seen = HashSet::new();
    result
        .evidence
        .iter()
        .filter(|e| seen.insert(e.day.as_str()))
        .map(|e| e.day.clone())
        .collect()
}

/// Apply every guardrail in order.
///
/// Only an empty card list is an error; everything else is corrected silently.
pub fn apply(mut result: AnalysisResult) -> AnalysisOutcome<AnalysisResult> {
    result.drift_signature = sync_signature_fields(
        &normalize_signature(&result.drift_signature),
        result.evidence.len(),
        result.confidence,
    );

    if result.reasoning_cards.is_empty() {
        return Err(AnalysisError::OutputInvalid {
            message: "reasoning_cards is empty".to_string(),
        });
    }

    result.drift_direction = canonical_direction(&result);

    let days = evidence_days(&result);
    if let Some(card) = result
        .reasoning_cards
        .iter_mut()
        .find(|c| c.title == CardTitle::TemporalCompression)
    {
        if card.refs.is_empty() {
            card.refs = days;
        }
    }

    Ok(result)
}
