//! Schema & Validator for raw model output.

use std::collections::HashSet;

use serde_json::Value;
use uuid::Uuid;

use super::types::{AnalysisResult, CardTitle};
use crate::error::{AnalysisError, AnalysisOutcome};

/// Upper bound on model-reported confidence.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Required number of reasoning cards.
pub const REQUIRED_CARD_COUNT: usize = 5;

fn invalid(message: impl Into<String>) -> AnalysisError {
    AnalysisError::OutputInvalid {
        message: message.into(),
    }
}

/// Locate the JSON object inside a completion.
///
/// Tolerates ```` ```json ```` fences and prose before or after the object.
pub fn extract_json(completion: &str) -> Result<&str, String> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Ok(trimmed);
    }

    if let Some(block) = completion.split("```json").nth(1) {
        return block
            .split("```")
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty".to_string());
    }

    if let Some(block) = completion.split("```").nth(1) {
        let block = block.trim();
        if block.starts_with('{') {
            return Ok(block);
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&trimmed[start..=end]),
        _ => Err(format!(
            "No JSON object found in response. First 100 chars: '{}'",
            trimmed.chars().take(100).collect::<String>()
        )),
    }
}

/// Parse and schema-check a raw completion.
///
/// Whatever `analysis_id` the model produced is replaced by `analysis_id`.
pub fn parse_analysis(completion: &str, analysis_id: Uuid) -> AnalysisOutcome<AnalysisResult> {
    let json = extract_json(completion).map_err(invalid)?;

    let mut value: Value =
        serde_json::from_str(json).map_err(|e| invalid(format!("response is not valid JSON: {}", e)))?;

    let object = value
        .as_object_mut()
        .ok_or_else(|| invalid("response is not a JSON object"))?;
    object.insert(
        "analysis_id".to_string(),
        Value::String(analysis_id.to_string()),
    );

    let result: AnalysisResult = serde_json::from_value(value)
        .map_err(|e| invalid(format!("response does not match schema: {}", e)))?;

    check_schema(&result)?;
    Ok(result)
}

/// Field-level checks serde cannot express.
fn check_schema(result: &AnalysisResult) -> AnalysisOutcome<()> {
    if !result.confidence.is_finite() || !(0.0..=MAX_CONFIDENCE).contains(&result.confidence) {
        return Err(invalid(format!(
            "confidence {} outside [0.00, {:.2}]",
            result.confidence, MAX_CONFIDENCE
        )));
    }

    if result.baseline_intent.title.trim().is_empty() {
        return Err(invalid("baseline_intent.title is empty"));
    }
    if result.current_intent.title.trim().is_empty() {
        return Err(invalid("current_intent.title is empty"));
    }

    Ok(())
}

/// Final delivery check: exactly the five required cards.
pub fn check_card_contract(result: &AnalysisResult) -> AnalysisOutcome<()> {
    if result.reasoning_cards.len() != REQUIRED_CARD_COUNT {
        return Err(invalid(format!(
            "expected {} reasoning_cards, got {}",
            REQUIRED_CARD_COUNT,
            result.reasoning_cards.len()
        )));
    }

    let present: HashSet<CardTitle> = result.reasoning_cards.iter().map(|c| c.title).collect();
    let missing: Vec<&str> = CardTitle::REQUIRED
        .iter()
        .filter(|t| !present.contains(t))
        .map(|t| t.as_str())
        .collect();

    if !missing.is_empty() {
        return Err(invalid(format!(
            "missing reasoning card(s): {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod validate_tests;
