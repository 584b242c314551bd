//! Shared fixtures for analysis unit tests.

use serde_json::Value;
use uuid::Uuid;

use super::types::{AnalysisResult, EvidenceItem, Signal, SignalType};

pub use super::demo::SAMPLE_OUTPUT;

/// Sample output as a JSON value.
pub fn sample_value() -> Value {
    serde_json::from_str(SAMPLE_OUTPUT).unwrap()
}

/// Sample output serialized after applying `edit`.
pub fn sample_output_with(edit: impl FnOnce(&mut Value)) -> String {
    let mut value = sample_value();
    edit(&mut value);
    value.to_string()
}

/// Sample output as a typed result with a fresh id.
pub fn sample_result() -> AnalysisResult {
    let mut value = sample_value();
    value["analysis_id"] = Value::String(Uuid::new_v4().to_string());
    serde_json::from_value(value).unwrap()
}

/// Sample result with the given vote-relevant fields.
pub fn result_with(drift_detected: bool, confidence: f64, evidence: &[(&str, &str)]) -> AnalysisResult {
    let mut result = sample_result();
    result.drift_detected = drift_detected;
    result.confidence = confidence;
    result.evidence = evidence
        .iter()
        .map(|(day, reason)| EvidenceItem::new(*day, *reason))
        .collect();
    result
}

/// The five-day education-to-creator signals.
pub fn five_day_signals() -> Vec<Signal> {
    vec![
        Signal::new("Day 1", SignalType::Declaration, "I'm building a study app."),
        Signal::new("Day 2", SignalType::Research, "Reading about spaced repetition."),
        Signal::new("Day 3", SignalType::Action, "Posted my first study video."),
        Signal::new("Day 4", SignalType::Research, "Comparing creator fund payouts."),
        Signal::new("Day 5", SignalType::Question, "How do I price sponsored posts?"),
    ]
}
