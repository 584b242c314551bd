//! Unit tests for output extraction and schema validation.

use super::*;
use crate::analysis::test_support::{sample_output_with, SAMPLE_OUTPUT};
use serde_json::json;

// ============================================================================
// Extraction
// ============================================================================

#[test]
fn test_extract_raw_object() {
    let raw = "  {\"a\": 1}  ";
    assert_eq!(extract_json(raw).unwrap(), "{\"a\": 1}");
}

#[test]
fn test_extract_json_fence() {
    let raw = "Here you go:\n```json\n{\"a\": 1}\n```\nThanks";
    assert_eq!(extract_json(raw).unwrap(), "{\"a\": 1}");
}

#[test]
fn test_extract_plain_fence() {
    let raw = "```\n{\"a\": 1}\n```";
    assert_eq!(extract_json(raw).unwrap(), "{\"a\": 1}");
}

#[test]
fn test_extract_surrounded_by_prose() {
    let raw = "Sure! {\"a\": {\"b\": 2}} Hope this helps.";
    assert_eq!(extract_json(raw).unwrap(), "{\"a\": {\"b\": 2}}");
}

#[test]
fn test_extract_no_object() {
    let err = extract_json("I cannot help with that.").unwrap_err();
    assert!(err.contains("No JSON object found"));
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_sample_replaces_analysis_id() {
    let id = Uuid::new_v4();
    let result = parse_analysis(SAMPLE_OUTPUT, id).unwrap();

    assert_eq!(result.analysis_id, id);
    assert!(result.drift_detected);
    assert_eq!(result.evidence.len(), 3);
    assert_eq!(result.reasoning_cards.len(), 5);
    assert!(result.one_question.is_none());
}

#[test]
fn test_parse_fenced_sample() {
    let raw = format!("```json\n{}\n```", SAMPLE_OUTPUT);
    assert!(parse_analysis(&raw, Uuid::new_v4()).is_ok());
}

#[test]
fn test_parse_invalid_json() {
    let err = parse_analysis("{\"drift_detected\": tru", Uuid::new_v4()).unwrap_err();
    assert_eq!(err.code(), "MODEL_OUTPUT_INVALID");
}

#[test]
fn test_parse_non_object() {
    let err = parse_analysis("```json\n[1, 2]\n```", Uuid::new_v4()).unwrap_err();
    assert!(err.to_string().contains("not a JSON object"));
}

#[test]
fn test_parse_missing_field() {
    let raw = sample_output_with(|v| {
        v.as_object_mut().unwrap().remove("drift_signature");
    });
    let err = parse_analysis(&raw, Uuid::new_v4()).unwrap_err();
    assert!(err.to_string().contains("drift_signature"));
}

#[test]
fn test_parse_wrong_type() {
    let raw = sample_output_with(|v| v["drift_detected"] = json!("yes"));
    assert!(parse_analysis(&raw, Uuid::new_v4()).is_err());
}

#[test]
fn test_parse_unknown_card_title() {
    let raw = sample_output_with(|v| v["reasoning_cards"][0]["title"] = json!("Baseline"));
    assert!(parse_analysis(&raw, Uuid::new_v4()).is_err());
}

#[test]
fn test_confidence_bounds() {
    for ok in [0.0, 0.4, 0.95] {
        let raw = sample_output_with(|v| v["confidence"] = json!(ok));
        assert!(parse_analysis(&raw, Uuid::new_v4()).is_ok(), "{} rejected", ok);
    }

    for bad in [0.96, 1.0, -0.01] {
        let raw = sample_output_with(|v| v["confidence"] = json!(bad));
        let err = parse_analysis(&raw, Uuid::new_v4()).unwrap_err();
        assert!(err.to_string().contains("confidence"), "{} accepted", bad);
    }
}

#[test]
fn test_empty_intent_title_rejected() {
    let raw = sample_output_with(|v| v["current_intent"]["title"] = json!("  "));
    assert!(parse_analysis(&raw, Uuid::new_v4()).is_err());
}

#[test]
fn test_one_question_shape() {
    let raw = sample_output_with(|v| v["one_question"] = json!("Is the app still the goal?"));
    let result = parse_analysis(&raw, Uuid::new_v4()).unwrap();
    assert_eq!(result.one_question.as_deref(), Some("Is the app still the goal?"));

    let raw = sample_output_with(|v| {
        v.as_object_mut().unwrap().remove("one_question");
    });
    assert!(parse_analysis(&raw, Uuid::new_v4()).unwrap().one_question.is_none());
}

#[test]
fn test_empty_cards_pass_schema() {
    let raw = sample_output_with(|v| v["reasoning_cards"] = json!([]));
    let result = parse_analysis(&raw, Uuid::new_v4()).unwrap();
    assert!(result.reasoning_cards.is_empty());
}

// ============================================================================
// Card contract
// ============================================================================

#[test]
fn test_card_contract_accepts_sample() {
    let result = parse_analysis(SAMPLE_OUTPUT, Uuid::new_v4()).unwrap();
    assert!(check_card_contract(&result).is_ok());
}

#[test]
fn test_card_contract_wrong_count() {
    let mut result = parse_analysis(SAMPLE_OUTPUT, Uuid::new_v4()).unwrap();
    result.reasoning_cards.pop();
    let err = check_card_contract(&result).unwrap_err();
    assert!(err.to_string().contains("expected 5 reasoning_cards, got 4"));
}

#[test]
fn test_card_contract_duplicate_title() {
    let mut result = parse_analysis(SAMPLE_OUTPUT, Uuid::new_v4()).unwrap();
    result.reasoning_cards[4].title = CardTitle::DriftEvidence;
    let err = check_card_contract(&result).unwrap_err();
    assert!(err.to_string().contains("Drift Signature Explanation"));
}
