//! Centralized prompt text for drift analysis
//!
//! Everything the model is told lives here so prompt changes are reviewable
//! in one place and fixtures stay reproducible.

use crate::analysis::ThinkingLevel;

/// Fixed analysis contract sent ahead of every request.
pub const ANALYSIS_CONTRACT: &str = r#"You are Intent Drift Radar. You read a time-ordered list of short user signals and decide whether the user's stated intent has drifted from an earlier baseline.

Your response MUST be a single JSON object in this exact shape:
{
  "analysis_id": "<uuid>",
  "baseline_intent": {"title": "<short title>", "detail": "<one or two sentences>"},
  "current_intent": {"title": "<short title>", "detail": "<one or two sentences>"},
  "drift_detected": true,
  "confidence": 0.72,
  "drift_direction": "<baseline title> → <current title>",
  "evidence": [{"day": "<day label from the signals>", "reason": "<why this signal matters>"}],
  "reasoning_cards": [
    {"title": "Intent Snapshot (Baseline)", "body": "...", "refs": ["<day label>"]},
    {"title": "Intent Snapshot (Current)", "body": "...", "refs": ["<day label>"]},
    {"title": "Drift Evidence", "body": "...", "refs": ["<day label>"]},
    {"title": "Temporal Compression", "body": "...", "refs": ["<day label>"]},
    {"title": "Drift Signature Explanation", "body": "...", "refs": []}
  ],
  "drift_signature": "IDR:v1|dir=<FROM>><TO>|span=<N>d|e=<count>|conf=<0.xx>",
  "one_question": null
}

Rules:
- confidence is a number between 0.00 and 0.95. Never exceed 0.95.
- Exactly five reasoning_cards, one per title above, with those exact titles.
- Every evidence day and every card ref must be a day label that appears in the signals.
- drift_signature: FROM and TO are short uppercase tokens for the baseline and current intent, span is the number of days covered by the signals, e is the number of evidence items, conf is confidence with two decimals and must equal the confidence field.
- one_question is a single clarifying question only when confidence is between 0.40 and 0.70, otherwise null.
- Base every judgment on the signals. Do not invent signals or days.
- Output JSON only. No markdown fences, no commentary."#;

/// Appended to the prompt when the first answer failed validation.
pub const REPAIR_INSTRUCTION: &str =
    "Return ONLY valid JSON matching the schema. No markdown. No extra text.";

/// Per-level reasoning budget directive.
pub fn thinking_level_directive(level: ThinkingLevel) -> &'static str {
    match level {
        ThinkingLevel::Low => {
            "Thinking Level: LOW\n\
             - Keep evidence to max 3 items.\n\
             - Keep each reasoning card body to 1–2 sentences."
        }
        ThinkingLevel::Medium => {
            "Thinking Level: MEDIUM\n\
             - No extra constraints beyond the rules above."
        }
        ThinkingLevel::High => {
            "Thinking Level: HIGH\n\
             - Provide up to 5 evidence items.\n\
             - Reasoning card bodies may use 2–4 sentences.\n\
             - Drift Evidence must cite at least 2 distinct Day labels."
        }
    }
}

/// Repair text naming what was wrong with the previous answer.
pub fn repair_instruction(reason: &str) -> String {
    format!(
        "Your previous response was rejected: {}\n{}",
        reason, REPAIR_INSTRUCTION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_names_required_cards() {
        for title in crate::analysis::CardTitle::REQUIRED {
            assert!(ANALYSIS_CONTRACT.contains(title.as_str()));
        }
        assert!(ANALYSIS_CONTRACT.contains("IDR:v1|"));
        assert!(ANALYSIS_CONTRACT.contains("0.95"));
    }

    #[test]
    fn test_low_directive() {
        let block = thinking_level_directive(ThinkingLevel::Low);
        assert!(block.contains("Thinking Level: LOW"));
        assert!(block.contains("evidence") && block.contains("max 3"));
        assert!(block.contains("1–2 sentences"));
    }

    #[test]
    fn test_medium_directive() {
        let block = thinking_level_directive(ThinkingLevel::Medium);
        assert!(block.contains("Thinking Level: MEDIUM"));
        assert!(block.contains("No extra constraints"));
    }

    #[test]
    fn test_high_directive() {
        let block = thinking_level_directive(ThinkingLevel::High);
        assert!(block.contains("Thinking Level: HIGH"));
        assert!(block.contains("up to 5"));
        assert!(block.contains("2–4 sentences"));
        assert!(block.contains("at least 2 distinct Day"));
    }

    #[test]
    fn test_repair_instruction_states_reason() {
        let text = repair_instruction("missing field `drift_signature`");
        assert!(text.contains("missing field `drift_signature`"));
        assert!(text.ends_with(REPAIR_INSTRUCTION));
    }
}
