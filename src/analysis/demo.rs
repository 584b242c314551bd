//! Bundled sample analysis for quick demos.
//!
//! The sample is a stored model completion for the five-day pivot scenario.
//! It goes through the same validation and guardrails as a live answer, so a
//! demo result always has the delivered shape.

use tracing::{error, info};
use uuid::Uuid;

use super::postprocess;
use super::types::AnalysisResult;
use super::validate::{check_card_contract, parse_analysis};
use crate::error::{AnalysisError, AnalysisOutcome};

/// Stored completion for the five-day education-to-creator signals.
pub const SAMPLE_OUTPUT: &str = include_str!("../../assets/sample_output.json");

/// Analysis id every demo result carries.
pub const DEMO_ANALYSIS_ID: Uuid = Uuid::nil();

/// The bundled sample as a delivered result. No model call is made.
pub fn demo_result() -> AnalysisOutcome<AnalysisResult> {
    render(SAMPLE_OUTPUT)
}

fn render(raw: &str) -> AnalysisOutcome<AnalysisResult> {
    let outcome = parse_analysis(raw, DEMO_ANALYSIS_ID)
        .and_then(postprocess::apply)
        .and_then(|result| check_card_contract(&result).map(|()| result));

    match outcome {
        Ok(result) => {
            info!(drift_detected = result.drift_detected, "Serving cached demo result");
            Ok(result)
        }
        Err(e) => {
            error!(error = %e, "Demo result failed validation");
            Err(AnalysisError::DemoUnavailable {
                message: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::CardTitle;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_demo_result_is_postprocessed() {
        let result = demo_result().unwrap();

        assert_eq!(result.analysis_id, DEMO_ANALYSIS_ID);
        assert_eq!(
            result.drift_signature,
            "IDR:v1|dir=EDTECH>CREATOR|span=5d|e=3|conf=0.72"
        );
        assert_eq!(
            result.drift_direction,
            "EdTech study app → Creator monetization"
        );
        assert_eq!(result.reasoning_cards.len(), 5);
        assert_eq!(
            result.card(CardTitle::TemporalCompression).unwrap().refs,
            vec!["Day 3".to_string(), "Day 4".to_string(), "Day 5".to_string()]
        );
    }

    #[test]
    fn test_broken_sample_is_demo_unavailable() {
        let err = render("{\"drift_detected\": true}").unwrap_err();
        assert_eq!(err.code(), "DEMO_UNAVAILABLE");
        assert_eq!(err.http_status(), 500);
    }
}
