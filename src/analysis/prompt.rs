//! Prompt Builder.
//!
//! Output is a pure function of signals, settings and feedback: no clock,
//! no randomness, no map iteration order.

use std::collections::HashSet;

use super::types::{FeedbackItem, Settings, Signal, Verdict};
use crate::prompts::{thinking_level_directive, ANALYSIS_CONTRACT};

/// Render the full request text for one analysis.
pub fn build_prompt(signals: &[Signal], settings: &Settings, feedback: &[FeedbackItem]) -> String {
    let mut sections = vec![
        ANALYSIS_CONTRACT.to_string(),
        thinking_level_directive(settings.thinking_level).to_string(),
        format_windows(signals, settings),
        format_signals(signals),
    ];

    if let Some(section) = format_feedback(feedback) {
        sections.push(section);
    }

    sections.join("\n\n")
}

/// Number of days covered by the signals.
///
/// When every label carries a day number (`Day 3`, `D12`) the span is
/// `max - min + 1`; otherwise it is the number of distinct labels.
pub fn day_span(signals: &[Signal]) -> u32 {
    let numbers: Vec<u32> = signals
        .iter()
        .filter_map(|s| day_number(&s.day))
        .collect();

    if !numbers.is_empty() && numbers.len() == signals.len() {
        let min = numbers.iter().copied().min().unwrap_or(0);
        let max = numbers.iter().copied().max().unwrap_or(0);
        return max - min + 1;
    }

    let distinct: HashSet<&str> = signals.iter().map(|s| s.day.as_str()).collect();
    distinct.len() as u32
}

/// First run of ASCII digits in a day label.
fn day_number(label: &str) -> Option<u32> {
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn format_windows(signals: &[Signal], settings: &Settings) -> String {
    let baseline_len = (settings.baseline_window_size as usize).min(signals.len());
    let current_len = (settings.current_window_size as usize).min(signals.len());

    let baseline: Vec<&str> = signals[..baseline_len]
        .iter()
        .map(|s| s.day.as_str())
        .collect();
    let current: Vec<&str> = signals[signals.len() - current_len..]
        .iter()
        .map(|s| s.day.as_str())
        .collect();

    format!(
        "Windows:\n\
         - Baseline intent: anchor on the first {} signal(s) ({}).\n\
         - Current intent: anchor on the last {} signal(s) ({}).\n\
         - Span: {} day(s).",
        baseline_len,
        baseline.join(", "),
        current_len,
        current.join(", "),
        day_span(signals)
    )
}

fn format_signals(signals: &[Signal]) -> String {
    let mut lines = vec!["Signals:".to_string()];
    lines.extend(
        signals
            .iter()
            .map(|s| format!("{} [{}]: {}", s.day, s.signal_type.as_str(), s.content)),
    );
    lines.join("\n")
}

fn format_feedback(feedback: &[FeedbackItem]) -> Option<String> {
    if feedback.is_empty() {
        return None;
    }

    let mut lines = vec!["Prior feedback:".to_string()];
    for item in feedback {
        let id = item.analysis_id.to_string();
        let verdict = match item.verdict {
            Verdict::Confirm => "confirmed",
            Verdict::Reject => "rejected",
        };
        lines.push(format!("- Analysis {}...: {}", &id[..8], verdict));
        if let Some(comment) = item.comment.as_deref().filter(|c| !c.trim().is_empty()) {
            lines.push(format!("  Comment: {}", comment));
        }
    }

    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{SignalType, ThinkingLevel};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn five_days() -> Vec<Signal> {
        vec![
            Signal::new("Day 1", SignalType::Declaration, "Build a study app for students."),
            Signal::new("Day 2", SignalType::Research, "Read about spaced repetition."),
            Signal::new("Day 3", SignalType::Action, "Posted a short video about studying."),
            Signal::new("Day 4", SignalType::Research, "Looked up creator fund payouts."),
            Signal::new("Day 5", SignalType::Question, "How do I get paid for sponsored posts?"),
        ]
    }

    fn feedback() -> Vec<FeedbackItem> {
        let id = Uuid::parse_str("1234abcd-0000-4000-8000-000000000000").unwrap();
        vec![FeedbackItem {
            analysis_id: id,
            verdict: Verdict::Reject,
            comment: Some("Still an education product".to_string()),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }]
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let signals = five_days();
        let settings = Settings::default();
        let a = build_prompt(&signals, &settings, &feedback());
        let b = build_prompt(&signals, &settings, &feedback());
        assert_eq!(a, b);
    }

    #[test]
    fn test_prompt_starts_with_contract_and_directive() {
        let prompt = build_prompt(&five_days(), &Settings::default(), &[]);
        assert!(prompt.starts_with(ANALYSIS_CONTRACT));
        assert!(prompt.contains("Thinking Level: MEDIUM"));

        let high = Settings::default().with_thinking_level(ThinkingLevel::High);
        let prompt = build_prompt(&five_days(), &high, &[]);
        assert!(prompt.contains("Thinking Level: HIGH"));
        assert!(!prompt.contains("Thinking Level: MEDIUM"));
    }

    #[test]
    fn test_signals_keep_caller_order() {
        let mut signals = five_days();
        signals.swap(0, 4);
        let prompt = build_prompt(&signals, &Settings::default(), &[]);

        let first = prompt.find("Day 5 [question]").unwrap();
        let last = prompt.find("Day 1 [declaration]").unwrap();
        assert!(first < last);
    }

    #[test]
    fn test_signal_lines_format() {
        let prompt = build_prompt(&five_days(), &Settings::default(), &[]);
        assert!(prompt.contains("Signals:\nDay 1 [declaration]: Build a study app for students."));
    }

    #[test]
    fn test_windows_name_anchor_days() {
        let prompt = build_prompt(&five_days(), &Settings::default(), &[]);
        assert!(prompt.contains("first 2 signal(s) (Day 1, Day 2)"));
        assert!(prompt.contains("last 2 signal(s) (Day 4, Day 5)"));
        assert!(prompt.contains("Span: 5 day(s)."));
    }

    #[test]
    fn test_windows_clamped_to_signal_count() {
        let signals = vec![Signal::new("Day 1", SignalType::Declaration, "x")];
        let settings = Settings {
            baseline_window_size: 4,
            current_window_size: 3,
            thinking_level: ThinkingLevel::Low,
        };
        let prompt = build_prompt(&signals, &settings, &[]);
        assert!(prompt.contains("first 1 signal(s) (Day 1)"));
        assert!(prompt.contains("last 1 signal(s) (Day 1)"));
    }

    #[test]
    fn test_feedback_section() {
        let prompt = build_prompt(&five_days(), &Settings::default(), &feedback());
        assert!(prompt.ends_with(
            "Prior feedback:\n- Analysis 1234abcd...: rejected\n  Comment: Still an education product"
        ));

        let prompt = build_prompt(&five_days(), &Settings::default(), &[]);
        assert!(!prompt.contains("Prior feedback:"));
    }

    #[test]
    fn test_day_span() {
        assert_eq!(day_span(&five_days()), 5);

        let sparse = vec![
            Signal::new("Day 2", SignalType::Action, "a"),
            Signal::new("Day 9", SignalType::Action, "b"),
        ];
        assert_eq!(day_span(&sparse), 8);

        let free_text = vec![
            Signal::new("Monday", SignalType::Action, "a"),
            Signal::new("Tuesday", SignalType::Action, "b"),
            Signal::new("Monday", SignalType::Action, "c"),
        ];
        assert_eq!(day_span(&free_text), 2);
    }
}
