use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of user signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// A stated goal or plan.
    Declaration,
    /// Reading or investigation.
    Research,
    /// Something the user did.
    Action,
    /// Something the user asked.
    Question,
}

impl SignalType {
    /// Wire name of the signal type.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Declaration => "declaration",
            SignalType::Research => "research",
            SignalType::Action => "action",
            SignalType::Question => "question",
        }
    }
}

/// One day-labelled unit of user-provided text.
///
/// Signals keep caller order; day labels are free text and never re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Free-text day label, e.g. `Day 3`.
    pub day: String,
    /// Signal kind.
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    /// Signal text.
    pub content: String,
}

impl Signal {
    /// Create a signal.
    pub fn new(day: impl Into<String>, signal_type: SignalType, content: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            signal_type,
            content: content.into(),
        }
    }
}

/// Reasoning effort requested from the model.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    /// Short answers, at most three evidence items.
    Low,
    /// No extra constraints.
    #[default]
    Medium,
    /// Longer card bodies, up to five evidence items.
    High,
}

impl ThinkingLevel {
    /// All levels in ensemble order.
    pub const ALL: [ThinkingLevel; 3] = [ThinkingLevel::Low, ThinkingLevel::Medium, ThinkingLevel::High];

    /// Get the level name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingLevel::Low => "low",
            ThinkingLevel::Medium => "medium",
            ThinkingLevel::High => "high",
        }
    }
}

impl std::fmt::Display for ThinkingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ThinkingLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(ThinkingLevel::Low),
            "medium" => Ok(ThinkingLevel::Medium),
            "high" => Ok(ThinkingLevel::High),
            _ => Err(format!("Unknown thinking level: {}", s)),
        }
    }
}

fn default_window() -> u32 {
    2
}

/// Caller-owned analysis settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Leading signals that anchor the baseline intent (>= 1).
    #[serde(default = "default_window")]
    pub baseline_window_size: u32,
    /// Trailing signals that anchor the current intent (>= 1).
    #[serde(default = "default_window")]
    pub current_window_size: u32,
    /// Requested reasoning effort.
    #[serde(default)]
    pub thinking_level: ThinkingLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            baseline_window_size: default_window(),
            current_window_size: default_window(),
            thinking_level: ThinkingLevel::Medium,
        }
    }
}

impl Settings {
    /// Copy of these settings at another thinking level.
    pub fn with_thinking_level(self, thinking_level: ThinkingLevel) -> Self {
        Self {
            thinking_level,
            ..self
        }
    }
}

/// Title and detail of one intent snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentBlock {
    pub title: String,
    pub detail: String,
}

/// One piece of evidence, tied to a signal day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub day: String,
    pub reason: String,
}

impl EvidenceItem {
    /// Create an evidence item.
    pub fn new(day: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            reason: reason.into(),
        }
    }
}

/// The closed set of reasoning card identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardTitle {
    #[serde(rename = "Intent Snapshot (Baseline)")]
    IntentSnapshotBaseline,
    #[serde(rename = "Intent Snapshot (Current)")]
    IntentSnapshotCurrent,
    #[serde(rename = "Drift Evidence")]
    DriftEvidence,
    #[serde(rename = "Temporal Compression")]
    TemporalCompression,
    #[serde(rename = "Drift Signature Explanation")]
    DriftSignatureExplanation,
}

impl CardTitle {
    /// Required cards, in delivery order.
    pub const REQUIRED: [CardTitle; 5] = [
        CardTitle::IntentSnapshotBaseline,
        CardTitle::IntentSnapshotCurrent,
        CardTitle::DriftEvidence,
        CardTitle::TemporalCompression,
        CardTitle::DriftSignatureExplanation,
    ];

    /// Display title as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CardTitle::IntentSnapshotBaseline => "Intent Snapshot (Baseline)",
            CardTitle::IntentSnapshotCurrent => "Intent Snapshot (Current)",
            CardTitle::DriftEvidence => "Drift Evidence",
            CardTitle::TemporalCompression => "Temporal Compression",
            CardTitle::DriftSignatureExplanation => "Drift Signature Explanation",
        }
    }
}

impl std::fmt::Display for CardTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One explanatory card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningCard {
    pub title: CardTitle,
    pub body: String,
    /// Day labels the card refers to, in order.
    #[serde(default)]
    pub refs: Vec<String>,
}

/// Validated drift analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: Uuid,
    pub baseline_intent: IntentBlock,
    pub current_intent: IntentBlock,
    pub drift_detected: bool,
    /// In `[0.00, 0.95]`.
    pub confidence: f64,
    pub drift_direction: String,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    #[serde(default)]
    pub reasoning_cards: Vec<ReasoningCard>,
    pub drift_signature: String,
    /// Clarifying question; the model is asked to set it only for confidence in `[0.40, 0.70]`.
    #[serde(default)]
    pub one_question: Option<String>,
}

impl AnalysisResult {
    /// The card with the given title, if present.
    pub fn card(&self, title: CardTitle) -> Option<&ReasoningCard> {
        self.reasoning_cards.iter().find(|c| c.title == title)
    }
}

/// User verdict on a past analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Confirm,
    Reject,
}

impl Verdict {
    /// Wire name of the verdict.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Confirm => "confirm",
            Verdict::Reject => "reject",
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "confirm" => Ok(Verdict::Confirm),
            "reject" => Ok(Verdict::Reject),
            _ => Err(format!("Unknown verdict: {}", s)),
        }
    }
}

/// Feedback on a past analysis, fed back into later prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub analysis_id: Uuid,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl FeedbackItem {
    /// Create feedback stamped with the current time.
    pub fn new(analysis_id: Uuid, verdict: Verdict) -> Self {
        Self {
            analysis_id,
            verdict,
            comment: None,
            created_at: Utc::now(),
        }
    }

    /// Attach a comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Input of a single analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeParams {
    pub signals: Vec<Signal>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub feedback: Vec<FeedbackItem>,
}

impl AnalyzeParams {
    /// Params with default settings and no feedback.
    pub fn new(signals: Vec<Signal>) -> Self {
        Self {
            signals,
            settings: Settings::default(),
            feedback: Vec::new(),
        }
    }

    /// Set the settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Set prior feedback.
    pub fn with_feedback(mut self, feedback: Vec<FeedbackItem>) -> Self {
        self.feedback = feedback;
        self
    }
}

/// Input of an ensemble analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleParams {
    pub signals: Vec<Signal>,
    /// Thinking levels to run; defaults to all three.
    #[serde(default)]
    pub modes: Option<Vec<ThinkingLevel>>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub feedback: Vec<FeedbackItem>,
}

impl EnsembleParams {
    /// Params for all three levels with default settings.
    pub fn new(signals: Vec<Signal>) -> Self {
        Self {
            signals,
            modes: None,
            settings: Settings::default(),
            feedback: Vec::new(),
        }
    }

    /// Restrict the levels that run.
    pub fn with_modes(mut self, modes: Vec<ThinkingLevel>) -> Self {
        self.modes = Some(modes);
        self
    }

    /// Set prior feedback.
    pub fn with_feedback(mut self, feedback: Vec<FeedbackItem>) -> Self {
        self.feedback = feedback;
        self
    }
}

/// `drift_detected` vote tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftVotes {
    #[serde(rename = "true")]
    pub yes: u32,
    #[serde(rename = "false")]
    pub no: u32,
}

/// Votes for one direction string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionVote {
    pub value: String,
    pub count: u32,
}

/// Evidence grouped by how many analyses produced it.
///
/// Labels stay "out of 3" even when fewer runs succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceAgreement {
    #[serde(rename = "3_of_3")]
    pub three_of_three: Vec<EvidenceItem>,
    #[serde(rename = "2_of_3")]
    pub two_of_three: Vec<EvidenceItem>,
    #[serde(rename = "1_of_3")]
    pub one_of_three: Vec<EvidenceItem>,
}

/// How much the ensemble runs agreed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementReport {
    pub drift_detected_votes: DriftVotes,
    pub confidence_min: f64,
    pub confidence_max: f64,
    pub direction_votes: Vec<DirectionVote>,
    pub evidence_agreement: EvidenceAgreement,
}

/// Failure of one ensemble run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleErrorItem {
    pub mode: ThinkingLevel,
    pub code: String,
    pub message: String,
}

/// Ensemble bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleMeta {
    pub modes: Vec<ThinkingLevel>,
    pub duration_ms: u64,
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<EnsembleErrorItem>>,
}

/// Combined ensemble output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResponse {
    pub analysis_id: Uuid,
    /// One per successful level, in level order.
    pub analyses: Vec<AnalysisResult>,
    pub consensus: AnalysisResult,
    pub agreement: AgreementReport,
    pub meta: EnsembleMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signal_type_field_renamed() {
        let signal: Signal = serde_json::from_value(json!({
            "day": "Day 1",
            "type": "declaration",
            "content": "Build an app."
        }))
        .unwrap();
        assert_eq!(signal.signal_type, SignalType::Declaration);

        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["type"], "declaration");
    }

    #[test]
    fn test_unknown_signal_type_rejected() {
        let result: Result<Signal, _> = serde_json::from_value(json!({
            "day": "Day 1",
            "type": "rumination",
            "content": "x"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings: Settings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.baseline_window_size, 2);
        assert_eq!(settings.current_window_size, 2);
        assert_eq!(settings.thinking_level, ThinkingLevel::Medium);
    }

    #[test]
    fn test_thinking_level_order_and_parse() {
        assert!(ThinkingLevel::Low < ThinkingLevel::Medium);
        assert!(ThinkingLevel::Medium < ThinkingLevel::High);
        assert_eq!("HIGH".parse::<ThinkingLevel>().unwrap(), ThinkingLevel::High);
        assert!("extreme".parse::<ThinkingLevel>().is_err());
        assert_eq!(ThinkingLevel::Low.to_string(), "low");
    }

    #[test]
    fn test_card_title_wire_names() {
        for title in CardTitle::REQUIRED {
            let value = serde_json::to_value(title).unwrap();
            assert_eq!(value, json!(title.as_str()));
        }
        let parsed: Result<CardTitle, _> = serde_json::from_value(json!("Other"));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_agreement_bucket_labels() {
        let agreement = EvidenceAgreement {
            three_of_three: vec![EvidenceItem::new("Day 1", "a")],
            two_of_three: vec![],
            one_of_three: vec![],
        };
        let value = serde_json::to_value(&agreement).unwrap();
        assert_eq!(value["3_of_3"][0]["day"], "Day 1");
        assert!(value["2_of_3"].as_array().unwrap().is_empty());
        assert!(value.get("1_of_3").is_some());

        let votes = serde_json::to_value(DriftVotes { yes: 2, no: 1 }).unwrap();
        assert_eq!(votes, json!({"true": 2, "false": 1}));
    }

    #[test]
    fn test_feedback_item_builder() {
        let id = Uuid::new_v4();
        let item = FeedbackItem::new(id, Verdict::Reject).with_comment("Not a pivot");
        assert_eq!(item.analysis_id, id);
        assert_eq!(item.comment.as_deref(), Some("Not a pivot"));
        assert_eq!(item.verdict.as_str(), "reject");
        assert_eq!("CONFIRM".parse::<Verdict>().unwrap(), Verdict::Confirm);
    }

    #[test]
    fn test_ensemble_meta_omits_empty_errors() {
        let meta = EnsembleMeta {
            modes: ThinkingLevel::ALL.to_vec(),
            duration_ms: 10,
            partial: false,
            errors: None,
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["modes"], json!(["low", "medium", "high"]));
        assert!(value.get("errors").is_none());
    }
}
