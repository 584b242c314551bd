//! Gemini transport for the external reasoning model.
//!
//! The analysis core only sees the [`ReasoningModel`] trait; [`GeminiClient`]
//! is the production implementation over the Gemini REST API.

mod client;
mod types;

pub use client::GeminiClient;
pub use types::*;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ModelResult;

/// Fallback candidates, most preferred first.
pub const MODEL_PREFERENCE_ORDER: [&str; 3] = [
    "gemini-3-pro-preview",
    "gemini-3-pro",
    "gemini-3-flash-preview",
];

/// External reasoning model capability consumed by the analysis core.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningModel: Send + Sync {
    /// Run one generation and return the raw response text.
    async fn generate(&self, prompt: &str, model: &str, timeout: Duration) -> ModelResult<String>;

    /// Identifiers of models currently able to serve generation calls.
    async fn list_available_models(&self) -> ModelResult<Vec<String>>;
}

/// Pick the first preferred model present in `available`, skipping `rejected`.
///
/// A listed identifier matches a preference when it is equal to it or ends
/// with `/{preference}`.
pub fn select_fallback_model(available: &[String], rejected: &str) -> Option<String> {
    MODEL_PREFERENCE_ORDER
        .iter()
        .copied()
        .filter(|preferred| *preferred != rejected)
        .find(|preferred| {
            let suffix = format!("/{}", preferred);
            available
                .iter()
                .any(|m| m.as_str() == *preferred || m.ends_with(&suffix))
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fallback_follows_preference_order() {
        let available = models(&["gemini-3-flash-preview", "gemini-3-pro", "gemini-2.0-flash"]);
        assert_eq!(
            select_fallback_model(&available, "gemini-3-pro-preview"),
            Some("gemini-3-pro".to_string())
        );
    }

    #[test]
    fn test_fallback_skips_rejected_model() {
        let available = models(&["gemini-3-pro-preview", "gemini-3-flash-preview"]);
        assert_eq!(
            select_fallback_model(&available, "gemini-3-pro-preview"),
            Some("gemini-3-flash-preview".to_string())
        );
    }

    #[test]
    fn test_fallback_matches_qualified_names() {
        let available = models(&["tunedModels/gemini-3-pro"]);
        assert_eq!(
            select_fallback_model(&available, "gemini-3-pro-preview"),
            Some("gemini-3-pro".to_string())
        );
    }

    #[test]
    fn test_no_preferred_model_available() {
        let available = models(&["gemini-1.5-flash", "text-embedding-004"]);
        assert_eq!(select_fallback_model(&available, "gemini-3-pro-preview"), None);
        assert_eq!(select_fallback_model(&[], "gemini-3-pro-preview"), None);
    }

    #[test]
    fn test_partial_name_is_not_a_match() {
        let available = models(&["gemini-3-pro-preview-exp"]);
        assert_eq!(select_fallback_model(&available, "custom-model"), None);
    }
}
