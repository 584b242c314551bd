use serde::{Deserialize, Serialize};

/// One content block in a Gemini conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Text part of a content block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// MIME type requested for every completion.
pub const JSON_MIME_TYPE: &str = "application/json";

/// Generation parameters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub response_mime_type: String,
}

/// Safety filter override
#[derive(Debug, Clone, Serialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

/// Body of `models/{model}:generateContent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
    pub safety_settings: Vec<SafetySetting>,
}

/// Response of `generateContent`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub model_version: Option<String>,
}

/// One response candidate
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

/// Response of the model listing endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    pub next_page_token: Option<String>,
}

/// Model metadata from the listing endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Fully qualified name, e.g. `models/gemini-3-pro`.
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

/// Google API error envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Google API error detail
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub code: Option<u16>,
    pub message: Option<String>,
    pub status: Option<String>,
}

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

impl GenerateContentRequest {
    /// Single-turn text request with permissive safety filters.
    pub fn from_prompt(prompt: impl Into<String>, temperature: f64) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.into()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature,
                response_mime_type: JSON_MIME_TYPE.to_string(),
            },
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: "BLOCK_NONE".to_string(),
                })
                .collect(),
        }
    }
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.first())
            .and_then(|part| part.text.as_deref())
    }

    /// Finish reason of the first candidate, if any.
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
    }
}

impl ModelInfo {
    /// Model identifier without the `models/` prefix.
    pub fn short_name(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    /// Whether the model can serve `generateContent`.
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

impl ApiErrorResponse {
    /// Whether the error body reports a missing model.
    pub fn is_not_found(&self) -> bool {
        self.error.code == Some(404)
            || self
                .error
                .status
                .as_deref()
                .map(|s| s.eq_ignore_ascii_case("NOT_FOUND"))
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateContentRequest::from_prompt("hello", 0.1);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["generationConfig"]["temperature"], 0.1);
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(value["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(value["safetySettings"][0]["threshold"], "BLOCK_NONE");
    }

    #[test]
    fn test_response_first_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"a\":1}"}]},
                "finishReason": "STOP"
            }],
            "modelVersion": "gemini-3-pro-preview"
        }))
        .unwrap();

        assert_eq!(response.first_text(), Some("{\"a\":1}"));
        assert_eq!(response.finish_reason(), Some("STOP"));
        assert_eq!(response.model_version.as_deref(), Some("gemini-3-pro-preview"));
    }

    #[test]
    fn test_response_without_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert!(response.first_text().is_none());
        assert!(response.finish_reason().is_none());
    }

    #[test]
    fn test_model_info_short_name_and_methods() {
        let info: ModelInfo = serde_json::from_value(json!({
            "name": "models/gemini-3-pro",
            "supportedGenerationMethods": ["generateContent", "countTokens"]
        }))
        .unwrap();

        assert_eq!(info.short_name(), "gemini-3-pro");
        assert!(info.supports_generate_content());

        let embed: ModelInfo = serde_json::from_value(json!({
            "name": "models/text-embedding-004",
            "supportedGenerationMethods": ["embedContent"]
        }))
        .unwrap();
        assert!(!embed.supports_generate_content());
    }

    #[test]
    fn test_api_error_not_found_detection() {
        let err: ApiErrorResponse = serde_json::from_value(json!({
            "error": {"code": 404, "message": "models/x is not found", "status": "NOT_FOUND"}
        }))
        .unwrap();
        assert!(err.is_not_found());

        let err: ApiErrorResponse = serde_json::from_value(json!({
            "error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}
        }))
        .unwrap();
        assert!(!err.is_not_found());
    }
}
