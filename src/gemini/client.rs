use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::types::{
    ApiErrorResponse, GenerateContentRequest, GenerateContentResponse, ListModelsResponse,
};
use super::ReasoningModel;
use crate::config::{GeminiConfig, RequestConfig};
use crate::error::{ModelError, ModelResult};

/// Timeout for the model listing call, which only runs on the fallback path.
const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the Gemini `generateContent` API
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    temperature: f64,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: &GeminiConfig, request_config: &RequestConfig) -> ModelResult<Self> {
        let client = Client::builder().build().map_err(ModelError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            temperature: request_config.temperature,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> ModelResult<&str> {
        self.api_key.as_deref().ok_or(ModelError::ApiKeyMissing)
    }

    fn map_send_error(err: reqwest::Error, timeout: Duration) -> ModelError {
        if err.is_timeout() {
            ModelError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        } else {
            ModelError::Http(err)
        }
    }

    async fn error_from_response(model: &str, response: reqwest::Response) -> ModelError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let parsed = serde_json::from_str::<ApiErrorResponse>(&body).ok();
        let not_found = status == StatusCode::NOT_FOUND
            || parsed.as_ref().map(|e| e.is_not_found()).unwrap_or(false);

        if not_found {
            return ModelError::NotFound {
                model: model.to_string(),
            };
        }

        ModelError::Api {
            status: status.as_u16(),
            message: parsed
                .and_then(|e| e.error.message)
                .unwrap_or(body),
        }
    }
}

#[async_trait]
impl ReasoningModel for GeminiClient {
    async fn generate(&self, prompt: &str, model: &str, timeout: Duration) -> ModelResult<String> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let body = GenerateContentRequest::from_prompt(prompt, self.temperature);

        debug!(
            model = %model,
            prompt_chars = prompt.len(),
            timeout_ms = timeout.as_millis(),
            "Calling Gemini"
        );

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, timeout))?;

        if !response.status().is_success() {
            let err = Self::error_from_response(model, response).await;
            error!(
                model = %model,
                error = %err,
                latency_ms = start.elapsed().as_millis(),
                "Gemini call failed"
            );
            return Err(err);
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                ModelError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                }
            }
        })?;

        let text = parsed
            .first_text()
            .ok_or_else(|| ModelError::InvalidResponse {
                message: format!(
                    "Unexpected response format: no candidate text (finish reason: {})",
                    parsed.finish_reason().unwrap_or("none")
                ),
            })?
            .to_string();

        info!(
            model = %model,
            model_version = parsed.model_version.as_deref().unwrap_or("unknown"),
            finish_reason = parsed.finish_reason().unwrap_or("none"),
            latency_ms = start.elapsed().as_millis(),
            "Gemini call succeeded"
        );

        Ok(text)
    }

    async fn list_available_models(&self) -> ModelResult<Vec<String>> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1beta/models", self.base_url);

        let mut available = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("key", api_key), ("pageSize", "1000")])
                .timeout(LIST_MODELS_TIMEOUT);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Self::map_send_error(e, LIST_MODELS_TIMEOUT))?;

            if !response.status().is_success() {
                return Err(Self::error_from_response("models", response).await);
            }

            let page: ListModelsResponse =
                response
                    .json()
                    .await
                    .map_err(|e| ModelError::InvalidResponse {
                        message: format!("Failed to parse model list: {}", e),
                    })?;

            available.extend(
                page.models
                    .iter()
                    .filter(|m| m.supports_generate_content())
                    .map(|m| m.short_name().to_string()),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = available.len(), "Listed available Gemini models");
        Ok(available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = GeminiConfig {
            api_key: Some("test_key".to_string()),
            ..GeminiConfig::default()
        };

        let client = GeminiClient::new(&config, &RequestConfig::default());
        assert!(client.is_ok());
        assert!(client.unwrap().has_api_key());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = GeminiConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..GeminiConfig::default()
        };

        let client = GeminiClient::new(&config, &RequestConfig::default()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_generate_without_key_fails_fast() {
        let client = GeminiClient::new(&GeminiConfig::default(), &RequestConfig::default())
            .unwrap();

        let result = client
            .generate("prompt", "gemini-3-pro", Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(ModelError::ApiKeyMissing)));

        let result = client.list_available_models().await;
        assert!(matches!(result, Err(ModelError::ApiKeyMissing)));
    }
}
