//! Gemini `generateContent` client.

use async_trait::async_trait;
use tracing::{debug, error, instrument};

use crate::google::types::{
    GeminiConfig, GeminiContent, GeminiPart, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig,
};
use crate::provider::{
    GenerationRequest, GenerativeModel, ModelRole, ProviderError, ProviderResult,
};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Gemini model over the public REST API.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a provider with its own HTTP client.
    #[must_use]
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a provider sharing an HTTP client.
    #[must_use]
    pub fn with_client(config: GeminiConfig, client: reqwest::Client) -> Self {
        debug!(model = %config.model, base_url = %config.base_url, "Gemini provider initialized");
        Self { config, client }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_body(request: &GenerationRequest) -> GenerateContentRequest {
        let contents = request
            .turns
            .iter()
            .map(|turn| GeminiContent {
                role: Some(
                    match turn.role {
                        ModelRole::User => "user",
                        ModelRole::Model => "model",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: Some(turn.text.clone()),
                }],
            })
            .collect();

        let p = request.params;
        GenerateContentRequest {
            contents,
            generation_config: GenerationConfig {
                max_output_tokens: Some(p.max_output_tokens),
                temperature: Some(p.temperature),
                top_p: Some(p.top_p),
                top_k: Some(p.top_k),
            },
        }
    }
}

#[async_trait]
impl GenerativeModel for GeminiProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(model = %self.config.model, turns = request.turns.len()))]
    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        let body = Self::build_body(request);

        let response = self
            .client
            .post(self.api_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let (message, code) = parse_api_error(&body_text, status.as_u16());
            error!(
                status = status.as_u16(),
                code = code.as_deref().unwrap_or("unknown"),
                "Gemini API error"
            );
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
                code,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes)?;
        parsed.first_text().ok_or_else(|| ProviderError::InvalidResponse {
            message: "response has no candidate text".into(),
        })
    }
}

/// Extract `(message, status)` from a Gemini error body.
fn parse_api_error(body: &str, status: u16) -> (String, Option<String>) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => {
            let error = &json["error"];
            let message = error["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string();
            let code = error["status"].as_str().map(String::from);
            (message, code)
        }
        Err(_) => (format!("HTTP {status}: {body}"), None),
    }
}
