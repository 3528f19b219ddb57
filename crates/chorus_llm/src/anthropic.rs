//! Anthropic messages API backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{LlmProvider, ProviderEndpoint};
use crate::error::{LlmError, LlmResult};
use crate::gateway::{finish_text, HttpSettings, ModelGateway};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicBackend {
    endpoint: ProviderEndpoint,
    temperature: f32,
    max_tokens: u32,
    http: HttpSettings,
}

impl AnthropicBackend {
    pub(crate) fn new(
        endpoint: ProviderEndpoint,
        temperature: f32,
        max_tokens: u32,
        http: HttpSettings,
    ) -> Self {
        Self {
            endpoint,
            temperature,
            max_tokens,
            http,
        }
    }

    fn request(&self, system: &str, user: &str) -> AnthropicRequest {
        // The system instruction travels outside the message list
        AnthropicRequest {
            model: self.endpoint.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: system.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        }
    }
}

#[async_trait]
impl ModelGateway for AnthropicBackend {
    async fn generate(&self, system: &str, user: &str) -> LlmResult<String> {
        let api_key = self
            .endpoint
            .api_key
            .clone()
            .ok_or_else(|| LlmError::not_configured("anthropic", "set ANTHROPIC_API_KEY"))?;
        let headers = [
            ("x-api-key", api_key),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ];

        let response: AnthropicResponse = self
            .http
            .post_json(
                LlmProvider::Anthropic,
                &self.endpoint.url,
                &headers,
                &self.request(system, user),
            )
            .await?;

        finish_text(LlmProvider::Anthropic, extract_text(response))
    }
}

fn extract_text(response: AnthropicResponse) -> Option<String> {
    response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .find_map(|block| block.text)
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_extract_skips_non_text_blocks() {
        let response: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"thinking","thinking":"hm"},{"type":"text","text":"Agreed."}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response), Some("Agreed.".to_string()));
    }

    #[tokio::test]
    async fn test_missing_key_fails_generation() {
        let backend = AnthropicBackend::new(
            ProviderEndpoint::new("https://api.anthropic.com/v1/messages", "claude"),
            0.7,
            400,
            HttpSettings::new(reqwest::Client::new(), Duration::from_secs(5)),
        );
        let err = backend.generate("s", "u").await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured { .. }));
    }
}
