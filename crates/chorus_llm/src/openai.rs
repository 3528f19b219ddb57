//! OpenAI-style chat completions.
//!
//! Serves both the local LM Studio server and hosted OpenAI; they speak the
//! same wire format and differ only in authentication and length field.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{LlmProvider, ProviderEndpoint};
use crate::error::{LlmError, LlmResult};
use crate::gateway::{finish_text, HttpSettings, ModelGateway};

/// Backend for `/v1/chat/completions` endpoints.
pub struct ChatCompletionsBackend {
    provider: LlmProvider,
    endpoint: ProviderEndpoint,
    temperature: f32,
    max_tokens: u32,
    http: HttpSettings,
}

impl ChatCompletionsBackend {
    pub(crate) fn new(
        provider: LlmProvider,
        endpoint: ProviderEndpoint,
        temperature: f32,
        max_tokens: u32,
        http: HttpSettings,
    ) -> Self {
        Self {
            provider,
            endpoint,
            temperature,
            max_tokens,
            http,
        }
    }

    fn request(&self, system: &str, user: &str) -> ChatCompletionRequest {
        let hosted = self.provider == LlmProvider::OpenAI;
        ChatCompletionRequest {
            model: self.endpoint.model.clone(),
            messages: vec![
                ChatCompletionMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatCompletionMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: (!hosted).then_some(self.max_tokens),
            max_completion_tokens: hosted.then_some(self.max_tokens),
        }
    }

    fn headers(&self) -> LlmResult<Vec<(&'static str, String)>> {
        if !self.provider.requires_api_key() {
            return Ok(Vec::new());
        }
        match &self.endpoint.api_key {
            Some(key) => Ok(vec![("Authorization", format!("Bearer {}", key))]),
            None => Err(LlmError::not_configured(
                self.provider.as_str(),
                "set OPENAI_API_KEY",
            )),
        }
    }
}

#[async_trait]
impl ModelGateway for ChatCompletionsBackend {
    async fn generate(&self, system: &str, user: &str) -> LlmResult<String> {
        if self.endpoint.url.is_empty() {
            return Err(LlmError::not_configured(self.provider.as_str(), "endpoint URL is empty"));
        }
        let headers = self.headers()?;
        let request = self.request(system, user);

        let response: ChatCompletionResponse = self
            .http
            .post_json(self.provider, &self.endpoint.url, &headers, &request)
            .await?;

        extract_text(self.provider, response)
    }
}

fn extract_text(provider: LlmProvider, response: ChatCompletionResponse) -> LlmResult<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);
    finish_text(provider, content)
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: Option<ChatCompletionResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn backend(provider: LlmProvider, api_key: Option<&str>) -> ChatCompletionsBackend {
        let mut endpoint = ProviderEndpoint::new("http://localhost:1234/v1/chat/completions", "local-model");
        if let Some(key) = api_key {
            endpoint = endpoint.with_api_key(key);
        }
        ChatCompletionsBackend::new(
            provider,
            endpoint,
            0.7,
            400,
            HttpSettings::new(reqwest::Client::new(), Duration::from_secs(5)),
        )
    }

    #[test]
    fn test_local_request_shape() {
        let request = backend(LlmProvider::LmStudio, None).request("be terse", "script");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "local-model");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "script");
        assert_eq!(json["max_tokens"], 400);
        assert!(json.get("max_completion_tokens").is_none());
    }

    #[test]
    fn test_hosted_request_uses_completion_tokens() {
        let request = backend(LlmProvider::OpenAI, Some("sk-test")).request("s", "u");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_completion_tokens"], 400);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_extract_text_from_choice() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Sure thing. "}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(LlmProvider::LmStudio, response).unwrap(), "Sure thing.");
    }

    #[test]
    fn test_extract_text_without_choices_fails() {
        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            extract_text(LlmProvider::LmStudio, response),
            Err(LlmError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_hosted_without_key_is_configuration_error() {
        let err = backend(LlmProvider::OpenAI, None)
            .generate("system", "user")
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
