//! Ollama `/api/chat` backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{LlmProvider, ProviderEndpoint};
use crate::error::{LlmError, LlmResult};
use crate::gateway::{finish_text, HttpSettings, ModelGateway};

pub struct OllamaBackend {
    endpoint: ProviderEndpoint,
    temperature: f32,
    http: HttpSettings,
}

impl OllamaBackend {
    pub(crate) fn new(endpoint: ProviderEndpoint, temperature: f32, http: HttpSettings) -> Self {
        Self {
            endpoint,
            temperature,
            http,
        }
    }

    fn request(&self, system: &str, user: &str) -> OllamaRequest {
        OllamaRequest {
            model: self.endpoint.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl ModelGateway for OllamaBackend {
    async fn generate(&self, system: &str, user: &str) -> LlmResult<String> {
        if self.endpoint.url.is_empty() {
            return Err(LlmError::not_configured("ollama", "endpoint URL is empty"));
        }
        let request = self.request(system, user);
        let response: OllamaResponse = self
            .http
            .post_json(LlmProvider::Ollama, &self.endpoint.url, &[], &request)
            .await?;

        finish_text(LlmProvider::Ollama, response.message.and_then(|m| m.content))
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    // One JSON object back instead of an NDJSON stream
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: Option<String>,
}
