//! The generation capability and provider resolution.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::anthropic::AnthropicBackend;
use crate::config::{LlmConfig, LlmProvider};
use crate::error::{LlmError, LlmResult};
use crate::ollama::OllamaBackend;
use crate::openai::ChatCompletionsBackend;

/// A language-model backend that turns an instruction pair into text.
///
/// Implementations own their request construction and response-field
/// extraction. Every failure (transport, timeout, status, missing field,
/// missing credential) comes back as an `Err`; successful text is trimmed
/// and never empty.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Generate the next piece of text for a system/user instruction pair.
    async fn generate(&self, system: &str, user: &str) -> LlmResult<String>;
}

/// Resolve the configured provider into a gateway handle.
///
/// Called once at startup. A missing credential does not fail here; the
/// returned gateway reports it on every `generate` call instead.
pub fn resolve_gateway(config: &LlmConfig) -> LlmResult<Arc<dyn ModelGateway>> {
    let client = build_client(config.timeout)?;
    let endpoint = config.endpoint().clone();

    info!(
        "Using {} backend at {} (model {})",
        config.provider, endpoint.url, endpoint.model
    );

    let gateway: Arc<dyn ModelGateway> = match config.provider {
        LlmProvider::LmStudio | LlmProvider::OpenAI => Arc::new(ChatCompletionsBackend::new(
            config.provider,
            endpoint,
            config.temperature,
            config.max_tokens,
            HttpSettings::new(client, config.timeout),
        )),
        LlmProvider::Ollama => Arc::new(OllamaBackend::new(
            endpoint,
            config.temperature,
            HttpSettings::new(client, config.timeout),
        )),
        LlmProvider::Anthropic => Arc::new(AnthropicBackend::new(
            endpoint,
            config.temperature,
            config.max_tokens,
            HttpSettings::new(client, config.timeout),
        )),
    };

    Ok(gateway)
}

fn build_client(timeout: Duration) -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::ClientSetup(e.to_string()))
}

/// Shared HTTP client plus the deadline it enforces.
#[derive(Clone)]
pub(crate) struct HttpSettings {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSettings {
    pub(crate) fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// POST a JSON body and decode the JSON reply.
    ///
    /// Non-success statuses, network errors and decode errors all map onto
    /// `LlmError`; nothing is retried.
    pub(crate) async fn post_json<B, R>(
        &self,
        provider: LlmProvider,
        url: &str,
        headers: &[(&str, String)],
        body: &B,
    ) -> LlmResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!("POST {} ({})", url, provider);

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(provider, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                provider: provider.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| self.transport_error(provider, e))?;

        serde_json::from_str(&raw).map_err(|e| LlmError::malformed(provider.as_str(), e.to_string()))
    }

    fn transport_error(&self, provider: LlmProvider, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout {
                provider: provider.to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            LlmError::Transport {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Trim generated text and reject empty completions.
pub(crate) fn finish_text(provider: LlmProvider, text: Option<String>) -> LlmResult<String> {
    let text = text.ok_or_else(|| LlmError::malformed(provider.as_str(), "response has no text field"))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LlmError::malformed(provider.as_str(), "response text is empty"));
    }
    Ok(trimmed.to_string())
}
