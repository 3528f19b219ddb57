//! Provider selection and endpoint configuration.
//!
//! Everything here is read once at startup. Defaults first, then any
//! environment variables that are set and parse cleanly.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default generation timeout ceiling.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion length for local backends.
pub const DEFAULT_MAX_TOKENS: u32 = 400;

/// Backend provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Local OpenAI-compatible model server
    LmStudio,
    /// Locally hosted open model runtime
    Ollama,
    /// Hosted OpenAI chat completions
    OpenAI,
    /// Hosted Anthropic messages API
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LmStudio => "lmstudio",
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    /// Whether the provider needs an API key to be reachable.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for LlmProvider {
    fn default() -> Self {
        Self::LmStudio
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lmstudio" | "lm-studio" | "lm_studio" => Ok(Self::LmStudio),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Where one provider lives and which model it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl ProviderEndpoint {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            model: model.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Process-wide model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend that serves every generation for the process lifetime
    pub provider: LlmProvider,
    pub lmstudio: ProviderEndpoint,
    pub ollama: ProviderEndpoint,
    pub openai: ProviderEndpoint,
    pub anthropic: ProviderEndpoint,
    /// Sampling temperature shared by all providers
    pub temperature: f32,
    /// Completion length ceiling
    pub max_tokens: u32,
    /// Hard deadline for one generation request
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            lmstudio: ProviderEndpoint::new(
                "http://localhost:1234/v1/chat/completions",
                "gpt-4o-mini-compat",
            ),
            ollama: ProviderEndpoint::new("http://localhost:11434/api/chat", "llama3.1"),
            openai: ProviderEndpoint::new("https://api.openai.com/v1/chat/completions", "gpt-4o-mini"),
            anthropic: ProviderEndpoint::new(
                "https://api.anthropic.com/v1/messages",
                "claude-sonnet-4-5",
            ),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables.
    ///
    /// Recognized: `PROVIDER`, `LMSTUDIO_URL`, `MODEL`, `OLLAMA_URL`,
    /// `OLLAMA_MODEL`, `OPENAI_URL`, `OPENAI_MODEL`, `OPENAI_API_KEY`,
    /// `ANTHROPIC_URL`, `ANTHROPIC_MODEL`, `ANTHROPIC_API_KEY`,
    /// `TEMPERATURE`, `CHORUS_MAX_TOKENS`, `CHORUS_LLM_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(provider) = get("PROVIDER") {
            match provider.parse() {
                Ok(p) => config.provider = p,
                Err(e) => warn!("Ignoring PROVIDER: {}; using {}", e, config.provider),
            }
        }

        if let Some(url) = get("LMSTUDIO_URL") {
            config.lmstudio.url = url;
        }
        if let Some(model) = get("MODEL") {
            config.lmstudio.model = model;
        }
        if let Some(url) = get("OLLAMA_URL") {
            config.ollama.url = url;
        }
        if let Some(model) = get("OLLAMA_MODEL") {
            config.ollama.model = model;
        }
        if let Some(url) = get("OPENAI_URL") {
            config.openai.url = url;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            config.openai.model = model;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            config.openai = config.openai.with_api_key(key.trim());
        }
        if let Some(url) = get("ANTHROPIC_URL") {
            config.anthropic.url = url;
        }
        if let Some(model) = get("ANTHROPIC_MODEL") {
            config.anthropic.model = model;
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            config.anthropic = config.anthropic.with_api_key(key.trim());
        }

        if let Some(raw) = get("TEMPERATURE") {
            match raw.parse::<f32>() {
                Ok(t) if t.is_finite() && t >= 0.0 => config.temperature = t,
                _ => warn!("Ignoring invalid TEMPERATURE value: {}", raw),
            }
        }
        if let Some(raw) = get("CHORUS_MAX_TOKENS") {
            match raw.parse::<u32>() {
                Ok(n) if n > 0 => config.max_tokens = n,
                _ => warn!("Ignoring invalid CHORUS_MAX_TOKENS value: {}", raw),
            }
        }
        if let Some(raw) = get("CHORUS_LLM_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => warn!("Ignoring invalid CHORUS_LLM_TIMEOUT_SECS value: {}", raw),
            }
        }

        config
    }

    /// Endpoint of the selected provider.
    pub fn endpoint(&self) -> &ProviderEndpoint {
        self.endpoint_for(self.provider)
    }

    pub fn endpoint_for(&self, provider: LlmProvider) -> &ProviderEndpoint {
        match provider {
            LlmProvider::LmStudio => &self.lmstudio,
            LlmProvider::Ollama => &self.ollama,
            LlmProvider::OpenAI => &self.openai,
            LlmProvider::Anthropic => &self.anthropic,
        }
    }

    pub fn with_provider(mut self, provider: LlmProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
