//! Error types for model generation.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur while asking a backend for text.
///
/// Every variant is a generation failure from the caller's point of view:
/// no partial text is ever returned alongside one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM provider '{provider}' is not configured: {reason}")]
    NotConfigured { provider: String, reason: String },

    #[error("Request to {provider} timed out after {seconds} seconds")]
    Timeout { provider: String, seconds: u64 },

    #[error("Network error talking to {provider}: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}

impl LlmError {
    pub(crate) fn not_configured(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotConfigured {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this failure came from configuration rather than the backend.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured { .. } | Self::ClientSetup(_))
    }
}
