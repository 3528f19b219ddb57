//! Error types for the conversation engine.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur at the trigger boundary or during setup.
///
/// Generation failures inside a turn are not errors at this level; they come
/// back as `TurnOutcome::Failed` so the conversation keeps going.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid agent definition: {0}")]
    InvalidAgent(String),

    #[error("Roster file not found: {0}")]
    RosterNotFound(String),

    #[error("Model gateway error: {0}")]
    Gateway(#[from] chorus_llm::LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
