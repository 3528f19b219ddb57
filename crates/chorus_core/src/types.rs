//! Core types for the conversation engine.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Display name for user input that carries no name.
pub const DEFAULT_SPEAKER: &str = "User";

/// Display name attached to system notices.
pub const SYSTEM_SPEAKER: &str = "System";

/// Length instruction used when an agent does not set one.
pub const DEFAULT_RESPONSE_LENGTH: &str = "at most 3 sentences";

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Assistant,
    User,
}

/// A single transcript entry.
///
/// Messages are immutable once created; the transcript only ever appends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique message ID (UUID)
    pub id: String,
    /// Role of the message sender
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// Who said it
    #[serde(rename = "speakerName")]
    pub speaker_name: String,
    /// Local wall-clock time, `HH:MM`
    pub timestamp: String,
    /// When the message was created
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>, speaker: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            speaker_name: speaker.into(),
            timestamp: clock_label(created_at),
            created_at,
        }
    }

    /// Create a user message; a missing or blank name becomes [`DEFAULT_SPEAKER`].
    pub fn user(content: impl Into<String>, speaker: Option<&str>) -> Self {
        let speaker = speaker
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SPEAKER);
        Self::new(MessageRole::User, content, speaker)
    }

    /// Create a message spoken by an agent
    pub fn assistant(content: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content, agent_name)
    }

    /// Create a system notice
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content, SYSTEM_SPEAKER)
    }

    /// Speaker label as it appears in a script.
    pub fn speaker(&self) -> &str {
        if self.speaker_name.trim().is_empty() {
            DEFAULT_SPEAKER
        } else {
            &self.speaker_name
        }
    }
}

/// `HH:MM` in local time.
pub fn clock_label(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

fn default_talkativeness() -> f64 {
    1.0
}

fn default_response_length() -> String {
    DEFAULT_RESPONSE_LENGTH.to_string()
}

/// A configured persona.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Display name, the agent's identity within a registry
    pub name: String,
    /// Instruction text defining voice and behavior
    #[serde(alias = "system", alias = "system_prompt")]
    pub system_prompt: String,
    /// Relative selection weight
    #[serde(default = "default_talkativeness")]
    pub talkativeness: f64,
    /// Free-text length instruction injected into prompts
    #[serde(
        default = "default_response_length",
        alias = "response_length",
        alias = "response_length_hint"
    )]
    pub response_length_hint: String,
}

impl Agent {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            talkativeness: default_talkativeness(),
            response_length_hint: default_response_length(),
        }
    }

    pub fn with_talkativeness(mut self, weight: f64) -> Self {
        self.talkativeness = weight;
        self
    }

    pub fn with_response_length(mut self, hint: impl Into<String>) -> Self {
        self.response_length_hint = hint.into();
        self
    }

    /// Check the definition before it enters a registry.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidAgent("agent name is empty".to_string()));
        }
        if !self.talkativeness.is_finite() || self.talkativeness <= 0.0 {
            return Err(CoreError::InvalidAgent(format!(
                "talkativeness of '{}' must be a positive number, got {}",
                self.name, self.talkativeness
            )));
        }
        Ok(())
    }
}
