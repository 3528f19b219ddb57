//! Outbound events for observers of the conversation.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{clock_label, Message};

/// Something observers should hear about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was committed to the transcript
    MessageAppended { message: Message },
    /// A turn attempt failed; nothing was appended
    GenerationFailed { notice: FailureNotice },
    /// The roster was replaced
    AgentsUpdated { names: Vec<String> },
    /// Paced auto-chat was switched on or off
    AutoChatToggled { enabled: bool },
}

/// Human-readable report of a failed turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureNotice {
    /// Agent that was supposed to speak
    pub agent: String,
    /// Why generation failed
    pub reason: String,
    /// Local wall-clock time, `HH:MM`
    pub timestamp: String,
}

impl FailureNotice {
    pub fn new(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            reason: reason.into(),
            timestamp: clock_label(chrono::Utc::now()),
        }
    }

    pub fn text(&self) -> String {
        format!(
            "An error occurred while {} was generating a reply: {}",
            self.agent, self.reason
        )
    }

    /// The notice as a system message, for display only.
    pub fn to_message(&self) -> Message {
        Message::system(self.text())
    }
}

/// What a new observer receives: everything so far, then live events.
///
/// The history and the receiver are taken together under the conversation
/// lock, so no message is missed or seen twice.
#[derive(Debug)]
pub struct Subscription {
    pub history: Vec<Message>,
    pub events: broadcast::Receiver<ChatEvent>,
}
