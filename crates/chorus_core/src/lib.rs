//! # chorus_core - Conversation Engine for Chorus
//!
//! Several configured AI personas share one transcript with a human user.
//! This crate owns that transcript, picks who speaks next, frames the prompt
//! for the chosen persona and commits the reply.
//!
//! ## Key Concepts
//!
//! - **Agent**: a named persona with a system prompt and a talkativeness weight
//! - **Transcript**: the append-only ordered list of messages
//! - **Turn**: select a speaker, generate a reply, append it
//! - **Paced loop**: a background task that attempts one turn every few seconds
//!   while auto-chat is enabled and something new was said
//! - **Batch**: an explicit request for N consecutive turns
//!
//! All triggers funnel into [`Orchestrator::attempt_turn`], which is the only
//! place messages from agents are appended.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chorus_core::{default_roster, ConversationConfig, Orchestrator};
//! use chorus_llm::LlmConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Arc::new(Orchestrator::from_configs(
//!         &LlmConfig::from_env(),
//!         ConversationConfig::from_env().with_auto_chat(false),
//!     )?);
//!     orchestrator.configure_agents(default_roster())?;
//!     orchestrator.submit_user_message("Is tabs vs spaces still a debate?", Some("Dana"))?;
//!
//!     for message in orchestrator.run_turns(3).await? {
//!         println!("{}: {}", message.speaker_name, message.content);
//!     }
//!     orchestrator.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod roster;
pub mod selector;
pub mod transcript;
pub mod types;

pub use config::{pace_from_secs, ConversationConfig, DEFAULT_PACE_SECONDS};
pub use error::{CoreError, CoreResult};
pub use events::{ChatEvent, FailureNotice, Subscription};
pub use orchestrator::{Orchestrator, SkipReason, TurnOutcome, TurnPhase, TurnTrigger};
pub use prompt::{Prompt, PromptBuilder};
pub use registry::AgentRegistry;
pub use roster::{default_roster, load_roster, validate_roster};
pub use selector::{Selection, SelectionPolicy, TurnSelector};
pub use transcript::Transcript;
pub use types::{Agent, Message, MessageRole, DEFAULT_SPEAKER};
