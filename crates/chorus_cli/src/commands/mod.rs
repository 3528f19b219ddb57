//! CLI command definitions.
//!
//! Every subcommand that talks to a model shares [`EngineArgs`], which layer
//! command-line overrides on top of the environment configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use chorus_core::{
    default_roster, load_roster, pace_from_secs, Agent, ConversationConfig, FailureNotice, Message,
    MessageRole, Orchestrator, SelectionPolicy,
};
use chorus_llm::{LlmConfig, LlmProvider};

pub mod agents;
pub mod chat;
pub mod simulate;

/// Chorus - several AI personas, one conversation
#[derive(Parser)]
#[command(name = "chorus")]
#[command(version, about = "Chorus - several AI personas, one conversation")]
#[command(long_about = r#"
Chorus lets a group of configured AI personas talk with you and with each
other. Each persona has its own system prompt and talkativeness weight; a
background loop keeps the conversation going while auto-chat is on.

COMMANDS:
  chat      → Interactive conversation in the terminal
  simulate  → Seed an opening line, run N turns, print the transcript
  agents    → Validate and list an agent roster

PROVIDERS (PROVIDER env var or --provider):
  lmstudio (default), ollama, openai, anthropic

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Talk with the agents interactively
    Chat(chat::ChatArgs),

    /// Run a fixed number of turns from an opening line
    Simulate(simulate::SimulateArgs),

    /// Validate and list an agent roster
    Agents(agents::AgentsArgs),
}

/// Roster location shared by every command.
#[derive(Args, Clone, Default)]
pub struct RosterArgs {
    /// Agent roster file (YAML or JSON); the built-in trio is used otherwise
    #[arg(short, long, env = "CHORUS_ROSTER")]
    pub roster: Option<PathBuf>,
}

impl RosterArgs {
    pub fn load(&self) -> Result<Vec<Agent>> {
        match &self.roster {
            Some(path) => load_roster(path)
                .with_context(|| format!("Failed to load roster {}", path.display())),
            None => Ok(default_roster()),
        }
    }
}

/// Overrides for model and conversation settings.
#[derive(Args, Clone, Default)]
pub struct EngineArgs {
    #[command(flatten)]
    pub roster: RosterArgs,

    /// Model provider (lmstudio, ollama, openai, anthropic)
    #[arg(long)]
    pub provider: Option<LlmProvider>,

    /// Seconds between paced turns
    #[arg(long)]
    pub pace: Option<f64>,

    /// Speaker selection policy (weighted-random, round-robin)
    #[arg(long)]
    pub selection: Option<SelectionPolicy>,

    /// Seed for reproducible speaker selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Model request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl EngineArgs {
    pub fn llm_config(&self) -> LlmConfig {
        let mut config = LlmConfig::from_env();
        if let Some(provider) = self.provider {
            config = config.with_provider(provider);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }

    pub fn conversation_config(&self) -> Result<ConversationConfig> {
        let mut config = ConversationConfig::from_env();
        if let Some(secs) = self.pace {
            let Some(interval) = pace_from_secs(secs) else {
                anyhow::bail!("Invalid argument for --pace: must be a positive number of seconds");
            };
            config = config.with_pace_interval(interval);
        }
        if let Some(policy) = self.selection {
            config = config.with_selection(policy);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        Ok(config)
    }

    /// Resolve the gateway, build the orchestrator and install the roster.
    pub fn start(&self, conversation: ConversationConfig) -> Result<Arc<Orchestrator>> {
        let agents = self.roster.load()?;
        let llm = self.llm_config();
        info!("Using provider {} ({})", llm.provider, llm.endpoint().model);

        let orchestrator = Arc::new(Orchestrator::from_configs(&llm, conversation)?);
        orchestrator.configure_agents(agents)?;
        Ok(orchestrator)
    }
}

/// One transcript line as shown in the terminal.
pub fn render_message(message: &Message) -> String {
    match message.role {
        MessageRole::System => format!("[{}] * {}", message.timestamp, message.content),
        _ => format!("[{}] {}: {}", message.timestamp, message.speaker(), message.content),
    }
}

pub fn render_failure(notice: &FailureNotice) -> String {
    render_message(&notice.to_message())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_engine_overrides() {
        let cli = Cli::try_parse_from([
            "chorus",
            "simulate",
            "Hello there",
            "--turns",
            "4",
            "--provider",
            "ollama",
            "--selection",
            "round-robin",
            "--seed",
            "9",
        ])
        .unwrap();

        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.turns, 4);
                assert_eq!(args.engine.provider, Some(LlmProvider::Ollama));
                assert_eq!(args.engine.selection, Some(SelectionPolicy::RoundRobin));
                assert_eq!(args.engine.conversation_config().unwrap().seed, Some(9));
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_bad_pace_is_rejected() {
        for pace in [0.0, -1.0, 1e30, f64::NAN] {
            let args = EngineArgs {
                pace: Some(pace),
                ..Default::default()
            };
            assert!(args.conversation_config().is_err(), "pace {} accepted", pace);
        }
    }

    #[test]
    fn test_roster_file_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crew.json");
        std::fs::write(&path, r#"[{"name":"Pilot","systemPrompt":"You fly."}]"#).unwrap();

        let args = RosterArgs { roster: Some(path) };
        let agents = args.load().unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "Pilot");

        assert_eq!(RosterArgs::default().load().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_roster_keeps_core_error() {
        let args = RosterArgs {
            roster: Some(PathBuf::from("/no/such/crew.yaml")),
        };
        let err = args.load().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<chorus_core::CoreError>(),
            Some(chorus_core::CoreError::RosterNotFound(_))
        ));
    }

    #[test]
    fn test_render_message() {
        let mut message = Message::assistant("Agreed.", "Critic");
        message.timestamp = "09:15".to_string();
        assert_eq!(render_message(&message), "[09:15] Critic: Agreed.");
    }
}
