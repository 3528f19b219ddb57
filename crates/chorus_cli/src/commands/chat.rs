//! Chat command - Interactive conversation in the terminal.
//!
//! Plain lines are user messages. Lines starting with `/` are commands.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio::task::JoinHandle;
use tracing::warn;

use chorus_core::{ChatEvent, MessageRole, Orchestrator};

use super::{render_failure, render_message, EngineArgs};

#[derive(Args)]
pub struct ChatArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Your display name in the transcript
    #[arg(short, long, env = "CHORUS_USER_NAME")]
    pub name: Option<String>,

    /// Start with paced auto-chat switched off
    #[arg(long)]
    pub no_auto: bool,
}

/// A parsed input line.
#[derive(Debug, PartialEq)]
enum Input {
    Say(String),
    Auto(bool),
    Turns(usize),
    History,
    Agents,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Say(line.to_string());
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("auto"), Some("on")) => Input::Auto(true),
        (Some("auto"), Some("off")) => Input::Auto(false),
        (Some("turns"), Some(n)) => match n.parse::<usize>() {
            Ok(n) if n > 0 => Input::Turns(n),
            _ => Input::Unknown(line.to_string()),
        },
        (Some("turns"), None) => Input::Turns(1),
        (Some("history"), None) => Input::History,
        (Some("agents"), None) => Input::Agents,
        (Some("help"), None) => Input::Help,
        (Some("quit") | Some("exit"), None) => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

const HELP: &str = "Commands: /auto on|off, /turns N, /history, /agents, /help, /quit";

pub async fn execute(args: ChatArgs) -> Result<()> {
    let mut conversation = args.engine.conversation_config()?;
    if args.no_auto {
        conversation = conversation.with_auto_chat(false);
    }
    let orchestrator = args.engine.start(conversation)?;

    let subscription = orchestrator.subscribe();
    for message in &subscription.history {
        println!("{}", render_message(message));
    }
    let printer = spawn_printer(subscription.events);

    println!(
        "Chatting with {} ({} turns). Auto-chat is {}. {}",
        orchestrator
            .agents()
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        orchestrator.selection_policy(),
        if orchestrator.auto_chat_enabled() { "on" } else { "off" },
        HELP
    );

    let result = read_loop(&orchestrator, args.name.as_deref()).await;

    orchestrator.shutdown().await;
    printer.abort();
    result
}

async fn read_loop(orchestrator: &Arc<Orchestrator>, name: Option<&str>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Empty => {}
            Input::Say(text) => {
                orchestrator.submit_user_message(&text, name)?;
            }
            Input::Auto(enabled) => orchestrator.set_auto_chat(enabled),
            Input::Turns(count) => {
                let generated = orchestrator.run_turns(count).await?;
                if generated.len() < count {
                    println!("({} of {} turns completed)", generated.len(), count);
                }
            }
            Input::History => {
                for message in orchestrator.history() {
                    println!("{}", render_message(&message));
                }
            }
            Input::Agents => {
                for agent in orchestrator.agents() {
                    println!("  {} (talkativeness {})", agent.name, agent.talkativeness);
                }
            }
            Input::Help => println!("{}", HELP),
            Input::Quit => break,
            Input::Unknown(raw) => println!("Unknown command: {}. {}", raw, HELP),
        }
    }
    Ok(())
}

/// Print everything observers hear except the user's own lines.
fn spawn_printer(mut events: Receiver<ChatEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ChatEvent::MessageAppended { message }) => {
                    if message.role != MessageRole::User {
                        println!("{}", render_message(&message));
                    }
                }
                Ok(ChatEvent::GenerationFailed { notice }) => println!("{}", render_failure(&notice)),
                Ok(ChatEvent::AgentsUpdated { names }) => {
                    println!("* Agents: {}", names.join(", "))
                }
                Ok(ChatEvent::AutoChatToggled { enabled }) => {
                    println!("* Auto-chat {}", if enabled { "on" } else { "off" })
                }
                Err(RecvError::Lagged(skipped)) => warn!("Display fell behind by {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
