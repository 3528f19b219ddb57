//! Simulate command - Run a fixed number of turns and print the transcript.

use anyhow::Result;
use clap::Args;
use tracing::info;

use chorus_core::ChatEvent;

use super::{render_failure, render_message, EngineArgs};

#[derive(Args)]
pub struct SimulateArgs {
    /// Opening line that starts the conversation
    pub opening: String,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Number of agent turns to run
    #[arg(short, long, default_value_t = 6)]
    pub turns: usize,

    /// Display name for the opening line
    #[arg(long, env = "CHORUS_USER_NAME")]
    pub name: Option<String>,

    /// Print the transcript as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: SimulateArgs) -> Result<()> {
    if args.turns == 0 {
        anyhow::bail!("Invalid argument for --turns: must be at least 1");
    }

    // Batches only; the paced loop would race the requested turn count
    let conversation = args.engine.conversation_config()?.with_auto_chat(false);
    let orchestrator = args.engine.start(conversation)?;

    orchestrator.submit_user_message(&args.opening, args.name.as_deref())?;
    let mut subscription = orchestrator.subscribe();

    let generated = orchestrator.run_turns(args.turns).await?;
    orchestrator.shutdown().await;
    info!("Simulation finished: {}/{} turns", generated.len(), args.turns);

    let mut failure = None;
    while let Ok(event) = subscription.events.try_recv() {
        if let ChatEvent::GenerationFailed { notice } = event {
            failure = Some(notice);
        }
    }

    let history = orchestrator.history();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&history)?);
    } else {
        for message in &history {
            println!("{}", render_message(message));
        }
        if let Some(notice) = &failure {
            println!("{}", render_failure(notice));
        }
    }

    match failure {
        Some(notice) if generated.is_empty() => {
            anyhow::bail!("No agent produced a reply: {}", notice.reason)
        }
        _ => Ok(()),
    }
}
