//! Chorus CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Configuration error

use std::process::ExitCode;

use chorus_core::CoreError;
use chorus_llm::LlmError;
use clap::Parser;
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIGURATION: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "chorus=debug"
    } else if cli.quiet {
        "chorus=error"
    } else {
        "chorus=info"
    };
    let mut filter = EnvFilter::from_default_env();
    for directive in [level, "warn"] {
        if let Ok(directive) = directive.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    // Already initialized is fine
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let result = match cli.command {
        Commands::Chat(args) => commands::chat::execute(args).await,
        Commands::Simulate(args) => commands::simulate::execute(args).await,
        Commands::Agents(args) => commands::agents::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<CoreError>() {
        return match err {
            CoreError::InvalidInput(_) | CoreError::InvalidAgent(_) | CoreError::RosterNotFound(_) => {
                ExitCodes::INVALID_ARGS
            }
            CoreError::Gateway(inner) if inner.is_configuration() => ExitCodes::CONFIGURATION,
            CoreError::Serialization(_) => ExitCodes::CONFIGURATION,
            _ => ExitCodes::GENERAL_ERROR,
        };
    }
    if let Some(err) = e.downcast_ref::<LlmError>() {
        return if err.is_configuration() {
            ExitCodes::CONFIGURATION
        } else {
            ExitCodes::GENERAL_ERROR
        };
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("not configured") || msg.contains("api key") {
        ExitCodes::CONFIGURATION
    } else if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
