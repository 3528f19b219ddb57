//! Agents command - Validate and list a roster.

use anyhow::Result;
use clap::Args;

use super::RosterArgs;

#[derive(Args)]
pub struct AgentsArgs {
    #[command(flatten)]
    pub roster: RosterArgs,

    /// Print the roster as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: AgentsArgs) -> Result<()> {
    let agents = args.roster.load()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }

    let source = args
        .roster
        .roster
        .as_ref()
        .map_or_else(|| "built-in roster".to_string(), |p| p.display().to_string());
    println!("{} agent(s) in {}:", agents.len(), source);

    let total: f64 = agents.iter().map(|a| a.talkativeness).sum();
    for agent in &agents {
        let share = if total > 0.0 {
            agent.talkativeness / total * 100.0
        } else {
            0.0
        };
        let persona = agent.system_prompt.lines().next().unwrap_or_default();
        println!(
            "  {:<12} weight {:>5.2} ({:>4.1}%)  {}",
            agent.name, agent.talkativeness, share, agent.response_length_hint
        );
        if !persona.is_empty() {
            println!("               {}", persona);
        }
    }
    Ok(())
}
