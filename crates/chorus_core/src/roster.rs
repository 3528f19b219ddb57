//! Agent roster loading and validation.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::types::Agent;

/// Roster files may be a bare list or wrapped in an `agents:` key.
#[derive(Deserialize)]
#[serde(untagged)]
enum RosterFile {
    List(Vec<Agent>),
    Wrapped { agents: Vec<Agent> },
}

/// The three personas used when no roster is supplied.
pub fn default_roster() -> Vec<Agent> {
    vec![
        Agent::new(
            "Logic",
            "You are a rigorous advisor who prefers strict logical reasoning. \
             Make premises explicit and answer concisely, step by step.",
        ),
        Agent::new(
            "Creative",
            "You are a catalyst for ideas. Offer short proposals built on metaphor and association.",
        ),
        Agent::new(
            "Critic",
            "You are a constructive critic. Point out risks, counterexamples and pitfalls.",
        ),
    ]
}

/// Load a roster from a YAML or JSON file and validate it.
pub fn load_roster(path: impl AsRef<Path>) -> CoreResult<Vec<Agent>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CoreError::RosterNotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("json"));

    let file: RosterFile = if is_json {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    let agents = match file {
        RosterFile::List(agents) | RosterFile::Wrapped { agents } => agents,
    };

    validate_roster(&agents)?;
    debug!("Loaded {} agent(s) from {:?}", agents.len(), path);
    Ok(agents)
}

/// Validate every agent and the combined talkativeness.
///
/// Duplicate names are allowed but reported, since speaker exclusion keys
/// on the name.
pub fn validate_roster(agents: &[Agent]) -> CoreResult<()> {
    let mut seen = HashSet::new();
    for agent in agents {
        agent.validate()?;
        if !seen.insert(agent.name.as_str()) {
            warn!("Duplicate agent name '{}' in roster", agent.name);
        }
    }

    let total: f64 = agents.iter().map(|a| a.talkativeness).sum();
    if !total.is_finite() {
        return Err(CoreError::InvalidAgent(
            "combined talkativeness of the roster is too large".to_string(),
        ));
    }
    Ok(())
}
