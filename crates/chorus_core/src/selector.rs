//! Turn selection: who speaks next.

use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::AgentRegistry;
use crate::transcript::Transcript;
use crate::types::Agent;

/// How the next speaker is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Weighted by talkativeness, never the previous speaker if avoidable
    #[default]
    WeightedRandom,
    /// Registry order, one step per successful turn
    RoundRobin,
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeightedRandom => f.write_str("weighted-random"),
            Self::RoundRobin => f.write_str("round-robin"),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weighted" | "weighted-random" | "weighted_random" | "random" => Ok(Self::WeightedRandom),
            "round-robin" | "round_robin" | "roundrobin" | "rr" => Ok(Self::RoundRobin),
            other => Err(format!("unknown selection policy '{}'", other)),
        }
    }
}

/// The agent picked for a turn and its position in the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub agent: Agent,
    pub index: usize,
}

/// Picks the next speaker from a registry and transcript.
pub struct TurnSelector {
    policy: SelectionPolicy,
    rng: Mutex<StdRng>,
}

impl TurnSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            policy,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible selector for tests and replayable runs.
    pub fn seeded(policy: SelectionPolicy, seed: u64) -> Self {
        Self {
            policy,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Choose one agent, or `None` when the registry is empty.
    pub fn select(&self, registry: &AgentRegistry, transcript: &Transcript) -> Option<Selection> {
        let agents = registry.agents();
        let index = match self.policy {
            SelectionPolicy::WeightedRandom => {
                let last_speaker = transcript.last().map(|m| m.speaker_name.as_str());
                let candidates = eligible_candidates(agents, last_speaker);
                weighted_pick(agents, &candidates, &mut *self.rng.lock())?
            }
            SelectionPolicy::RoundRobin => round_robin_pick(registry)?,
        };

        let agent = agents.get(index)?.clone();
        debug!("Selected {} (index {}, {})", agent.name, index, self.policy);
        Some(Selection { agent, index })
    }
}

/// Registry indices allowed to speak after `last_speaker`.
///
/// Excludes the agent with the last speaker's name; if nobody is left the
/// whole registry is eligible again.
pub fn eligible_candidates(agents: &[Agent], last_speaker: Option<&str>) -> Vec<usize> {
    let all: Vec<usize> = (0..agents.len()).collect();
    let Some(last) = last_speaker else {
        return all;
    };

    let filtered: Vec<usize> = all
        .iter()
        .copied()
        .filter(|&i| agents[i].name != last)
        .collect();

    if filtered.is_empty() {
        all
    } else {
        filtered
    }
}

fn weighted_pick<R: Rng + ?Sized>(agents: &[Agent], candidates: &[usize], rng: &mut R) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    // WeightedIndex panics rather than erroring on an infinite total
    let total: f64 = candidates.iter().map(|&i| agents[i].talkativeness).sum();
    if !total.is_finite() {
        return Some(candidates[rng.gen_range(0..candidates.len())]);
    }

    let weights = candidates.iter().map(|&i| agents[i].talkativeness);
    match WeightedIndex::new(weights) {
        Ok(dist) => Some(candidates[rng.sample(&dist)]),
        // Weights are validated on the way in; stay uniform if one slips through
        Err(_) => Some(candidates[rng.gen_range(0..candidates.len())]),
    }
}

fn round_robin_pick(registry: &AgentRegistry) -> Option<usize> {
    if registry.is_empty() {
        None
    } else {
        Some(registry.rotation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn registry_of(agents: Vec<Agent>) -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry.replace(agents);
        registry
    }

    fn trio() -> Vec<Agent> {
        vec![
            Agent::new("Logic", "p"),
            Agent::new("Creative", "p"),
            Agent::new("Critic", "p"),
        ]
    }

    #[test]
    fn test_huge_weights_fall_back_to_uniform() {
        let registry = registry_of(vec![
            Agent::new("Loud", "p").with_talkativeness(1e308),
            Agent::new("Louder", "p").with_talkativeness(1e308),
        ]);
        let mut transcript = Transcript::new();
        transcript.append(Message::user("hi", None));

        let selector = TurnSelector::seeded(SelectionPolicy::WeightedRandom, 5);
        for _ in 0..20 {
            assert!(selector.select(&registry, &transcript).is_some());
        }
    }

    #[test]
    fn test_empty_registry_has_no_speaker() {
        let registry = AgentRegistry::new();
        let mut transcript = Transcript::new();
        transcript.append(Message::user("hi", None));

        for policy in [SelectionPolicy::WeightedRandom, SelectionPolicy::RoundRobin] {
            assert!(TurnSelector::seeded(policy, 1).select(&registry, &transcript).is_none());
        }
    }

    #[test]
    fn test_never_repeats_previous_speaker() {
        let registry = registry_of(trio());
        let selector = TurnSelector::seeded(SelectionPolicy::WeightedRandom, 7);

        for last in ["Logic", "Creative", "Critic"] {
            let mut transcript = Transcript::new();
            transcript.append(Message::user("hi", None));
            transcript.append(Message::assistant("...", last));

            for _ in 0..500 {
                let pick = selector.select(&registry, &transcript).unwrap();
                assert_ne!(pick.agent.name, last);
            }
        }
    }

    #[test]
    fn test_single_agent_falls_back_to_itself() {
        let registry = registry_of(vec![Agent::new("Solo", "p")]);
        let mut transcript = Transcript::new();
        transcript.append(Message::assistant("me again", "Solo"));

        let selector = TurnSelector::seeded(SelectionPolicy::WeightedRandom, 3);
        for _ in 0..20 {
            assert_eq!(selector.select(&registry, &transcript).unwrap().agent.name, "Solo");
        }
    }

    #[test]
    fn test_frequencies_follow_talkativeness() {
        let registry = registry_of(vec![
            Agent::new("Quiet", "p").with_talkativeness(1.0),
            Agent::new("Normal", "p").with_talkativeness(2.0),
            Agent::new("Chatty", "p").with_talkativeness(5.0),
        ]);
        let mut transcript = Transcript::new();
        transcript.append(Message::user("anyone?", None));

        let selector = TurnSelector::seeded(SelectionPolicy::WeightedRandom, 42);
        let trials = 40_000;
        let mut counts = [0usize; 3];
        for _ in 0..trials {
            counts[selector.select(&registry, &transcript).unwrap().index] += 1;
        }

        let expected = [1.0 / 8.0, 2.0 / 8.0, 5.0 / 8.0];
        for (count, share) in counts.iter().zip(expected) {
            let observed = *count as f64 / trials as f64;
            assert!((observed - share).abs() < 0.02, "observed {} vs {}", observed, share);
        }
    }

    #[test]
    fn test_exclusion_renormalizes_weights() {
        let registry = registry_of(vec![
            Agent::new("A", "p").with_talkativeness(1.0),
            Agent::new("B", "p").with_talkativeness(3.0),
            Agent::new("C", "p").with_talkativeness(10.0),
        ]);
        let mut transcript = Transcript::new();
        transcript.append(Message::assistant("...", "C"));

        let selector = TurnSelector::seeded(SelectionPolicy::WeightedRandom, 9);
        let trials = 20_000;
        let b_count = (0..trials)
            .filter(|_| selector.select(&registry, &transcript).unwrap().agent.name == "B")
            .count();

        let observed = b_count as f64 / trials as f64;
        assert!((observed - 0.75).abs() < 0.02, "observed {}", observed);
    }

    #[test]
    fn test_eligible_candidates() {
        let agents = trio();
        assert_eq!(eligible_candidates(&agents, None), vec![0, 1, 2]);
        assert_eq!(eligible_candidates(&agents, Some("Creative")), vec![0, 2]);
        assert_eq!(eligible_candidates(&agents, Some("User")), vec![0, 1, 2]);

        let solo = vec![Agent::new("Solo", "p")];
        assert_eq!(eligible_candidates(&solo, Some("Solo")), vec![0]);
    }

    #[test]
    fn test_round_robin_visits_in_order() {
        let mut registry = registry_of(trio());
        let transcript = Transcript::new();
        let selector = TurnSelector::seeded(SelectionPolicy::RoundRobin, 0);

        let mut spoken = Vec::new();
        for _ in 0..6 {
            let pick = selector.select(&registry, &transcript).unwrap();
            registry.advance_rotation(registry.generation(), pick.index);
            spoken.push(pick.agent.name);
        }
        assert_eq!(spoken, vec!["Logic", "Creative", "Critic", "Logic", "Creative", "Critic"]);
    }

    #[test]
    fn test_round_robin_resets_on_replace() {
        let mut registry = registry_of(trio());
        let transcript = Transcript::new();
        let selector = TurnSelector::seeded(SelectionPolicy::RoundRobin, 0);

        let pick = selector.select(&registry, &transcript).unwrap();
        registry.advance_rotation(registry.generation(), pick.index);
        assert_eq!(selector.select(&registry, &transcript).unwrap().index, 1);

        registry.replace(trio());
        assert_eq!(selector.select(&registry, &transcript).unwrap().agent.name, "Logic");
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("rr".parse::<SelectionPolicy>(), Ok(SelectionPolicy::RoundRobin));
        assert_eq!("Weighted".parse::<SelectionPolicy>(), Ok(SelectionPolicy::WeightedRandom));
        assert!("lottery".parse::<SelectionPolicy>().is_err());
    }
}
