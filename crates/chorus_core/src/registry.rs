//! Registry of the personas currently allowed to speak.

use tracing::debug;

use crate::types::Agent;

/// The current agent roster plus the round-robin position tied to it.
///
/// The roster is only ever swapped wholesale. Each swap bumps the
/// generation counter and resets the rotation, so turn state captured
/// against an older roster can be recognized as stale.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    generation: u64,
    rotation: usize,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole roster. Returns the new generation.
    pub fn replace(&mut self, agents: Vec<Agent>) -> u64 {
        self.agents = agents;
        self.generation += 1;
        self.rotation = 0;
        debug!(
            "Registry generation {} with {} agent(s)",
            self.generation,
            self.agents.len()
        );
        self.generation
    }

    /// Copy of the roster in registry order.
    pub fn current_agents(&self) -> Vec<Agent> {
        self.agents.clone()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Round-robin position, already reduced modulo the roster size.
    pub fn rotation(&self) -> usize {
        if self.agents.is_empty() {
            0
        } else {
            self.rotation % self.agents.len()
        }
    }

    /// Move the rotation past `spoken_index` after a successful turn.
    ///
    /// Ignored when the roster was replaced since the turn was selected.
    pub fn advance_rotation(&mut self, selected_generation: u64, spoken_index: usize) -> bool {
        if selected_generation != self.generation || self.agents.is_empty() {
            return false;
        }
        self.rotation = (spoken_index + 1) % self.agents.len();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(names: &[&str]) -> Vec<Agent> {
        names.iter().map(|n| Agent::new(*n, "prompt")).collect()
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut registry = AgentRegistry::new();
        assert!(registry.is_empty());

        registry.replace(roster(&["A", "B"]));
        registry.replace(roster(&["C"]));

        assert_eq!(registry.names(), vec!["C".to_string()]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.generation(), 2);
    }

    #[test]
    fn test_replace_resets_rotation() {
        let mut registry = AgentRegistry::new();
        let generation = registry.replace(roster(&["A", "B", "C"]));
        assert!(registry.advance_rotation(generation, 1));
        assert_eq!(registry.rotation(), 2);

        registry.replace(roster(&["A", "B", "C"]));
        assert_eq!(registry.rotation(), 0);
    }

    #[test]
    fn test_stale_generation_does_not_advance() {
        let mut registry = AgentRegistry::new();
        let old = registry.replace(roster(&["A", "B"]));
        registry.replace(roster(&["X", "Y"]));

        assert!(!registry.advance_rotation(old, 0));
        assert_eq!(registry.rotation(), 0);
    }

    #[test]
    fn test_rotation_wraps() {
        let mut registry = AgentRegistry::new();
        let generation = registry.replace(roster(&["A", "B"]));
        registry.advance_rotation(generation, 1);
        assert_eq!(registry.rotation(), 0);
    }
}
