//! Prompt framing.
//!
//! The model never sees a chat-completion history of alternating turns.
//! Instead the whole transcript is rendered as a script and the speaking
//! agent is asked for its next line, which lets one prompt impersonate any
//! of the named participants without leaking the others' personas.

use crate::types::{Agent, Message};

const SCRIPT_START: &str = "--- SCRIPT ---";
const SCRIPT_END: &str = "--- END OF SCRIPT ---";

/// A model-ready instruction pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Renders a transcript and persona into a [`Prompt`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the instruction pair for `agent` speaking next.
    pub fn build(&self, agent: &Agent, messages: &[Message]) -> Prompt {
        Prompt {
            system: self.system_instruction(agent, messages),
            user: self.user_instruction(agent, messages),
        }
    }

    fn system_instruction(&self, agent: &Agent, messages: &[Message]) -> String {
        let mut out = String::new();
        if !agent.system_prompt.trim().is_empty() {
            out.push_str(agent.system_prompt.trim());
            out.push_str("\n\n");
        }

        out.push_str(&format!(
            "You are {name}, one participant in a group conversation.\n\
             - Stay in character as {name} at all times.\n\
             - When you build on something another participant said, address them by name.\n\
             - Never reply to your own previous line.",
            name = agent.name
        ));

        let others = other_participants(&agent.name, messages);
        if !others.is_empty() {
            out.push_str(&format!("\n- Other participants so far: {}.", others.join(", ")));
        }
        out
    }

    fn user_instruction(&self, agent: &Agent, messages: &[Message]) -> String {
        let mut out = format!(
            "This is the script of a conversation between you ({}) and the other participants.\n",
            agent.name
        );
        out.push_str(SCRIPT_START);
        out.push('\n');
        out.push_str(&render_script(messages));
        out.push_str(SCRIPT_END);
        out.push_str("\n\n");

        out.push_str(&format!(
            "It is now your turn. Write only your next line of dialogue as {}, without a name prefix.\n",
            agent.name
        ));
        match reply_target(&agent.name, messages) {
            Some(target) => out.push_str(&format!(
                "Respond to the most recent line not written by you:\n> {}: {}\n",
                target.speaker(),
                target.content
            )),
            None => out.push_str("Nobody else has spoken yet; continue the conversation naturally.\n"),
        }
        out.push_str(
            "If someone asked a question in the recent script that has not been answered yet, answer it.\n",
        );
        out.push_str(&format!(
            "Important: keep your reply concise, {}.",
            agent.response_length_hint.trim()
        ));
        out
    }
}

/// One `speaker: content` line per message, in transcript order.
pub fn render_script(messages: &[Message]) -> String {
    let mut script = String::new();
    for message in messages {
        script.push_str(message.speaker());
        script.push_str(": ");
        script.push_str(&message.content);
        script.push('\n');
    }
    script
}

/// The most recent message not authored by `agent_name`.
pub fn reply_target<'a>(agent_name: &str, messages: &'a [Message]) -> Option<&'a Message> {
    messages.iter().rev().find(|m| m.speaker() != agent_name)
}

fn other_participants(agent_name: &str, messages: &[Message]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for message in messages {
        let speaker = message.speaker();
        if speaker != agent_name && !names.iter().any(|n| n == speaker) {
            names.push(speaker.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_SPEAKER;

    fn conversation() -> Vec<Message> {
        vec![
            Message::user("Should we ship on Friday?", Some("Dana")),
            Message::assistant("Only with a rollback plan.", "Critic"),
            Message::assistant("Ship it with a party!", "Creative"),
        ]
    }

    #[test]
    fn test_render_script_lines() {
        let mut messages = conversation();
        let mut anonymous = Message::user("hello?", None);
        anonymous.speaker_name = String::new();
        messages.push(anonymous);

        let script = render_script(&messages);
        let lines: Vec<_> = script.lines().collect();
        assert_eq!(lines[0], "Dana: Should we ship on Friday?");
        assert_eq!(lines[2], "Creative: Ship it with a party!");
        assert_eq!(lines[3], format!("{}: hello?", DEFAULT_SPEAKER));
    }

    #[test]
    fn test_system_instruction_keeps_persona() {
        let agent = Agent::new("Logic", "You reason step by step.");
        let prompt = PromptBuilder::new().build(&agent, &conversation());

        assert!(prompt.system.starts_with("You reason step by step."));
        assert!(prompt.system.contains("You are Logic"));
        assert!(prompt.system.contains("Never reply to your own previous line"));
        assert!(prompt.system.contains("Dana, Critic, Creative"));
    }

    #[test]
    fn test_user_instruction_embeds_script_and_hint() {
        let agent = Agent::new("Logic", "p").with_response_length("one short sentence");
        let prompt = PromptBuilder::new().build(&agent, &conversation());

        assert!(prompt.user.contains("--- SCRIPT ---\nDana: Should we ship on Friday?\n"));
        assert!(prompt.user.contains("> Creative: Ship it with a party!"));
        assert!(prompt.user.ends_with("keep your reply concise, one short sentence."));
    }

    #[test]
    fn test_reply_target_skips_own_last_line() {
        let messages = conversation();
        let target = reply_target("Creative", &messages).unwrap();
        assert_eq!(target.speaker_name, "Critic");

        let agent = Agent::new("Creative", "p");
        let prompt = PromptBuilder::new().build(&agent, &messages);
        assert!(prompt.user.contains("> Critic: Only with a rollback plan."));
    }

    #[test]
    fn test_no_reply_target_when_only_self() {
        let messages = vec![Message::assistant("Thinking aloud.", "Solo")];
        assert!(reply_target("Solo", &messages).is_none());

        let prompt = PromptBuilder::new().build(&Agent::new("Solo", "p"), &messages);
        assert!(prompt.user.contains("Nobody else has spoken yet"));
        assert!(!prompt.system.contains("Other participants"));
    }
}
