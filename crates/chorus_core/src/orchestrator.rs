//! Conversation driver and pacing loop.
//!
//! One [`Orchestrator`] owns all shared conversation state behind a single
//! coarse lock. Every trigger (a paced tick, a user message, a batch
//! request) goes through the same turn attempt:
//!
//! ```text
//! Idle ──▶ SelectingAgent ──▶ Generating ──▶ Appending ──▶ Idle
//!   │            │                 │
//!   └─ no input  └─ nobody         └─ failure ──▶ Idle
//! ```
//!
//! The lock is held while selecting and while appending, never while the
//! model gateway is working.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chorus_llm::{resolve_gateway, LlmConfig, ModelGateway};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConversationConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{ChatEvent, FailureNotice, Subscription};
use crate::prompt::{Prompt, PromptBuilder};
use crate::registry::AgentRegistry;
use crate::roster::validate_roster;
use crate::selector::{Selection, SelectionPolicy, TurnSelector};
use crate::transcript::Transcript;
use crate::types::{Agent, Message};

/// What started a turn attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnTrigger {
    /// A tick of the paced loop; honors the auto-chat flag
    Paced,
    /// An explicit request for turns; runs regardless of auto-chat
    Batch,
}

/// Where a turn attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    SelectingAgent,
    Generating,
    Appending,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::SelectingAgent => "selecting-agent",
            Self::Generating => "generating",
            Self::Appending => "appending",
        };
        f.write_str(label)
    }
}

/// Why a turn attempt did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AutoChatDisabled,
    NoAgents,
    EmptyTranscript,
    NoEligibleSpeaker,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AutoChatDisabled => "auto-chat is disabled",
            Self::NoAgents => "no agents configured",
            Self::EmptyTranscript => "transcript is empty",
            Self::NoEligibleSpeaker => "no eligible speaker",
        };
        f.write_str(label)
    }
}

/// Result of one turn attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// A new message was committed and broadcast
    Appended(Message),
    /// Nothing happened
    Skipped(SkipReason),
    /// Generation failed; the transcript is unchanged
    Failed(FailureNotice),
}

impl TurnOutcome {
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Appended(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended(_))
    }
}

/// Everything guarded by the conversation lock.
struct ConversationState {
    transcript: Transcript,
    registry: AgentRegistry,
    auto_chat: bool,
    /// Transcript length last consumed by the paced loop
    watermark: usize,
}

/// Work captured under the lock for one attempt.
struct TurnTicket {
    selection: Selection,
    prompt: Prompt,
    generation: u64,
}

struct Pacer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

enum PacerSlot {
    NotStarted,
    Running(Pacer),
    Stopped,
}

/// The multi-agent conversation engine.
///
/// Construct once per process and share through an `Arc`.
pub struct Orchestrator {
    state: Mutex<ConversationState>,
    selector: TurnSelector,
    prompts: PromptBuilder,
    gateway: Arc<dyn ModelGateway>,
    events: broadcast::Sender<ChatEvent>,
    pace_interval: Duration,
    pacer: Mutex<PacerSlot>,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn ModelGateway>, config: ConversationConfig) -> Self {
        let selector = match config.seed {
            Some(seed) => TurnSelector::seeded(config.selection, seed),
            None => TurnSelector::new(config.selection),
        };
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            state: Mutex::new(ConversationState {
                transcript: Transcript::new(),
                registry: AgentRegistry::new(),
                auto_chat: config.auto_chat,
                watermark: 0,
            }),
            selector,
            prompts: PromptBuilder::new(),
            gateway,
            events,
            pace_interval: config.pace_interval,
            pacer: Mutex::new(PacerSlot::NotStarted),
        }
    }

    /// Resolve the configured provider and build an orchestrator on it.
    pub fn from_configs(llm: &LlmConfig, config: ConversationConfig) -> CoreResult<Self> {
        let gateway = resolve_gateway(llm)?;
        Ok(Self::new(gateway, config))
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        self.selector.policy()
    }

    // ------------------------------------------------------------------
    // Inbound triggers
    // ------------------------------------------------------------------

    /// Replace the agent roster.
    ///
    /// The first non-empty roster starts the paced loop.
    pub fn configure_agents(self: &Arc<Self>, agents: Vec<Agent>) -> CoreResult<()> {
        validate_roster(&agents)?;
        let has_agents = !agents.is_empty();

        {
            let mut state = self.state.lock();
            state.registry.replace(agents);
            let names = state.registry.names();
            info!(
                "Agents updated ({}): [{}]",
                state.registry.len(),
                names.join(", ")
            );
            let _ = self.events.send(ChatEvent::AgentsUpdated { names });
        }

        if has_agents {
            self.ensure_pacing_loop();
        }
        Ok(())
    }

    /// Append a user message and broadcast it.
    pub fn submit_user_message(&self, text: &str, speaker: Option<&str>) -> CoreResult<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::InvalidInput("message text is empty".to_string()));
        }

        let message = Message::user(text, speaker);
        let mut state = self.state.lock();
        state.transcript.append(message.clone());
        info!("{}: {}", message.speaker_name, message.content);
        let _ = self.events.send(ChatEvent::MessageAppended {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Switch paced auto-chat on or off. Batches are unaffected.
    pub fn set_auto_chat(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.auto_chat = enabled;
        info!("Auto-chat {}", if enabled { "enabled" } else { "disabled" });
        let _ = self.events.send(ChatEvent::AutoChatToggled { enabled });
    }

    /// Run up to `count` turns back to back.
    ///
    /// Stops at the first attempt that does nothing or fails and returns
    /// the messages that were appended.
    pub async fn run_turns(&self, count: usize) -> CoreResult<Vec<Message>> {
        if count == 0 {
            return Err(CoreError::InvalidInput("turn count must be positive".to_string()));
        }

        let mut generated = Vec::with_capacity(count);
        for turn in 1..=count {
            match self.attempt_turn(TurnTrigger::Batch).await {
                TurnOutcome::Appended(message) => generated.push(message),
                TurnOutcome::Skipped(reason) => {
                    debug!("Batch stopped at turn {}/{}: {}", turn, count, reason);
                    break;
                }
                TurnOutcome::Failed(notice) => {
                    debug!("Batch stopped at turn {}/{}: {}", turn, count, notice.reason);
                    break;
                }
            }
        }
        Ok(generated)
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// History so far plus a receiver for everything after it.
    pub fn subscribe(&self) -> Subscription {
        let state = self.state.lock();
        Subscription {
            history: state.transcript.snapshot(),
            events: self.events.subscribe(),
        }
    }

    pub fn history(&self) -> Vec<Message> {
        self.state.lock().transcript.snapshot()
    }

    pub fn transcript_len(&self) -> usize {
        self.state.lock().transcript.len()
    }

    pub fn agents(&self) -> Vec<Agent> {
        self.state.lock().registry.current_agents()
    }

    pub fn auto_chat_enabled(&self) -> bool {
        self.state.lock().auto_chat
    }

    /// Transcript length last consumed by the paced loop.
    pub fn watermark(&self) -> usize {
        self.state.lock().watermark
    }

    // ------------------------------------------------------------------
    // Turn primitive
    // ------------------------------------------------------------------

    /// Perform one turn attempt.
    pub async fn attempt_turn(&self, trigger: TurnTrigger) -> TurnOutcome {
        let ticket = match self.prepare_turn(trigger) {
            Ok(ticket) => ticket,
            Err(reason) => {
                debug!("Turn skipped ({:?}): {}", trigger, reason);
                return TurnOutcome::Skipped(reason);
            }
        };

        let agent_name = ticket.selection.agent.name.clone();
        debug!("[{}] {} is thinking...", TurnPhase::Generating, agent_name);

        match self
            .gateway
            .generate(&ticket.prompt.system, &ticket.prompt.user)
            .await
        {
            Ok(text) => TurnOutcome::Appended(self.commit_turn(ticket, text)),
            Err(err) => {
                let notice = FailureNotice::new(&agent_name, err.to_string());
                warn!("{}", notice.text());
                let _ = self.events.send(ChatEvent::GenerationFailed {
                    notice: notice.clone(),
                });
                TurnOutcome::Failed(notice)
            }
        }
    }

    fn prepare_turn(&self, trigger: TurnTrigger) -> Result<TurnTicket, SkipReason> {
        let state = self.state.lock();

        if trigger == TurnTrigger::Paced && !state.auto_chat {
            return Err(SkipReason::AutoChatDisabled);
        }
        if state.registry.is_empty() {
            return Err(SkipReason::NoAgents);
        }
        if state.transcript.is_empty() {
            return Err(SkipReason::EmptyTranscript);
        }

        debug!("[{}] {:?} trigger", TurnPhase::SelectingAgent, trigger);
        let selection = self
            .selector
            .select(&state.registry, &state.transcript)
            .ok_or(SkipReason::NoEligibleSpeaker)?;
        let prompt = self
            .prompts
            .build(&selection.agent, state.transcript.messages());

        Ok(TurnTicket {
            selection,
            prompt,
            generation: state.registry.generation(),
        })
    }

    fn commit_turn(&self, ticket: TurnTicket, text: String) -> Message {
        let message = Message::assistant(text, ticket.selection.agent.name.clone());

        let mut state = self.state.lock();
        debug!("[{}] {}", TurnPhase::Appending, message.speaker_name);
        state.transcript.append(message.clone());
        if self.selector.policy() == SelectionPolicy::RoundRobin
            && !state
                .registry
                .advance_rotation(ticket.generation, ticket.selection.index)
        {
            debug!("Roster changed during generation; rotation left at start");
        }
        info!("{}: {}", message.speaker_name, message.content);
        let _ = self.events.send(ChatEvent::MessageAppended {
            message: message.clone(),
        });
        message
    }

    // ------------------------------------------------------------------
    // Paced loop
    // ------------------------------------------------------------------

    /// One tick of the paced loop.
    ///
    /// Returns `None` when there was nothing new to answer. The watermark
    /// moves to the transcript length *before* generation, and is pulled
    /// back below that length when the attempt does not append, so the
    /// same input is tried again on the next tick.
    pub async fn pacing_cycle(&self) -> Option<TurnOutcome> {
        let cycle_start_len = {
            let mut state = self.state.lock();
            let len = state.transcript.len();
            if !state.auto_chat || state.registry.is_empty() || len <= state.watermark {
                return None;
            }
            state.watermark = len;
            len
        };

        let outcome = self.attempt_turn(TurnTrigger::Paced).await;
        if !outcome.is_appended() {
            let mut state = self.state.lock();
            state.watermark = state.watermark.min(cycle_start_len.saturating_sub(1));
            debug!("Watermark rolled back to {}", state.watermark);
        }
        Some(outcome)
    }

    pub fn is_pacing(&self) -> bool {
        matches!(*self.pacer.lock(), PacerSlot::Running(_))
    }

    fn ensure_pacing_loop(self: &Arc<Self>) {
        let mut slot = self.pacer.lock();
        if !matches!(*slot, PacerSlot::NotStarted) {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available; paced loop not started");
                return;
            }
        };

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_pacing_loop(
            Arc::downgrade(self),
            self.pace_interval,
            cancel.clone(),
        ));
        info!("Paced loop started (every {:?})", self.pace_interval);
        *slot = PacerSlot::Running(Pacer { cancel, handle });
    }

    /// Stop the paced loop and wait for an in-flight cycle to finish.
    ///
    /// The loop is never restarted afterwards.
    pub async fn shutdown(&self) {
        let slot = std::mem::replace(&mut *self.pacer.lock(), PacerSlot::Stopped);
        if let PacerSlot::Running(pacer) = slot {
            pacer.cancel.cancel();
            if let Err(e) = pacer.handle.await {
                error!("Paced loop ended abnormally: {}", e);
            }
            info!("Paced loop stopped");
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let PacerSlot::Running(pacer) = &*self.pacer.get_mut() {
            pacer.cancel.cancel();
        }
    }
}

async fn run_pacing_loop(orchestrator: Weak<Orchestrator>, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let Some(orchestrator) = orchestrator.upgrade() else {
            break;
        };
        if let Some(outcome) = orchestrator.pacing_cycle().await {
            match outcome {
                TurnOutcome::Appended(message) => {
                    debug!("Paced turn by {}", message.speaker_name)
                }
                TurnOutcome::Skipped(reason) => debug!("Paced turn skipped: {}", reason),
                TurnOutcome::Failed(notice) => debug!("Paced turn failed for {}", notice.agent),
            }
        }
    }
    debug!("[{}] paced loop exiting", TurnPhase::Idle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chorus_llm::{LlmError, LlmResult};
    use mockall::mock;
    use mockall::predicate::always;

    mock! {
        pub Model {}

        #[async_trait]
        impl ModelGateway for Model {
            async fn generate(&self, system: &str, user: &str) -> LlmResult<String>;
        }
    }

    fn quiet_config() -> ConversationConfig {
        ConversationConfig::default()
            .with_pace_interval(Duration::from_secs(3600))
            .with_seed(11)
    }

    #[tokio::test]
    async fn test_gateway_sees_persona_and_script() {
        let mut model = MockModel::new();
        model
            .expect_generate()
            .withf(|system, user| system.contains("You are Solo") && user.contains("User: ping"))
            .times(1)
            .returning(|_, _| Ok("pong".to_string()));

        let orchestrator = Arc::new(Orchestrator::new(Arc::new(model), quiet_config()));
        orchestrator
            .configure_agents(vec![Agent::new("Solo", "You echo.")])
            .unwrap();
        orchestrator.submit_user_message("ping", None).unwrap();

        let outcome = orchestrator.attempt_turn(TurnTrigger::Batch).await;
        assert_eq!(outcome.message().map(|m| m.content.as_str()), Some("pong"));
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_transcript_alone() {
        let mut model = MockModel::new();
        model
            .expect_generate()
            .with(always(), always())
            .times(1)
            .returning(|_, _| {
                Err(LlmError::Timeout {
                    provider: "lmstudio".to_string(),
                    seconds: 120,
                })
            });

        let orchestrator = Arc::new(Orchestrator::new(Arc::new(model), quiet_config()));
        orchestrator
            .configure_agents(vec![Agent::new("Solo", "p")])
            .unwrap();
        orchestrator.submit_user_message("hello", None).unwrap();

        match orchestrator.attempt_turn(TurnTrigger::Batch).await {
            TurnOutcome::Failed(notice) => {
                assert_eq!(notice.agent, "Solo");
                assert!(notice.reason.contains("timed out"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(orchestrator.transcript_len(), 1);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_skips_never_reach_gateway() {
        let mut model = MockModel::new();
        model.expect_generate().never();

        let orchestrator = Arc::new(Orchestrator::new(Arc::new(model), quiet_config()));
        assert_eq!(
            orchestrator.attempt_turn(TurnTrigger::Batch).await,
            TurnOutcome::Skipped(SkipReason::NoAgents)
        );

        orchestrator
            .configure_agents(vec![Agent::new("A", "p")])
            .unwrap();
        assert_eq!(
            orchestrator.attempt_turn(TurnTrigger::Batch).await,
            TurnOutcome::Skipped(SkipReason::EmptyTranscript)
        );

        orchestrator.submit_user_message("hi", None).unwrap();
        orchestrator.set_auto_chat(false);
        assert_eq!(
            orchestrator.attempt_turn(TurnTrigger::Paced).await,
            TurnOutcome::Skipped(SkipReason::AutoChatDisabled)
        );
        orchestrator.shutdown().await;
    }
}
