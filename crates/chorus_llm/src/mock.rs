//! Mock model gateway for testing.
//!
//! Provides a scriptable implementation of the ModelGateway trait for use in
//! tests and offline runs without a model server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{LlmError, LlmResult};
use crate::gateway::ModelGateway;

/// Captured prompt for verification.
#[derive(Debug, Clone)]
pub struct CapturedPrompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone)]
struct FailureRule {
    /// Substring matched against the system instruction
    needle: String,
    /// Failures left to hand out; `None` fails forever
    remaining: Option<usize>,
    message: String,
}

/// Mock model gateway.
///
/// Replies come from a queue first, then from the default reply, then from a
/// numbered placeholder. Failure rules match on the system instruction, which
/// always carries the speaking persona's prompt, so a test can make one
/// agent fail while the others succeed.
#[derive(Clone, Default)]
pub struct MockGateway {
    replies: Arc<RwLock<VecDeque<String>>>,
    default_reply: Arc<RwLock<Option<String>>>,
    failures: Arc<RwLock<Vec<FailureRule>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    calls: Arc<RwLock<Vec<CapturedPrompt>>>,
    call_count: Arc<AtomicUsize>,
}

impl MockGateway {
    /// Create a new mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next successful call.
    pub fn add_reply(self, reply: impl Into<String>) -> Self {
        self.replies.write().push_back(reply.into());
        self
    }

    /// Queue several replies in order.
    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies.write().extend(replies.into_iter().map(Into::into));
        self
    }

    /// Reply used once the queue is empty.
    pub fn with_default_reply(self, reply: impl Into<String>) -> Self {
        *self.default_reply.write() = Some(reply.into());
        self
    }

    /// Fail the next `times` calls whose system instruction contains `needle`.
    pub fn fail_when_system_contains(self, needle: impl Into<String>, times: usize) -> Self {
        let needle = needle.into();
        let message = format!("simulated failure for '{}'", needle);
        self.failures.write().push(FailureRule {
            needle,
            remaining: Some(times),
            message,
        });
        self
    }

    /// Fail every call whose system instruction contains `needle`.
    pub fn always_fail_when_system_contains(self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        let message = format!("simulated failure for '{}'", needle);
        self.failures.write().push(FailureRule {
            needle,
            remaining: None,
            message,
        });
        self
    }

    /// Fail every call.
    pub fn always_fail(self) -> Self {
        self.always_fail_when_system_contains("")
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write() = Some(delay);
        self
    }

    /// All captured prompts.
    pub fn calls(&self) -> Vec<CapturedPrompt> {
        self.calls.read().clone()
    }

    /// Number of generate calls received.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Clear captured prompts.
    pub fn clear_calls(&self) {
        self.calls.write().clear();
    }

    fn take_failure(&self, system: &str) -> Option<LlmError> {
        let mut rules = self.failures.write();
        let rule = rules.iter_mut().find(|rule| {
            system.contains(&rule.needle) && rule.remaining.map_or(true, |left| left > 0)
        })?;
        if let Some(left) = rule.remaining.as_mut() {
            *left -= 1;
        }
        Some(LlmError::Transport {
            provider: "mock".to_string(),
            message: rule.message.clone(),
        })
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn generate(&self, system: &str, user: &str) -> LlmResult<String> {
        let call_number = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.write().push(CapturedPrompt {
            system: system.to_string(),
            user: user.to_string(),
        });

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.take_failure(system) {
            return Err(err);
        }

        if let Some(reply) = self.replies.write().pop_front() {
            return Ok(reply);
        }

        Ok(self
            .default_reply
            .read()
            .clone()
            .unwrap_or_else(|| format!("mock reply {}", call_number)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_default_then_numbered() {
        let gateway = MockGateway::new().add_reply("first");
        assert_eq!(gateway.generate("s", "u").await.unwrap(), "first");
        assert_eq!(gateway.generate("s", "u").await.unwrap(), "mock reply 2");

        let gateway = gateway.with_default_reply("same again");
        assert_eq!(gateway.generate("s", "u").await.unwrap(), "same again");
        assert_eq!(gateway.call_count(), 3);
    }

    #[tokio::test]
    async fn test_limited_failure_rule() {
        let gateway = MockGateway::new().fail_when_system_contains("You are Bea", 1);

        assert!(gateway.generate("You are Bea.", "u").await.is_err());
        assert!(gateway.generate("You are Bea.", "u").await.is_ok());
        assert!(gateway.generate("You are Al.", "u").await.is_ok());
    }

    #[tokio::test]
    async fn test_captures_prompts() {
        let gateway = MockGateway::new().always_fail();
        let _ = gateway.generate("sys", "script").await;

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].user, "script");
        gateway.clear_calls();
        assert!(gateway.calls().is_empty());
    }
}
