//! Deterministic completion service driven by per-role scripts.
//!
//! Each role has a queue of [`ScriptStep`]s consumed one per call. When a
//! queue runs dry the role's fallback reply is used, or a short text-only
//! reply if none was set. Tool call ids are minted fresh on every call so a
//! repeated reply never reuses an id.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use conclave_core::messages::ToolCall;
use conclave_core::roles::AgentRole;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::service::{Completion, CompletionError, CompletionRequest, CompletionResult, CompletionService};

const DEFAULT_REPLY: &str = "Nothing further from me.";

/// A canned assistant turn.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScriptedReply {
    text: Option<String>,
    calls: Vec<(String, Value)>,
    delay: Option<Duration>,
}

impl ScriptedReply {
    /// A text-only reply.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A reply invoking one tool.
    #[must_use]
    pub fn tool(name: impl Into<String>, arguments: Value) -> Self {
        Self::default().and_tool(name, arguments)
    }

    /// Add another tool invocation.
    #[must_use]
    pub fn and_tool(mut self, name: impl Into<String>, arguments: Value) -> Self {
        self.calls.push((name.into(), arguments));
        self
    }

    /// Attach text alongside the tool calls.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Delay the reply, simulating service latency.
    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// One scripted call outcome.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptStep {
    /// Return this reply.
    Reply(ScriptedReply),
    /// Fail the call.
    Fail(String),
}

impl From<ScriptedReply> for ScriptStep {
    fn from(reply: ScriptedReply) -> Self {
        Self::Reply(reply)
    }
}

#[derive(Default)]
struct Scripts {
    steps: HashMap<AgentRole, VecDeque<ScriptStep>>,
    fallbacks: HashMap<AgentRole, ScriptedReply>,
    requests: Vec<CompletionRequest>,
}

/// Completion service replaying scripted replies per role.
#[derive(Default)]
pub struct ScriptedCompletionService {
    scripts: Mutex<Scripts>,
    next_call: AtomicU64,
}

impl ScriptedCompletionService {
    /// Create a service with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue steps for `role`.
    #[must_use]
    pub fn script<I, S>(self, role: AgentRole, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ScriptStep>,
    {
        self.scripts
            .lock()
            .steps
            .entry(role)
            .or_default()
            .extend(steps.into_iter().map(Into::into));
        self
    }

    /// Reply used for `role` once its queue is empty.
    #[must_use]
    pub fn fallback(self, role: AgentRole, reply: ScriptedReply) -> Self {
        let _ = self.scripts.lock().fallbacks.insert(role, reply);
        self
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.scripts.lock().requests.clone()
    }

    /// Requests received from one role.
    pub fn requests_for(&self, role: AgentRole) -> Vec<CompletionRequest> {
        self.scripts
            .lock()
            .requests
            .iter()
            .filter(|r| r.agent == role)
            .cloned()
            .collect()
    }

    /// Number of calls made by `role`.
    pub fn call_count(&self, role: AgentRole) -> usize {
        self.scripts
            .lock()
            .requests
            .iter()
            .filter(|r| r.agent == role)
            .count()
    }

    fn materialize(&self, reply: &ScriptedReply) -> Completion {
        let tool_calls = reply
            .calls
            .iter()
            .map(|(name, args)| {
                let n = self.next_call.fetch_add(1, Ordering::Relaxed);
                ToolCall::new(format!("call_{n}"), name.clone(), args.clone())
            })
            .collect();
        Completion {
            text: reply.text.clone(),
            tool_calls,
        }
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletionService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> CompletionResult<Completion> {
        let step = {
            let mut scripts = self.scripts.lock();
            scripts.requests.push(request.clone());
            let queued = scripts.steps.get_mut(&request.agent).and_then(VecDeque::pop_front);
            match queued {
                Some(step) => step,
                None => ScriptStep::Reply(
                    scripts
                        .fallbacks
                        .get(&request.agent)
                        .cloned()
                        .unwrap_or_else(|| ScriptedReply::text(DEFAULT_REPLY)),
                ),
            }
        };
        debug!(agent = %request.agent, ?step, "scripted completion");

        match step {
            ScriptStep::Fail(message) => Err(CompletionError::Other { message }),
            ScriptStep::Reply(reply) => {
                if let Some(delay) = reply.delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(self.materialize(&reply))
            }
        }
    }
}
