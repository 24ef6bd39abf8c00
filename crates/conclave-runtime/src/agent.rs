//! Agent: one role-bound participant and its turn state machine.
//!
//! An agent owns its transcript, inbox, and talk budget. It reacts to
//! envelopes on its router topic and runs at most one turn at a time: a
//! request that arrives mid-turn sets a rerun flag instead of starting a
//! second turn.
//!
//! Turn outline:
//!
//! 1. Exhausted talk budget → Complete.
//! 2. Repair the transcript, then request a completion over system prompt,
//!    transcript, and an inbox notice when messages are waiting.
//! 3. Tool calls → append the assistant entry, run each call, append one
//!    result per call (synthesized if missing), schedule another turn.
//! 4. No tool calls → bump the text-only streak. At the limit → Complete;
//!    on the first such turn → Idle, nudged after a grace delay.
//!
//! Immediate messages that arrive while a tool batch is open are held back
//! and appended after the batch's results, so a call is always followed
//! directly by its result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use conclave_core::events::{BaseEvent, SessionEvent};
use conclave_core::ids::SessionId;
use conclave_core::messages::{AgentMessage, Delivery, Message, ToolCall};
use conclave_core::roles::{AgentRole, AgentState, Sender};
use conclave_core::tools::ToolResult;
use conclave_llm::{CompletionRequest, CompletionService, ToolChoice};
use conclave_settings::AgentSettings;
use conclave_tools::{AgentPort, ToolError, ToolRegistry};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::executor::execute_tool_call;
use crate::prompts;
use crate::protocol::{self, SettledCall};
use crate::router::{Envelope, LifecycleSignal, MessageRouter, SubscriptionId, Topic};

/// Turn engine tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentConfig {
    /// Inter-agent sends allowed per session.
    pub talk_budget: u32,
    /// Consecutive tool-free turns that complete the agent.
    pub text_only_limit: u32,
    /// Delay before nudging after the first tool-free turn.
    pub nudge_grace: Duration,
    /// Require a tool call on the first turn.
    pub force_tool_on_first_turn: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from(&AgentSettings::default())
    }
}

impl From<&AgentSettings> for AgentConfig {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            talk_budget: settings.talk_budget,
            text_only_limit: settings.text_only_limit.max(1),
            nudge_grace: Duration::from_millis(settings.nudge_grace_ms),
            force_tool_on_first_turn: settings.force_tool_on_first_turn,
        }
    }
}

/// Session-wide collaborators shared by every agent.
#[derive(Clone)]
pub struct AgentDeps {
    /// Owning session.
    pub session_id: SessionId,
    /// Session router.
    pub router: Arc<MessageRouter>,
    /// Completion backend.
    pub completion: Arc<dyn CompletionService>,
    /// Tool set.
    pub tools: Arc<ToolRegistry>,
    /// Every role in the session, this agent's included.
    pub roles: Vec<AgentRole>,
    /// Cancelled when the session resolves; no turn starts afterwards.
    pub halt: CancellationToken,
    /// Cancelled when the session is stopped; in-flight work is discarded.
    pub abort: CancellationToken,
}

struct AgentInner {
    transcript: Vec<Message>,
    inbox: Vec<AgentMessage>,
    talk_budget: u32,
    state: AgentState,
    text_only_streak: u32,
    last_activity: Instant,
    turns: u32,
    nudge_epoch: u64,
    batch_open: bool,
    deferred: Vec<Message>,
}

enum Reaction {
    Resume,
    Wake,
    Ignore,
}

/// A role-bound participant.
pub struct Agent {
    role: AgentRole,
    config: AgentConfig,
    deps: AgentDeps,
    inner: Mutex<AgentInner>,
    running: AtomicBool,
    pending_rerun: AtomicBool,
    subscription: Mutex<Option<SubscriptionId>>,
    me: Weak<Agent>,
}

impl Agent {
    /// Create an agent and subscribe it to its router topic.
    pub fn spawn(role: AgentRole, config: AgentConfig, deps: AgentDeps) -> Arc<Self> {
        let agent = Arc::new_cyclic(|me| Self {
            role,
            inner: Mutex::new(AgentInner {
                transcript: Vec::new(),
                inbox: Vec::new(),
                talk_budget: config.talk_budget,
                state: AgentState::Idle,
                text_only_streak: 0,
                last_activity: Instant::now(),
                turns: 0,
                nudge_epoch: 0,
                batch_open: false,
                deferred: Vec::new(),
            }),
            config,
            deps,
            running: AtomicBool::new(false),
            pending_rerun: AtomicBool::new(false),
            subscription: Mutex::new(None),
            me: me.clone(),
        });

        let weak = Arc::downgrade(&agent);
        let id = agent.deps.router.subscribe(Topic::Agent(role), move |env| {
            if let (Some(agent), Envelope::Message(message)) = (weak.upgrade(), env) {
                agent.receive(message.clone());
            }
        });
        *agent.subscription.lock() = Some(id);
        agent
    }

    /// This agent's role.
    pub fn role(&self) -> AgentRole {
        self.role
    }

    /// Current turn state.
    pub fn state(&self) -> AgentState {
        self.inner.lock().state
    }

    /// Copy of the transcript.
    pub fn transcript(&self) -> Vec<Message> {
        self.inner.lock().transcript.clone()
    }

    /// Messages waiting in the inbox.
    pub fn pending_messages(&self) -> usize {
        self.inner.lock().inbox.len()
    }

    /// Talk budget left.
    pub fn talk_budget(&self) -> u32 {
        self.inner.lock().talk_budget
    }

    /// Consecutive tool-free turns.
    pub fn text_only_streak(&self) -> u32 {
        self.inner.lock().text_only_streak
    }

    /// Turns started so far.
    pub fn turns(&self) -> u32 {
        self.inner.lock().turns
    }

    /// Whether a turn is executing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Time since the agent last did or received anything.
    pub fn idle_for(&self) -> Duration {
        self.inner.lock().last_activity.elapsed()
    }

    /// Stop listening on the router.
    pub fn detach(&self) {
        if let Some(id) = self.subscription.lock().take() {
            let _ = self.deps.router.unsubscribe(id);
        }
    }

    /// Handle a routed message.
    pub fn receive(&self, message: AgentMessage) {
        if self.deps.halt.is_cancelled() {
            debug!(role = %self.role, "session resolved, dropping message");
            return;
        }
        let mut appended = None;
        let mut pending = None;
        let reaction = {
            let mut inner = self.inner.lock();
            inner.last_activity = Instant::now();
            let resumed = inner.state == AgentState::Complete;
            if resumed {
                inner.state = AgentState::Idle;
                inner.text_only_streak = 0;
            }
            match message.delivery {
                Delivery::Immediate => {
                    let entry = message.to_transcript_entry();
                    if inner.batch_open {
                        inner.deferred.push(entry);
                    } else {
                        inner.transcript.push(entry.clone());
                        appended = Some(entry);
                    }
                }
                Delivery::Queued => {
                    inner.inbox.push(message.clone());
                    pending = Some(inner.inbox.len());
                }
            }
            if resumed {
                Reaction::Resume
            } else if message.delivery == Delivery::Immediate || inner.state == AgentState::Idle {
                Reaction::Wake
            } else {
                Reaction::Ignore
            }
        };

        if let Some(entry) = appended {
            self.publish_transcript(vec![entry]);
        }
        if let Some(pending) = pending {
            self.emit(SessionEvent::InboxReceived {
                base: self.base(),
                role: self.role,
                from: message.from,
                pending,
            });
        }
        match reaction {
            Reaction::Resume => {
                info!(role = %self.role, "agent reactivated");
                self.signal(LifecycleSignal::Resumed(self.role));
                self.schedule();
            }
            Reaction::Wake => self.schedule(),
            Reaction::Ignore => {}
        }
    }

    /// Ask for a turn. Coalesces with a turn already in progress.
    pub fn schedule(&self) {
        if self.deps.halt.is_cancelled() {
            return;
        }
        self.pending_rerun.store(true, Ordering::SeqCst);
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let Some(me) = self.me.upgrade() else {
            self.running.store(false, Ordering::SeqCst);
            return;
        };
        let span = info_span!("agent", session_id = %self.deps.session_id, role = %self.role);
        drop(tokio::spawn(me.drive().instrument(span)));
    }

    async fn drive(self: Arc<Self>) {
        loop {
            while self.pending_rerun.swap(false, Ordering::SeqCst) {
                if self.deps.halt.is_cancelled() {
                    break;
                }
                let turn = tokio::spawn(Arc::clone(&self).run_turn().in_current_span());
                if let Err(e) = turn.await {
                    warn!(error = %e, "turn failed unexpectedly");
                    self.force_complete("turn failed unexpectedly");
                }
            }
            self.running.store(false, Ordering::SeqCst);
            // a schedule() that lost the race above left its flag set
            if !self.pending_rerun.load(Ordering::SeqCst)
                || self.deps.halt.is_cancelled()
                || self
                    .running
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
            {
                break;
            }
        }
    }

    async fn run_turn(self: Arc<Self>) {
        let (request, repaired) = {
            let mut inner = self.inner.lock();
            if inner.state == AgentState::Complete {
                return;
            }
            if inner.talk_budget == 0 {
                drop(inner);
                self.force_complete("talk budget exhausted");
                return;
            }
            inner.state = AgentState::Thinking;
            inner.turns += 1;
            inner.nudge_epoch += 1;
            inner.last_activity = Instant::now();
            let repaired = protocol::repair_transcript(&mut inner.transcript);

            let mut messages = inner.transcript.clone();
            if !inner.inbox.is_empty() {
                messages.push(Message::system(prompts::inbox_notice(inner.inbox.len())));
            }
            let tool_choice = if self.config.force_tool_on_first_turn && inner.turns == 1 {
                ToolChoice::Any
            } else {
                ToolChoice::Auto
            };
            let request = CompletionRequest {
                agent: self.role,
                system_prompt: prompts::system_prompt(self.role, &self.peers(), inner.talk_budget),
                messages,
                tools: self.deps.tools.definitions(),
                tool_choice,
            };
            (request, repaired)
        };

        self.emit_status(AgentState::Thinking);
        if !repaired.is_empty() {
            let patched = repaired
                .iter()
                .map(|call| Message::tool_result(&call.id, protocol::interrupted_message(&call.name), true))
                .collect();
            self.publish_transcript(patched);
        }
        for call in &repaired {
            self.emit(SessionEvent::ToolError {
                base: self.base(),
                role: self.role,
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                error: protocol::interrupted_message(&call.name),
                synthetic: true,
            });
        }

        let completion = tokio::select! {
            biased;
            () = self.deps.abort.cancelled() => {
                self.halt();
                return;
            }
            result = self.deps.completion.complete(&request) => result,
        };
        if self.deps.abort.is_cancelled() {
            self.halt();
            return;
        }
        let completion = match completion {
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = %e, category = e.category(), "completion failed");
                self.force_complete("completion failed");
                return;
            }
        };

        if completion.has_tool_calls() {
            self.run_tool_batch(completion.text, completion.tool_calls).await;
        } else {
            self.finish_text_turn(completion.text);
        }
    }

    async fn run_tool_batch(self: &Arc<Self>, text: Option<String>, calls: Vec<ToolCall>) {
        let assistant = Message::assistant(text, calls.clone());
        {
            let mut inner = self.inner.lock();
            inner.transcript.push(assistant.clone());
            inner.batch_open = true;
            inner.last_activity = Instant::now();
        }

        let mut results: HashMap<String, ToolResult> = HashMap::with_capacity(calls.len());
        for call in &calls {
            self.emit(SessionEvent::ToolCall {
                base: self.base(),
                role: self.role,
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                arguments: Value::Object(call.arguments.clone()),
            });
            let port: Arc<dyn AgentPort> = Arc::clone(self) as Arc<dyn AgentPort>;
            let tools = Arc::clone(&self.deps.tools);
            let owned = call.clone();
            let handle = tokio::spawn(
                async move { execute_tool_call(&owned, &tools, port).await }.in_current_span(),
            );
            let outcome = tokio::select! {
                biased;
                () = self.deps.abort.cancelled() => {
                    self.halt();
                    return;
                }
                outcome = handle => outcome,
            };
            match outcome {
                Ok(result) => {
                    let _ = results.insert(call.id.clone(), result);
                }
                Err(e) => warn!(tool_call_id = %call.id, error = %e, "tool task failed"),
            }
        }
        if self.deps.abort.is_cancelled() {
            self.halt();
            return;
        }

        let settled = protocol::settle_batch(&calls, results);
        for entry in &settled {
            self.emit_outcome(entry);
        }

        let appended = {
            let mut inner = self.inner.lock();
            if inner.state == AgentState::Complete {
                return;
            }
            let mut appended = vec![assistant];
            for entry in &settled {
                let result = Message::tool_result(
                    &entry.call.id,
                    entry.result.content.clone(),
                    entry.result.is_error,
                );
                inner.transcript.push(result.clone());
                appended.push(result);
            }
            let deferred = std::mem::take(&mut inner.deferred);
            inner.transcript.extend(deferred.iter().cloned());
            appended.extend(deferred);
            inner.batch_open = false;
            inner.text_only_streak = 0;
            inner.last_activity = Instant::now();
            appended
        };

        self.publish_transcript(appended);
        self.signal(LifecycleSignal::TurnCompleted(self.role));
        self.schedule();
    }

    fn finish_text_turn(self: &Arc<Self>, text: Option<String>) {
        let entry = Message::assistant(text, Vec::new());
        let (state, epoch) = {
            let mut inner = self.inner.lock();
            if inner.state == AgentState::Complete {
                return;
            }
            inner.transcript.push(entry.clone());
            inner.text_only_streak += 1;
            inner.last_activity = Instant::now();
            inner.state = if inner.text_only_streak >= self.config.text_only_limit {
                AgentState::Complete
            } else {
                AgentState::Idle
            };
            (inner.state, inner.nudge_epoch)
        };
        self.publish_transcript(vec![entry]);

        if state == AgentState::Complete {
            info!(role = %self.role, "agent complete");
            self.emit_status(AgentState::Complete);
            self.signal(LifecycleSignal::Completed(self.role));
            return;
        }
        self.emit_status(AgentState::Idle);
        self.signal(LifecycleSignal::TurnCompleted(self.role));

        let agent = Arc::clone(self);
        let grace = self.config.nudge_grace;
        drop(tokio::spawn(
            async move {
                tokio::select! {
                    () = agent.deps.halt.cancelled() => {}
                    () = tokio::time::sleep(grace) => agent.nudge_if_unchanged(epoch),
                }
            }
            .in_current_span(),
        ));
    }

    fn nudge_if_unchanged(&self, epoch: u64) {
        let still_waiting = {
            let inner = self.inner.lock();
            inner.nudge_epoch == epoch && inner.state == AgentState::Idle
        };
        if still_waiting {
            debug!(role = %self.role, "nudging after tool-free turn");
            self.deliver_system(prompts::text_only_nudge());
        }
    }

    /// Publish an immediate system message to this agent.
    pub fn deliver_system(&self, content: &str) {
        let message = AgentMessage::system(self.role, content);
        let _ = self
            .deps
            .router
            .publish(Topic::Agent(self.role), &Envelope::Message(message));
    }

    /// End the agent for a stopped session: it settles in Complete and
    /// starts no further turns. Nothing is emitted; viewers already saw the
    /// session resolve.
    pub fn halt(&self) {
        if self.enter_complete() {
            debug!(role = %self.role, "agent halted");
        }
    }

    // Returns false if the agent was already Complete.
    fn enter_complete(&self) -> bool {
        let (changed, flushed) = {
            let mut inner = self.inner.lock();
            let changed = inner.state != AgentState::Complete;
            inner.state = AgentState::Complete;
            inner.batch_open = false;
            let flushed = std::mem::take(&mut inner.deferred);
            inner.transcript.extend(flushed.iter().cloned());
            (changed, flushed)
        };
        if !flushed.is_empty() {
            self.publish_transcript(flushed);
        }
        changed
    }

    fn force_complete(&self, reason: &str) {
        if !self.enter_complete() {
            return;
        }
        info!(role = %self.role, reason, "agent forced complete");
        self.emit_status(AgentState::Complete);
        self.signal(LifecycleSignal::Completed(self.role));
    }

    fn emit_outcome(&self, entry: &SettledCall) {
        let SettledCall {
            call,
            result,
            synthetic,
        } = entry;
        if result.is_error {
            self.emit(SessionEvent::ToolError {
                base: self.base(),
                role: self.role,
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                error: result.content.clone(),
                synthetic: *synthetic,
            });
            return;
        }
        self.emit(SessionEvent::ToolResult {
            base: self.base(),
            role: self.role,
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: result.content.clone(),
        });
        if let Some(event) = self.file_event(result.details.as_ref()) {
            self.emit(event);
        }
    }

    fn file_event(&self, details: Option<&Value>) -> Option<SessionEvent> {
        let details = details?;
        let path = || details["path"].as_str().unwrap_or_default().to_owned();
        let event = match details.get("fileEvent")?.as_str()? {
            "created" => SessionEvent::FileCreated {
                base: self.base(),
                role: self.role,
                path: path(),
            },
            "modified" => SessionEvent::FileModified {
                base: self.base(),
                role: self.role,
                path: path(),
            },
            "deleted" => SessionEvent::FileDeleted {
                base: self.base(),
                role: self.role,
                path: path(),
            },
            "listed" => SessionEvent::FileListed {
                base: self.base(),
                role: self.role,
                dir: details["dir"].as_str().unwrap_or_default().to_owned(),
                count: details["count"]
                    .as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .unwrap_or_default(),
            },
            _ => return None,
        };
        Some(event)
    }

    fn base(&self) -> BaseEvent {
        BaseEvent::now(self.deps.session_id.as_str())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self
            .deps
            .router
            .publish(Topic::Broadcast, &Envelope::Event(event));
    }

    fn emit_status(&self, status: AgentState) {
        self.emit(SessionEvent::AgentStatus {
            base: self.base(),
            role: self.role,
            status,
        });
    }

    fn signal(&self, signal: LifecycleSignal) {
        let _ = self
            .deps
            .router
            .publish(Topic::Lifecycle, &Envelope::Lifecycle(signal));
    }

    fn publish_transcript(&self, entries: Vec<Message>) {
        let _ = self.deps.router.publish(
            Topic::Transcript,
            &Envelope::TranscriptUpdate {
                role: self.role,
                entries,
            },
        );
    }
}

impl AgentPort for Agent {
    fn role(&self) -> AgentRole {
        self.role
    }

    fn peers(&self) -> Vec<AgentRole> {
        self.deps
            .roles
            .iter()
            .copied()
            .filter(|r| *r != self.role)
            .collect()
    }

    fn lock_owner(&self) -> String {
        format!("{}/{}", self.deps.session_id, self.role)
    }

    fn talk_budget(&self) -> u32 {
        self.inner.lock().talk_budget
    }

    fn spend_talk_budget(&self) -> Option<u32> {
        let mut inner = self.inner.lock();
        inner.talk_budget = inner.talk_budget.checked_sub(1)?;
        Some(inner.talk_budget)
    }

    fn send_queued(&self, to: AgentRole, content: &str) -> Result<(), ToolError> {
        if !self.deps.router.has_subscribers(Topic::Agent(to)) {
            return Err(ToolError::UnknownTarget {
                target: to.to_string(),
            });
        }
        self.emit(SessionEvent::AgentMessage {
            base: self.base(),
            from: Sender::Agent(self.role),
            to,
            content: content.to_owned(),
        });
        let message = AgentMessage::new(Sender::Agent(self.role), to, content, Delivery::Queued);
        let _ = self
            .deps
            .router
            .publish(Topic::Agent(to), &Envelope::Message(message));
        Ok(())
    }

    fn pop_inbox(&self) -> Option<AgentMessage> {
        let (message, remaining) = {
            let mut inner = self.inner.lock();
            let message = inner.inbox.pop()?;
            (message, inner.inbox.len())
        };
        self.emit(SessionEvent::InboxRead {
            base: self.base(),
            role: self.role,
            from: message.from,
            remaining,
        });
        Some(message)
    }

    fn inbox_len(&self) -> usize {
        self.inner.lock().inbox.len()
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.role)
            .field("state", &self.state())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
