//! Session supervisor: starts sessions and resolves each one exactly once.
//!
//! A session seeds one agent per role with the topic, then waits for the
//! first of:
//!
//! - every agent Complete → `complete`
//! - the session timeout → `timeout` (no new turns; in-flight work settles)
//! - an explicit stop → `stopped` (in-flight work is discarded)
//!
//! Meanwhile a watchdog nudges unfinished agents that have been idle past the
//! threshold. `session_complete` is always the last event a session emits.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use conclave_core::events::{BaseEvent, SessionEvent, SessionStatus};
use conclave_core::ids::SessionId;
use conclave_core::messages::Message;
use conclave_core::roles::{AgentRole, AgentState};
use conclave_llm::CompletionService;
use conclave_settings::ConclaveSettings;
use conclave_tools::ToolRegistry;
use conclave_workspace::{FileSnapshot, GuardedWorkspace};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, instrument};

use crate::agent::{Agent, AgentConfig, AgentDeps};
use crate::emitter::EventEmitter;
use crate::errors::SupervisorError;
use crate::prompts;
use crate::router::{Envelope, LifecycleSignal, MessageRouter, SubscriptionId, Topic};

/// Session tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Roles instantiated per session.
    pub roles: Vec<AgentRole>,
    /// Turn engine tuning shared by every agent.
    pub agent: AgentConfig,
    /// Quiet period after which an unfinished agent is nudged.
    pub idle_threshold: Duration,
    /// Watchdog period.
    pub idle_check_interval: Duration,
    /// Wall-clock limit per session.
    pub timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from(&ConclaveSettings::default())
    }
}

impl From<&ConclaveSettings> for SupervisorConfig {
    fn from(settings: &ConclaveSettings) -> Self {
        Self {
            roles: settings.session.roles.clone(),
            agent: AgentConfig::from(&settings.agent),
            idle_threshold: settings.session.idle_threshold(),
            idle_check_interval: settings.session.idle_check_interval(),
            timeout: settings.session.timeout(),
        }
    }
}

/// One entry of the session-wide interleaved transcript.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscriptEntry {
    /// Owning agent.
    pub role: AgentRole,
    /// The appended entry.
    pub message: Message,
}

struct SessionControl {
    stop: CancellationToken,
}

/// Starts, tracks, and stops sessions.
pub struct SessionSupervisor {
    config: SupervisorConfig,
    workspace: Arc<GuardedWorkspace>,
    completion: Arc<dyn CompletionService>,
    tools: Arc<ToolRegistry>,
    sessions: Arc<DashMap<SessionId, SessionControl>>,
}

impl SessionSupervisor {
    /// Supervisor with the standard tool set over `workspace`.
    pub fn new(
        config: SupervisorConfig,
        workspace: Arc<GuardedWorkspace>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        let tools = Arc::new(ToolRegistry::standard(Arc::clone(&workspace)));
        Self::with_tools(config, workspace, completion, tools)
    }

    /// Supervisor with a custom tool set.
    pub fn with_tools(
        config: SupervisorConfig,
        workspace: Arc<GuardedWorkspace>,
        completion: Arc<dyn CompletionService>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            config,
            workspace,
            completion,
            tools,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// The shared workspace.
    pub fn workspace(&self) -> &Arc<GuardedWorkspace> {
        &self.workspace
    }

    /// Ids of unresolved sessions.
    pub fn active_sessions(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Whether `id` names an unresolved session.
    pub fn is_active(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Start a session on `topic`. Must be called within a Tokio runtime.
    #[instrument(skip(self), fields(session_id))]
    pub fn start(&self, topic: &str) -> Result<SessionHandle, SupervisorError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SupervisorError::MissingTopic);
        }
        let session_id = SessionId::new();
        let _ = tracing::Span::current().record("session_id", session_id.as_str());

        let router = Arc::new(MessageRouter::new());
        let emitter = Arc::new(EventEmitter::new());
        let first_rx = emitter.subscribe();

        let forward = Arc::clone(&emitter);
        let broadcast_sub = router.subscribe(Topic::Broadcast, move |env| {
            if let Envelope::Event(event) = env {
                let _ = forward.emit(event.clone());
            }
        });

        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let _ = router.subscribe(Topic::Transcript, move |env| {
            if let Envelope::TranscriptUpdate { role, entries } = env {
                sink.lock().extend(entries.iter().map(|message| TranscriptEntry {
                    role: *role,
                    message: message.clone(),
                }));
            }
        });

        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        let _ = router.subscribe(Topic::Lifecycle, move |env| {
            if let Envelope::Lifecycle(signal) = env {
                let _ = lifecycle_tx.send(*signal);
            }
        });

        let halt = CancellationToken::new();
        let abort = CancellationToken::new();
        let stop = CancellationToken::new();
        let agents: BTreeMap<AgentRole, Arc<Agent>> = self
            .config
            .roles
            .iter()
            .map(|&role| {
                let deps = AgentDeps {
                    session_id: session_id.clone(),
                    router: Arc::clone(&router),
                    completion: Arc::clone(&self.completion),
                    tools: Arc::clone(&self.tools),
                    roles: self.config.roles.clone(),
                    halt: halt.clone(),
                    abort: abort.clone(),
                };
                (role, Agent::spawn(role, self.config.agent.clone(), deps))
            })
            .collect();
        let agents = Arc::new(agents);

        let (status_tx, status_rx) = watch::channel(SessionStatus::Active);
        let _ = self.sessions.insert(
            session_id.clone(),
            SessionControl { stop: stop.clone() },
        );

        let run = SessionRun {
            session_id: session_id.clone(),
            topic: topic.to_owned(),
            config: self.config.clone(),
            router,
            emitter: Arc::clone(&emitter),
            broadcast_sub,
            agents: Arc::clone(&agents),
            lifecycle_rx,
            halt,
            abort,
            stop,
            status_tx,
            sessions: Arc::clone(&self.sessions),
        };
        let span = info_span!("session", session_id = %session_id);
        drop(tokio::spawn(run.supervise().instrument(span)));
        info!(session_id = %session_id, topic, "session started");

        Ok(SessionHandle {
            id: session_id,
            topic: topic.to_owned(),
            emitter,
            first_rx: Mutex::new(Some(first_rx)),
            status: status_rx,
            agents,
            log,
            workspace: Arc::clone(&self.workspace),
        })
    }

    /// Stop a running session.
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn stop(&self, id: &SessionId) -> Result<(), SupervisorError> {
        let Some(control) = self.sessions.get(id) else {
            return Err(SupervisorError::SessionNotFound {
                id: id.to_string(),
            });
        };
        info!("stop requested");
        control.stop.cancel();
        Ok(())
    }

    /// Delete everything in the shared workspace.
    pub fn wipe_workspace(&self) -> Result<(), SupervisorError> {
        self.workspace.wipe()?;
        info!("workspace wiped");
        Ok(())
    }

    /// Committed content of every workspace file.
    pub fn snapshot(&self) -> Result<Vec<FileSnapshot>, SupervisorError> {
        Ok(self.workspace.snapshot()?)
    }
}

struct SessionRun {
    session_id: SessionId,
    topic: String,
    config: SupervisorConfig,
    router: Arc<MessageRouter>,
    emitter: Arc<EventEmitter>,
    broadcast_sub: SubscriptionId,
    agents: Arc<BTreeMap<AgentRole, Arc<Agent>>>,
    lifecycle_rx: mpsc::UnboundedReceiver<LifecycleSignal>,
    halt: CancellationToken,
    abort: CancellationToken,
    stop: CancellationToken,
    status_tx: watch::Sender<SessionStatus>,
    sessions: Arc<DashMap<SessionId, SessionControl>>,
}

impl SessionRun {
    async fn supervise(mut self) {
        let _ = self.emitter.emit(SessionEvent::SessionStarted {
            base: BaseEvent::now(self.session_id.as_str()),
            topic: self.topic.clone(),
            roles: self.config.roles.clone(),
        });
        let announcement = prompts::topic_announcement(&self.topic);
        for agent in self.agents.values() {
            agent.deliver_system(&announcement);
        }

        let mut watchdog = tokio::time::interval(self.config.idle_check_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let _ = watchdog.tick().await;
        let deadline = tokio::time::sleep(self.config.timeout);
        tokio::pin!(deadline);

        let mut completed: HashSet<AgentRole> = HashSet::new();
        let status = loop {
            tokio::select! {
                biased;
                () = self.stop.cancelled() => break SessionStatus::Stopped,
                () = &mut deadline => break SessionStatus::Timeout,
                Some(signal) = self.lifecycle_rx.recv() => match signal {
                    LifecycleSignal::Completed(role) => {
                        let _ = completed.insert(role);
                        debug!(%role, done = completed.len(), "agent completed");
                        if completed.len() == self.agents.len() {
                            break SessionStatus::Complete;
                        }
                    }
                    LifecycleSignal::Resumed(role) => {
                        let _ = completed.remove(&role);
                        debug!(%role, "agent resumed");
                    }
                    LifecycleSignal::TurnCompleted(_) => {}
                },
                _ = watchdog.tick() => self.nudge_idle_agents(),
            }
        };
        self.resolve(status);
    }

    fn nudge_idle_agents(&self) {
        for agent in self.agents.values() {
            if agent.state() != AgentState::Complete
                && !agent.is_running()
                && agent.idle_for() >= self.config.idle_threshold
            {
                debug!(role = %agent.role(), "nudging idle agent");
                agent.deliver_system(prompts::idle_nudge());
            }
        }
    }

    fn resolve(self, status: SessionStatus) {
        self.halt.cancel();
        if status == SessionStatus::Stopped {
            self.abort.cancel();
            for agent in self.agents.values() {
                agent.halt();
            }
        }
        let _ = self.router.unsubscribe(self.broadcast_sub);
        for agent in self.agents.values() {
            agent.detach();
        }
        let _ = self.emitter.emit(SessionEvent::SessionComplete {
            base: BaseEvent::now(self.session_id.as_str()),
            status,
        });
        let _ = self.sessions.remove(&self.session_id);
        let _ = self.status_tx.send(status);
        info!(%status, "session resolved");
    }
}

/// Observer handle for one session.
pub struct SessionHandle {
    id: SessionId,
    topic: String,
    emitter: Arc<EventEmitter>,
    first_rx: Mutex<Option<broadcast::Receiver<SessionEvent>>>,
    status: watch::Receiver<SessionStatus>,
    agents: Arc<BTreeMap<AgentRole, Arc<Agent>>>,
    log: Arc<Mutex<Vec<TranscriptEntry>>>,
    workspace: Arc<GuardedWorkspace>,
}

impl SessionHandle {
    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Session topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Join the event stream.
    ///
    /// The first call returns a receiver created before the session began,
    /// so it sees `session_started`. Later calls see subsequent events only.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.first_rx
            .lock()
            .take()
            .unwrap_or_else(|| self.emitter.subscribe())
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Wait for the session to resolve.
    pub async fn finished(&self) -> SessionStatus {
        let mut rx = self.status.clone();
        let status = rx.wait_for(|s| s.is_terminal()).await.map(|s| *s);
        status.unwrap_or_else(|_| *self.status.borrow())
    }

    /// Every transcript entry of every agent, in append order.
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.log.lock().clone()
    }

    /// Current state of each agent.
    pub fn agent_states(&self) -> BTreeMap<AgentRole, AgentState> {
        self.agents
            .iter()
            .map(|(role, agent)| (*role, agent.state()))
            .collect()
    }

    /// One agent of the session.
    pub fn agent(&self, role: AgentRole) -> Option<&Arc<Agent>> {
        self.agents.get(&role)
    }

    /// Committed content of every workspace file.
    pub fn snapshot(&self) -> Result<Vec<FileSnapshot>, SupervisorError> {
        Ok(self.workspace.snapshot()?)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
