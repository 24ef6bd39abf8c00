//! End-to-end sessions driven by scripted completions.
//!
//! Every test runs with the Tokio clock paused, so grace delays, idle
//! thresholds, and timeouts elapse instantly once all tasks are idle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conclave_core::events::{SessionEvent, SessionStatus};
use conclave_core::messages::Message;
use conclave_core::roles::{AgentRole, AgentState, Sender};
use conclave_core::tools::{ToolDefinition, ToolParameterSchema, ToolResult};
use conclave_llm::scripted::{ScriptedCompletionService, ScriptedReply};
use conclave_runtime::prompts;
use conclave_runtime::{SessionHandle, SessionSupervisor, SupervisorConfig, SupervisorError};
use conclave_tools::{ConclaveTool, ToolContext, ToolError, ToolRegistry};
use conclave_workspace::{GuardedWorkspace, LockManager, WorkspaceStore};
use serde_json::{Value, json};

struct Fixture {
    _dir: tempfile::TempDir,
    workspace: Arc<GuardedWorkspace>,
    completion: Arc<ScriptedCompletionService>,
}

impl Fixture {
    fn new(completion: ScriptedCompletionService) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        let locks = Arc::new(LockManager::new(Duration::from_secs(30)));
        Self {
            _dir: dir,
            workspace: Arc::new(GuardedWorkspace::new(store, locks)),
            completion: Arc::new(completion),
        }
    }

    fn supervisor(&self, config: SupervisorConfig) -> SessionSupervisor {
        SessionSupervisor::new(
            config,
            Arc::clone(&self.workspace),
            Arc::clone(&self.completion) as _,
        )
    }
}

/// Drain everything the session emitted. Call after `finished()`.
fn drain(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn count(events: &[SessionEvent], kind: &str) -> usize {
    events.iter().filter(|e| e.event_type() == kind).count()
}

fn tool_errors(events: &[SessionEvent]) -> Vec<(AgentRole, String, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::ToolError {
                role,
                error,
                synthetic,
                ..
            } => Some((*role, error.clone(), *synthetic)),
            _ => None,
        })
        .collect()
}

fn assert_bracketed(events: &[SessionEvent], status: SessionStatus) {
    assert_eq!(events.first().map(SessionEvent::event_type), Some("session_started"));
    match events.last() {
        Some(SessionEvent::SessionComplete { status: s, .. }) => assert_eq!(*s, status),
        other => panic!("expected session_complete last, got {other:?}"),
    }
    assert_eq!(count(events, "session_complete"), 1);
}

async fn run(handle: &SessionHandle) -> (SessionStatus, Vec<SessionEvent>) {
    let mut rx = handle.subscribe();
    let status = handle.finished().await;
    (status, drain(&mut rx))
}

#[tokio::test(start_paused = true)]
async fn agents_split_work_and_all_complete() {
    let fixture = Fixture::new(
        ScriptedCompletionService::new()
            .script(
                AgentRole::Frontend,
                [
                    ScriptedReply::text("Nothing here needs a UI."),
                    ScriptedReply::text("Confirmed, my part is done."),
                ],
            )
            .script(
                AgentRole::Backend,
                [ScriptedReply::tool(
                    "createFile",
                    json!({"path": "server.txt", "content": "listen 8080"}),
                )],
            )
            .script(
                AgentRole::Devops,
                [ScriptedReply::tool(
                    "createFile",
                    json!({"path": "Dockerfile", "content": "FROM rust:1.85"}),
                )],
            ),
    );
    let supervisor = fixture.supervisor(SupervisorConfig::default());
    let handle = supervisor.start("a tiny web server").unwrap();

    let (status, events) = run(&handle).await;
    assert_eq!(status, SessionStatus::Complete);
    assert_bracketed(&events, SessionStatus::Complete);

    assert_eq!(fixture.workspace.read("server.txt").unwrap(), "listen 8080");
    assert_eq!(fixture.workspace.read("Dockerfile").unwrap(), "FROM rust:1.85");
    assert_eq!(count(&events, "file_created"), 2);
    assert!(tool_errors(&events).is_empty());

    assert_eq!(fixture.completion.call_count(AgentRole::Frontend), 2);
    assert!(
        fixture
            .completion
            .requests_for(AgentRole::Frontend)
            .iter()
            .all(|r| !r.tools.is_empty())
    );
    assert!(
        handle
            .agent_states()
            .values()
            .all(|s| *s == AgentState::Complete)
    );
    assert!(!supervisor.is_active(handle.id()));
}

#[tokio::test(start_paused = true)]
async fn racing_creates_leave_one_winner() {
    let fixture = Fixture::new(
        ScriptedCompletionService::new()
            .script(
                AgentRole::Backend,
                [ScriptedReply::tool(
                    "createFile",
                    json!({"path": "config.yaml", "content": "owner: backend"}),
                )],
            )
            .script(
                AgentRole::Devops,
                [ScriptedReply::tool(
                    "createFile",
                    json!({"path": "config.yaml", "content": "owner: devops"}),
                )],
            ),
    );
    let supervisor = fixture.supervisor(SupervisorConfig::default());
    let handle = supervisor.start("shared configuration").unwrap();

    let (status, events) = run(&handle).await;
    assert_eq!(status, SessionStatus::Complete);

    let created: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::FileCreated { role, path, .. } if path == "config.yaml" => Some(*role),
            _ => None,
        })
        .collect();
    assert_eq!(created.len(), 1);

    let errors = tool_errors(&events);
    assert_eq!(errors.len(), 1);
    let (loser, error, synthetic) = &errors[0];
    assert_ne!(*loser, created[0]);
    assert!(!synthetic);
    assert!(error.contains("already exists"));
    assert!(error.contains("replaceInFile"));

    let content = fixture.workspace.read("config.yaml").unwrap();
    assert_eq!(content, format!("owner: {}", created[0]));
    assert!(fixture.workspace.locks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn talk_budget_exhaustion_completes_sender() {
    let talk = |n: u32| json!({"target": "frontend", "message": format!("update {n}")});
    let fixture = Fixture::new(ScriptedCompletionService::new().script(
        AgentRole::Backend,
        [ScriptedReply::tool("talk", talk(1))
            .and_tool("talk", talk(2))
            .and_tool("talk", talk(3))],
    ));
    let mut config = SupervisorConfig::default();
    config.agent.talk_budget = 2;
    let supervisor = fixture.supervisor(config);
    let handle = supervisor.start("coordinated release").unwrap();

    let (status, events) = run(&handle).await;
    assert_eq!(status, SessionStatus::Complete);
    assert_bracketed(&events, SessionStatus::Complete);

    let sent = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                SessionEvent::AgentMessage { from: Sender::Agent(AgentRole::Backend), .. }
            )
        })
        .count();
    assert_eq!(sent, 2);
    let received = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::InboxReceived { role: AgentRole::Frontend, .. }))
        .count();
    assert_eq!(received, 2);

    let errors = tool_errors(&events);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, AgentRole::Backend);
    assert!(errors[0].1.contains("talk budget exhausted for backend"));

    // forced complete on the next turn, without another completion request
    assert_eq!(fixture.completion.call_count(AgentRole::Backend), 1);
    let backend = handle.agent(AgentRole::Backend).unwrap();
    assert_eq!(backend.talk_budget(), 0);
    assert_eq!(backend.state(), AgentState::Complete);
}

#[tokio::test(start_paused = true)]
async fn busy_agents_time_out() {
    let busy = ScriptedReply::tool("listFiles", json!({})).after(Duration::from_secs(4));
    let fixture = Fixture::new(
        ScriptedCompletionService::new()
            .fallback(AgentRole::Backend, busy.clone())
            .fallback(AgentRole::Frontend, busy.clone())
            .fallback(AgentRole::Devops, busy),
    );
    let config = SupervisorConfig {
        timeout: Duration::from_secs(30),
        ..SupervisorConfig::default()
    };
    let supervisor = fixture.supervisor(config);
    let handle = supervisor.start("endless refactor").unwrap();

    let (status, events) = run(&handle).await;
    assert_eq!(status, SessionStatus::Timeout);
    assert_bracketed(&events, SessionStatus::Timeout);
    assert!(count(&events, "file_listed") > 0);
    assert!(!supervisor.is_active(handle.id()));
    assert!(matches!(
        supervisor.stop(handle.id()),
        Err(SupervisorError::SessionNotFound { .. })
    ));

    // in-flight calls settle, but no new turn starts
    let calls = fixture.completion.requests().len();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fixture.completion.requests().len(), calls);
}

#[tokio::test(start_paused = true)]
async fn explicit_stop_resolves_once() {
    let slow = ScriptedReply::text("still thinking").after(Duration::from_secs(3600));
    let fixture = Fixture::new(
        ScriptedCompletionService::new()
            .fallback(AgentRole::Backend, slow.clone())
            .fallback(AgentRole::Frontend, slow.clone())
            .fallback(AgentRole::Devops, slow),
    );
    let supervisor = fixture.supervisor(SupervisorConfig::default());
    let handle = supervisor.start("a long project").unwrap();
    let mut rx = handle.subscribe();

    tokio::time::sleep(Duration::from_secs(1)).await;
    supervisor.stop(handle.id()).unwrap();
    assert_eq!(handle.finished().await, SessionStatus::Stopped);

    let events = drain(&mut rx);
    assert_bracketed(&events, SessionStatus::Stopped);
    assert_eq!(count(&events, "agent_status"), 3);
    assert!(matches!(
        supervisor.stop(handle.id()),
        Err(SupervisorError::SessionNotFound { .. })
    ));
    // the aborted replies never reach a transcript
    let transcript = handle.transcript();
    assert_eq!(transcript.len(), 3);
    assert!(transcript.iter().all(|e| !e.message.is_assistant()));

    // every agent settles in Complete and stays there
    let all_complete = |handle: &SessionHandle| handle.agent_states().values().all(|s| *s == AgentState::Complete);
    assert!(all_complete(&handle));
    let calls = fixture.completion.requests().len();
    tokio::time::sleep(Duration::from_secs(7200)).await;
    assert!(all_complete(&handle));
    assert_eq!(fixture.completion.requests().len(), calls);
    assert!(handle.transcript().iter().all(|e| !e.message.is_assistant()));
}

#[tokio::test(start_paused = true)]
async fn watchdog_nudges_quiet_agent_once_per_window() {
    let fixture = Fixture::new(ScriptedCompletionService::new().script(
        AgentRole::Backend,
        [
            ScriptedReply::text("Let me think about the layout."),
            ScriptedReply::tool("listFiles", json!({})),
            ScriptedReply::text("Still weighing the options."),
            ScriptedReply::text("Done, the workspace needs nothing from me."),
        ],
    ));
    let mut config = SupervisorConfig {
        roles: vec![AgentRole::Backend],
        idle_threshold: Duration::from_secs(20),
        idle_check_interval: Duration::from_secs(5),
        timeout: Duration::from_secs(120),
        ..SupervisorConfig::default()
    };
    config.agent.nudge_grace = Duration::from_secs(3600);
    let supervisor = fixture.supervisor(config);
    let started = tokio::time::Instant::now();
    let handle = supervisor.start("a quiet backend").unwrap();

    let (status, _events) = run(&handle).await;
    assert_eq!(status, SessionStatus::Complete);
    assert_eq!(fixture.completion.call_count(AgentRole::Backend), 4);
    // two quiet spells, each a full threshold long
    assert!(started.elapsed() >= Duration::from_secs(40));

    let system: Vec<String> = handle
        .transcript()
        .into_iter()
        .filter_map(|e| match e.message {
            Message::System { content } => Some(content),
            _ => None,
        })
        .collect();
    let idle_nudges = system.iter().filter(|c| c.as_str() == prompts::idle_nudge()).count();
    assert_eq!(idle_nudges, 2);
    assert!(system.iter().all(|c| c.as_str() != prompts::text_only_nudge()));
}

struct ExplodeTool;

#[async_trait]
impl ConclaveTool for ExplodeTool {
    fn name(&self) -> &str {
        "explode"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "explode".into(),
            description: "Always crashes.".into(),
            parameters: ToolParameterSchema::object(),
        }
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        panic!("tool crashed mid-execution");
    }
}

#[tokio::test(start_paused = true)]
async fn crashed_tool_gets_synthesized_result() {
    let fixture = Fixture::new(ScriptedCompletionService::new().script(
        AgentRole::Backend,
        [ScriptedReply::tool("explode", json!({}))
            .and_tool("createFile", json!({"path": "after.txt", "content": "still ran"}))],
    ));
    let mut tools = ToolRegistry::standard(Arc::clone(&fixture.workspace));
    tools.register(Arc::new(ExplodeTool));
    let supervisor = SessionSupervisor::with_tools(
        SupervisorConfig::default(),
        Arc::clone(&fixture.workspace),
        Arc::clone(&fixture.completion) as _,
        Arc::new(tools),
    );
    let handle = supervisor.start("fragile tooling").unwrap();

    let (status, events) = run(&handle).await;
    assert_eq!(status, SessionStatus::Complete);

    let errors = tool_errors(&events);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, AgentRole::Backend);
    assert!(errors[0].2, "result should be marked synthetic");
    assert_eq!(fixture.workspace.read("after.txt").unwrap(), "still ran");

    // every call is answered, in call order, before anything else
    let transcript = handle.agent(AgentRole::Backend).unwrap().transcript();
    let at = transcript
        .iter()
        .position(|m| m.tool_calls().len() == 2)
        .unwrap();
    let calls = transcript[at].tool_calls();
    assert_eq!(transcript[at + 1].result_id(), Some(calls[0].id.as_str()));
    assert_eq!(transcript[at + 2].result_id(), Some(calls[1].id.as_str()));
    assert!(matches!(
        &transcript[at + 1],
        Message::ToolResult { is_error: true, content, .. } if content.contains("interrupted")
    ));

    // the next request replays the repaired block
    let second = &fixture.completion.requests_for(AgentRole::Backend)[1];
    assert!(second.messages.iter().any(|m| m.result_id() == Some(calls[0].id.as_str())));
}

#[tokio::test(start_paused = true)]
async fn queued_message_reactivates_completed_agent() {
    let fixture = Fixture::new(
        ScriptedCompletionService::new()
            .script(
                AgentRole::Backend,
                [ScriptedReply::tool(
                    "talk",
                    json!({"target": "devops", "message": "Please add a Dockerfile for the API."}),
                )
                .after(Duration::from_secs(10))],
            )
            .script(
                AgentRole::Devops,
                [
                    ScriptedReply::text("Waiting for the API."),
                    ScriptedReply::text("Nothing to deploy yet."),
                    ScriptedReply::tool("readMessage", json!({})),
                    ScriptedReply::tool(
                        "createFile",
                        json!({"path": "Dockerfile", "content": "FROM rust:1.85"}),
                    ),
                ],
            ),
    );
    let supervisor = fixture.supervisor(SupervisorConfig::default());
    let handle = supervisor.start("an API with deployment").unwrap();

    let (status, events) = run(&handle).await;
    assert_eq!(status, SessionStatus::Complete);
    assert_eq!(fixture.workspace.read("Dockerfile").unwrap(), "FROM rust:1.85");

    let devops_completions = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                SessionEvent::AgentStatus {
                    role: AgentRole::Devops,
                    status: AgentState::Complete,
                    ..
                }
            )
        })
        .count();
    assert_eq!(devops_completions, 2);
    assert_eq!(count(&events, "inbox_read"), 1);

    let third = &fixture.completion.requests_for(AgentRole::Devops)[2];
    assert!(matches!(
        third.messages.last(),
        Some(Message::System { content }) if content.contains("1 unread message")
    ));
}

#[tokio::test]
async fn missing_topic_is_rejected() {
    let fixture = Fixture::new(ScriptedCompletionService::new());
    let supervisor = fixture.supervisor(SupervisorConfig::default());
    assert!(matches!(supervisor.start(""), Err(SupervisorError::MissingTopic)));
}
