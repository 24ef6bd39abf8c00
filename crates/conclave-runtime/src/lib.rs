//! # conclave-runtime
//!
//! Runs a session of role-bound agents against one shared workspace.
//!
//! - **Router**: topic-keyed publish/subscribe connecting agents, the supervisor, and observers
//! - **Agent**: transcript, inbox, and the turn state machine (Idle → Thinking → Complete)
//! - **Executor**: dispatches one tool call and always yields exactly one result
//! - **Protocol**: pairs every tool call with a result, synthesizing failures where needed
//! - **Supervisor**: seeds agents, watches for idleness, and resolves each session once
//!
//! ## Crate Position
//!
//! Aggregation layer. Depends on: conclave-core, conclave-settings,
//! conclave-workspace, conclave-llm, conclave-tools.
//! Depended on by: conclave-agent.

#![deny(unsafe_code)]

pub mod agent;
pub mod emitter;
pub mod errors;
pub mod executor;
pub mod prompts;
pub mod protocol;
pub mod router;
pub mod supervisor;

pub use agent::{Agent, AgentConfig};
pub use emitter::EventEmitter;
pub use errors::SupervisorError;
pub use router::{Envelope, LifecycleSignal, MessageRouter, SubscriptionId, Topic};
pub use supervisor::{SessionHandle, SessionSupervisor, SupervisorConfig, TranscriptEntry};
