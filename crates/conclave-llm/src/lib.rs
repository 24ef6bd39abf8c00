//! # conclave-llm
//!
//! The completion service boundary. An agent hands over its system prompt,
//! transcript, and tool schema and gets back optional text plus zero or more
//! tool invocations.
//!
//! - [`CompletionService`]: the trait every backend implements
//! - [`anthropic::AnthropicCompletionService`]: Anthropic Messages API over HTTP
//! - [`scripted::ScriptedCompletionService`]: canned per-role replies for tests and dry runs

#![deny(unsafe_code)]

pub mod anthropic;
pub mod convert;
pub mod scripted;
pub mod service;

pub use service::{
    Completion, CompletionError, CompletionRequest, CompletionResult, CompletionService,
    ToolChoice,
};
