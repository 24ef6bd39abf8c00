//! Tool-call/result pairing.
//!
//! The completion protocol rejects a transcript in which an assistant tool
//! call has no matching result. Two safeguards hold that invariant:
//!
//! 1. [`settle_batch`] closes a batch as it finishes, synthesizing a failed
//!    result for every call whose execution never reported back.
//! 2. [`repair_transcript`] runs before every replay and patches any block
//!    that was left open anyway (an aborted batch, for instance).
//!
//! Both are idempotent and never remove entries.

use std::collections::{HashMap, HashSet};

use conclave_core::messages::{Message, ToolCall};
use conclave_core::tools::{ToolResult, error_result};
use tracing::warn;

/// Text of a synthesized result.
pub fn interrupted_message(tool_name: &str) -> String {
    format!(
        "Tool {tool_name} did not return a result: its execution was interrupted. \
         Check the workspace state and retry if the change is still needed."
    )
}

/// A tool call paired with its outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct SettledCall {
    /// The invocation.
    pub call: ToolCall,
    /// Its result, real or synthesized.
    pub result: ToolResult,
    /// True when no real result existed.
    pub synthetic: bool,
}

/// Pair each call with its result, in invocation order.
///
/// Results for unknown ids are dropped; calls without a result get a
/// synthesized failure.
pub fn settle_batch(calls: &[ToolCall], mut results: HashMap<String, ToolResult>) -> Vec<SettledCall> {
    calls
        .iter()
        .map(|call| match results.remove(&call.id) {
            Some(result) => SettledCall {
                call: call.clone(),
                result,
                synthetic: false,
            },
            None => {
                warn!(tool_call_id = %call.id, tool_name = %call.name, "synthesized result for unresolved tool call");
                SettledCall {
                    call: call.clone(),
                    result: error_result(interrupted_message(&call.name)),
                    synthetic: true,
                }
            }
        })
        .collect()
}

/// Insert a failed result for every unanswered tool call in `transcript`.
///
/// Synthesized entries land after the block's existing results, in call
/// order. Returns the calls that were patched.
pub fn repair_transcript(transcript: &mut Vec<Message>) -> Vec<ToolCall> {
    let mut repaired = Vec::new();
    let mut i = 0;
    while i < transcript.len() {
        let calls = transcript[i].tool_calls().to_vec();
        if calls.is_empty() {
            i += 1;
            continue;
        }

        let mut end = i + 1;
        while end < transcript.len() && transcript[end].result_id().is_some() {
            end += 1;
        }
        let answered: HashSet<&str> = transcript[i + 1..end]
            .iter()
            .filter_map(Message::result_id)
            .collect();
        let missing: Vec<ToolCall> = calls
            .into_iter()
            .filter(|c| !answered.contains(c.id.as_str()))
            .collect();

        for (offset, call) in missing.iter().enumerate() {
            warn!(tool_call_id = %call.id, tool_name = %call.name, "repaired unanswered tool call");
            transcript.insert(
                end + offset,
                Message::tool_result(&call.id, interrupted_message(&call.name), true),
            );
        }
        i = end + missing.len();
        repaired.extend(missing);
    }
    repaired
}
