//! Conversion between transcripts and the Anthropic Messages wire format.
//!
//! - System and user entries become user-role text blocks
//! - Assistant entries become `text` + `tool_use` blocks
//! - Tool results become user-role `tool_result` blocks
//! - Consecutive entries with the same wire role merge into one message
//! - The conversation always starts and ends on a user message

use conclave_core::messages::{Message, ToolCall};
use conclave_core::tools::ToolDefinition;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::service::{Completion, CompletionRequest, ToolChoice};

const CONTINUED_CONTENT: &str = "[Continued]";
const CONTINUE_PROMPT: &str = "Continue.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WireRole {
    User,
    Assistant,
}

impl WireRole {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

fn text_block(text: &str) -> Option<Value> {
    (!text.trim().is_empty()).then(|| json!({"type": "text", "text": text}))
}

fn tool_use_block(call: &ToolCall) -> Value {
    json!({
        "type": "tool_use",
        "id": call.id,
        "name": call.name,
        "input": Value::Object(call.arguments.clone()),
    })
}

/// Convert a transcript into Messages API `messages`.
pub fn convert_messages(messages: &[Message]) -> Vec<Value> {
    let mut out: Vec<(WireRole, Vec<Value>)> = Vec::new();

    for message in messages {
        let (role, blocks): (WireRole, Vec<Value>) = match message {
            Message::System { content } => (
                WireRole::User,
                text_block(&format!("[system] {content}")).into_iter().collect(),
            ),
            Message::User { content } => (WireRole::User, text_block(content).into_iter().collect()),
            Message::Assistant { text, tool_calls } => {
                let mut blocks: Vec<Value> = text.as_deref().and_then(text_block).into_iter().collect();
                blocks.extend(tool_calls.iter().map(tool_use_block));
                (WireRole::Assistant, blocks)
            }
            Message::ToolResult {
                tool_call_id,
                content,
                is_error,
            } => (
                WireRole::User,
                vec![json!({
                    "type": "tool_result",
                    "tool_use_id": tool_call_id,
                    "content": content,
                    "is_error": is_error,
                })],
            ),
        };
        if blocks.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some((last, existing)) if *last == role => existing.extend(blocks),
            _ => out.push((role, blocks)),
        }
    }

    if out.first().is_some_and(|(role, _)| *role == WireRole::Assistant) {
        warn!("transcript starts with an assistant turn, prepending placeholder");
        out.insert(0, (WireRole::User, vec![json!({"type": "text", "text": CONTINUED_CONTENT})]));
    }
    if out.last().is_none_or(|(role, _)| *role == WireRole::Assistant) {
        out.push((WireRole::User, vec![json!({"type": "text", "text": CONTINUE_PROMPT})]));
    }

    out.into_iter()
        .map(|(role, content)| json!({"role": role.as_str(), "content": content}))
        .collect()
}

/// Convert tool definitions into Messages API `tools`.
pub fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.parameters,
            })
        })
        .collect()
}

/// Build the full request body.
pub fn build_request_body(request: &CompletionRequest, model: &str, max_tokens: u32) -> Value {
    let mut body = json!({
        "model": model,
        "max_tokens": max_tokens,
        "system": request.system_prompt,
        "messages": convert_messages(&request.messages),
    });
    if !request.tools.is_empty() {
        body["tools"] = Value::Array(convert_tools(&request.tools));
        body["tool_choice"] = match request.tool_choice {
            ToolChoice::Auto => json!({"type": "auto"}),
            ToolChoice::Any => json!({"type": "any"}),
        };
    }
    body
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ApiBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unsupported,
}

/// Parse a Messages API response into a [`Completion`].
pub fn parse_response(body: Value) -> serde_json::Result<Completion> {
    let response: ApiResponse = serde_json::from_value(body)?;
    let mut texts: Vec<String> = Vec::new();
    let mut tool_calls = Vec::new();
    for block in response.content {
        match block {
            ApiBlock::Text { text } => texts.push(text),
            ApiBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall::new(id, name, input)),
            ApiBlock::Unsupported => {}
        }
    }
    let text = texts.join("\n");
    Ok(Completion {
        text: (!text.trim().is_empty()).then_some(text),
        tool_calls,
    })
}

/// Parse an API error body into `(message, retryable)`.
pub fn parse_api_error(body: &str, status: u16) -> (String, bool) {
    let retryable = status == 429 || status >= 500;
    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            let message = json["error"]["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string();
            (message, retryable)
        }
        Err(_) => (format!("HTTP {status}: {body}"), retryable),
    }
}
