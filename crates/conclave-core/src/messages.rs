//! Transcript entries and inter-agent messages.
//!
//! A [`Message`] is one role-tagged transcript entry, replayed in full to the
//! completion service on every turn. An [`AgentMessage`] is a routed note from
//! one participant to another, delivered either straight into the recipient's
//! transcript or into its inbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::roles::{AgentRole, Sender};

/// A tool invocation produced by an assistant turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id echoed by the matching tool result.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Build a call from a JSON object of arguments. Non-object values become empty arguments.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One transcript entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum Message {
    /// Instruction from the system (topic announcements, nudges).
    System {
        /// Entry text.
        content: String,
    },
    /// Input attributed to a peer agent or an external user.
    User {
        /// Entry text.
        content: String,
    },
    /// A completion-service turn.
    Assistant {
        /// Free text, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Tool invocations in the order they were produced.
        #[serde(rename = "toolCalls", default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// The outcome of one tool invocation.
    #[serde(rename = "toolResult")]
    ToolResult {
        /// Id of the invocation this answers.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Result text.
        content: String,
        /// Whether the invocation failed.
        #[serde(rename = "isError", default)]
        is_error: bool,
    },
}

impl Message {
    /// Create a system entry.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Create a user entry.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create an assistant entry.
    #[must_use]
    pub fn assistant(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant { text, tool_calls }
    }

    /// Create a tool-result entry.
    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error,
        }
    }

    /// Whether this entry came from the completion service.
    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }

    /// Tool calls carried by an assistant entry (empty for other kinds).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Correlation id, when this entry is a tool result.
    pub fn result_id(&self) -> Option<&str> {
        match self {
            Self::ToolResult { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }
}

/// How a routed message reaches its recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Appended to the transcript; triggers a turn.
    Immediate,
    /// Parked in the inbox until the recipient drains it.
    Queued,
}

/// A message routed between participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    /// Originator.
    pub from: Sender,
    /// Recipient.
    pub to: AgentRole,
    /// Body text.
    pub content: String,
    /// Delivery mode.
    pub delivery: Delivery,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    /// Create a message stamped with the current time.
    #[must_use]
    pub fn new(from: Sender, to: AgentRole, content: impl Into<String>, delivery: Delivery) -> Self {
        Self {
            from,
            to,
            content: content.into(),
            delivery,
            timestamp: Utc::now(),
        }
    }

    /// An immediate message from the system.
    #[must_use]
    pub fn system(to: AgentRole, content: impl Into<String>) -> Self {
        Self::new(Sender::System, to, content, Delivery::Immediate)
    }

    /// Render as a transcript entry: system notes stay system, peer notes become user input.
    #[must_use]
    pub fn to_transcript_entry(&self) -> Message {
        match self.from {
            Sender::System => Message::system(self.content.clone()),
            Sender::Agent(role) => Message::user(format!("Message from {role}: {}", self.content)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_tagged_by_role() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "hi"}));

        let json = serde_json::to_value(Message::tool_result("c1", "ok", false)).unwrap();
        assert_eq!(json["role"], "toolResult");
        assert_eq!(json["toolCallId"], "c1");
        assert_eq!(json["isError"], false);
    }

    #[test]
    fn assistant_omits_empty_calls() {
        let json = serde_json::to_value(Message::assistant(Some("done".into()), vec![])).unwrap();
        assert_eq!(json, json!({"role": "assistant", "text": "done"}));
    }

    #[test]
    fn assistant_roundtrips_tool_calls() {
        let msg = Message::assistant(
            None,
            vec![ToolCall::new("c1", "readFile", json!({"path": "a.txt"}))],
        );
        let back: Message = serde_json::from_value(serde_json::to_value(&msg).unwrap()).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.tool_calls().len(), 1);
    }

    #[test]
    fn tool_call_ignores_non_object_arguments() {
        let call = ToolCall::new("c1", "listFiles", json!("oops"));
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn result_id_only_for_results() {
        assert_eq!(Message::tool_result("c9", "x", true).result_id(), Some("c9"));
        assert_eq!(Message::user("x").result_id(), None);
    }

    #[test]
    fn peer_message_becomes_user_entry() {
        let msg = AgentMessage::new(
            Sender::Agent(AgentRole::Backend),
            AgentRole::Frontend,
            "API is at /v1",
            Delivery::Queued,
        );
        assert_eq!(
            msg.to_transcript_entry(),
            Message::user("Message from backend: API is at /v1")
        );
    }

    #[test]
    fn system_message_stays_system() {
        let msg = AgentMessage::system(AgentRole::Devops, "nudge");
        assert_eq!(msg.delivery, Delivery::Immediate);
        assert_eq!(msg.to_transcript_entry(), Message::system("nudge"));
    }
}
