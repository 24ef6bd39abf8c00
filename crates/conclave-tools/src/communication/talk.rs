//! `talk`: sends a queued message to a peer's inbox.
//!
//! Each delivered message spends one unit of the sender's talk budget; a
//! send that fails costs nothing. The budget is never replenished. Once it
//! reaches zero the tool fails with [`ToolError::QuotaExhausted`] and the
//! agent is completed on its next turn.

use async_trait::async_trait;
use conclave_core::roles::AgentRole;
use conclave_core::tools::{ToolDefinition, ToolParameterSchema, ToolResult, error_result, text_result};
use serde_json::{Value, json};
use tracing::debug;

use crate::errors::ToolError;
use crate::traits::{ConclaveTool, ToolContext};
use crate::utils::validation::validate_required_string;

/// Queues a message for another agent.
pub struct TalkTool;

fn peer_list(ctx: &ToolContext) -> String {
    ctx.agent
        .peers()
        .into_iter()
        .map(AgentRole::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl ConclaveTool for TalkTool {
    fn name(&self) -> &str {
        "talk"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "talk".into(),
            description: "Send a message to another agent's inbox. Each message spends one unit of your limited talk budget.".into(),
            parameters: ToolParameterSchema::object()
                .string_property("target", "Role of the receiving agent", true)
                .string_property("message", "What to tell them", true),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let target = validate_required_string(&params, "target", "role of the receiving agent")?;
        let message = validate_required_string(&params, "message", "message to send")?;

        let role = ctx.agent.role();
        let Ok(to) = target.parse::<AgentRole>() else {
            return Ok(error_result(format!(
                "Unknown agent: {target}. Available agents: {}",
                peer_list(ctx)
            )));
        };
        if to == role {
            return Ok(error_result(format!(
                "You cannot message yourself. Available agents: {}",
                peer_list(ctx)
            )));
        }
        if !ctx.agent.peers().contains(&to) {
            return Ok(error_result(format!(
                "{to} is not part of this session. Available agents: {}",
                peer_list(ctx)
            )));
        }

        if ctx.agent.talk_budget() == 0 {
            return Err(ToolError::QuotaExhausted { role });
        }
        ctx.agent.send_queued(to, &message)?;
        let Some(remaining) = ctx.agent.spend_talk_budget() else {
            return Err(ToolError::QuotaExhausted { role });
        };
        debug!(from = %role, to = %to, remaining, "talk message queued");

        Ok(text_result(
            format!("Message queued for {to}. Talk budget remaining: {remaining}."),
            false,
        )
        .with_details(json!({
            "target": to,
            "remaining": remaining,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockAgent, make_ctx};
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn queues_and_spends_budget() {
        let agent = MockAgent::new(AgentRole::Backend, 2);
        let result = TalkTool
            .execute(
                json!({"target": "frontend", "message": "API is on :8080"}),
                &make_ctx(&agent),
            )
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.content.contains("remaining: 1"));
        assert_eq!(
            agent.sent.lock().as_slice(),
            &[(AgentRole::Frontend, "API is on :8080".to_owned())]
        );
        assert_eq!(*agent.budget.lock(), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_fails() {
        let agent = MockAgent::new(AgentRole::Backend, 0);
        let err = TalkTool
            .execute(json!({"target": "devops", "message": "hi"}), &make_ctx(&agent))
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::QuotaExhausted { role: AgentRole::Backend });
        assert!(agent.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn last_unit_then_exhausted() {
        let agent = MockAgent::new(AgentRole::Devops, 1);
        let ctx = make_ctx(&agent);
        let first = TalkTool
            .execute(json!({"target": "backend", "message": "a"}), &ctx)
            .await
            .unwrap();
        assert!(first.content.contains("remaining: 0"));
        assert!(
            TalkTool
                .execute(json!({"target": "backend", "message": "b"}), &ctx)
                .await
                .is_err()
        );
        assert_eq!(agent.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn unknown_target_lists_peers() {
        let agent = MockAgent::new(AgentRole::Backend, 3);
        let result = TalkTool
            .execute(json!({"target": "qa", "message": "hi"}), &make_ctx(&agent))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("frontend, devops"));
        assert_eq!(*agent.budget.lock(), 3);
    }

    #[tokio::test]
    async fn self_target_rejected() {
        let agent = MockAgent::new(AgentRole::Backend, 3);
        let result = TalkTool
            .execute(json!({"target": "Backend", "message": "hi"}), &make_ctx(&agent))
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(*agent.budget.lock(), 3);
    }

    #[tokio::test]
    async fn blank_message_rejected() {
        let agent = MockAgent::new(AgentRole::Backend, 3);
        let result = TalkTool
            .execute(json!({"target": "frontend", "message": " "}), &make_ctx(&agent))
            .await;
        assert_matches!(result, Err(ToolError::Validation { .. }));
        assert_eq!(*agent.budget.lock(), 3);
        assert!(agent.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn failed_send_keeps_budget() {
        let agent = MockAgent::new(AgentRole::Frontend, 2);
        *agent.offline.lock() = true;
        let result = TalkTool
            .execute(json!({"target": "backend", "message": "still there?"}), &make_ctx(&agent))
            .await;
        assert_matches!(result, Err(ToolError::UnknownTarget { ref target }) if target == "backend");
        assert_eq!(*agent.budget.lock(), 2);
    }
}
