//! Prompt text fed to agents.

use conclave_core::roles::AgentRole;

/// Per-agent system prompt.
pub fn system_prompt(role: AgentRole, peers: &[AgentRole], talk_budget: u32) -> String {
    let peers = peers
        .iter()
        .map(|p| format!("- {p}: {}", p.specialty()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are the {role} engineer on a small team building a project together in a shared workspace.\n\
         You own {specialty}.\n\n\
         Your teammates:\n{peers}\n\n\
         Working rules:\n\
         - Do real work with the file tools: createFile, readFile, replaceInFile, listFiles, deleteFile.\n\
         - createFile never overwrites. To change an existing file, readFile it and use replaceInFile.\n\
         - A file another agent is editing may be locked for a moment. Retry or work elsewhere.\n\
         - talk queues a message in a teammate's inbox. You have {talk_budget} messages for the whole session, so make each one count.\n\
         - readMessage returns your newest unread message first.\n\
         - When your part is finished, reply with a short summary and no tool calls.",
        specialty = role.specialty(),
    )
}

/// The seed message every agent starts from.
pub fn topic_announcement(topic: &str) -> String {
    format!(
        "New project: {topic}\n\n\
         Look at the workspace, decide what your role contributes, and start building. \
         If the project needs nothing from your role, say so in a short reply without tool calls."
    )
}

/// Sent after an agent's first tool-free turn.
pub fn text_only_nudge() -> &'static str {
    "You replied without using any tools. If your part is not finished, continue with the tools now. \
     If it is finished, reply once more with a one-line confirmation."
}

/// Sent when an unfinished agent has been quiet for too long.
pub fn idle_nudge() -> &'static str {
    "You have been idle for a while. Check your inbox and the workspace, then continue your work \
     or confirm that your part is complete."
}

/// Trailing note when unread messages are waiting.
pub fn inbox_notice(pending: usize) -> String {
    let noun = if pending == 1 { "message" } else { "messages" };
    format!("You have {pending} unread {noun} in your inbox. Use readMessage to read them.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_names_role_peers_and_budget() {
        let prompt = system_prompt(AgentRole::Backend, &[AgentRole::Frontend, AgentRole::Devops], 7);
        assert!(prompt.starts_with("You are the backend engineer"));
        assert!(prompt.contains("- frontend:"));
        assert!(prompt.contains("- devops:"));
        assert!(prompt.contains("You have 7 messages"));
    }

    #[test]
    fn inbox_notice_pluralizes() {
        assert!(inbox_notice(1).contains("1 unread message "));
        assert!(inbox_notice(3).contains("3 unread messages"));
    }

    #[test]
    fn announcement_allows_opting_out() {
        let text = topic_announcement("a todo app");
        assert!(text.contains("a todo app"));
        assert!(text.contains("without tool calls"));
    }
}
