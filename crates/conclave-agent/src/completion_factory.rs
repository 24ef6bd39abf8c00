//! Completion backend selection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use conclave_core::roles::AgentRole;
use conclave_llm::CompletionService;
use conclave_llm::anthropic::{AnthropicCompletionService, AnthropicConfig};
use conclave_llm::scripted::{ScriptedCompletionService, ScriptedReply};
use conclave_settings::CompletionSettings;
use serde_json::json;

/// Build the live Messages API backend.
///
/// The API key is read from the environment variable named in settings.
pub fn live(settings: &CompletionSettings) -> Result<Arc<dyn CompletionService>> {
    live_with(settings, |name| std::env::var(name).ok())
}

fn live_with(
    settings: &CompletionSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn CompletionService>> {
    let api_key = lookup(&settings.api_key_env)
        .filter(|key| !key.trim().is_empty())
        .with_context(|| format!("{} is not set", settings.api_key_env))?;
    let config = AnthropicConfig {
        base_url: settings.base_url.clone(),
        model: settings.model.clone(),
        max_tokens: settings.max_tokens,
        api_key,
    };
    Ok(Arc::new(AnthropicCompletionService::new(config)))
}

/// Build an offline backend that walks each role through a short,
/// deterministic session: write one file, tell a peer, then finish.
pub fn dry_run(roles: &[AgentRole]) -> Arc<dyn CompletionService> {
    let mut service = ScriptedCompletionService::new();
    for (i, &role) in roles.iter().enumerate() {
        let peer = roles[(i + 1) % roles.len()];
        let path = format!("{}/README.md", role.as_str());
        let mut steps = vec![ScriptedReply::tool(
            "createFile",
            json!({ "path": path, "content": format!("# {role}\n\n{}\n", role.specialty()) }),
        )
        .with_text(format!("Starting on the {role} side."))
        .after(Duration::from_millis(50))];
        if peer != role {
            steps.push(ScriptedReply::tool(
                "talk",
                json!({ "target": peer.as_str(), "message": format!("{path} is in place.") }),
            ));
        }
        steps.push(ScriptedReply::text(format!("{role} work is done.")));
        service = service.script(role, steps);
    }
    Arc::new(service)
}
