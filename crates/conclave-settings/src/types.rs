//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a partial
//! JSON file only needs the keys it overrides.

use std::time::Duration;

use conclave_core::roles::AgentRole;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConclaveSettings {
    /// Shared workspace location and lock behaviour.
    pub workspace: WorkspaceSettings,
    /// Per-agent turn engine parameters.
    pub agent: AgentSettings,
    /// Session supervisor timers and roster.
    pub session: SessionSettings,
    /// Completion service endpoint.
    pub completion: CompletionSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl ConclaveSettings {
    /// Reject combinations the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.session.roles.is_empty() {
            return Err(SettingsError::InvalidValue("session.roles is empty".into()));
        }
        if self.agent.text_only_limit == 0 {
            return Err(SettingsError::InvalidValue(
                "agent.textOnlyLimit must be at least 1".into(),
            ));
        }
        if self.session.idle_check_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "session.idleCheckIntervalMs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Workspace settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceSettings {
    /// Directory all agents share.
    pub root: String,
    /// How long a file lock stays live without release.
    pub lock_timeout_ms: u64,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            root: "./workspace".into(),
            lock_timeout_ms: 30_000,
        }
    }
}

impl WorkspaceSettings {
    /// Lock timeout as a [`Duration`].
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Agent turn engine settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Inter-agent sends each agent may make per session.
    pub talk_budget: u32,
    /// Consecutive tool-free turns that mark an agent complete.
    pub text_only_limit: u32,
    /// Delay before nudging an agent after its first tool-free turn.
    pub nudge_grace_ms: u64,
    /// Require a tool call on an agent's first turn.
    pub force_tool_on_first_turn: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            talk_budget: 10,
            text_only_limit: 2,
            nudge_grace_ms: 1_000,
            force_tool_on_first_turn: false,
        }
    }
}

/// Session supervisor settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Roles instantiated per session.
    pub roles: Vec<AgentRole>,
    /// Idle time after which a non-complete agent is nudged.
    pub idle_threshold_ms: u64,
    /// Watchdog period.
    pub idle_check_interval_ms: u64,
    /// Overall deadline before the session resolves as `timeout`.
    pub timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            roles: AgentRole::ALL.to_vec(),
            idle_threshold_ms: 20_000,
            idle_check_interval_ms: 5_000,
            timeout_ms: 600_000,
        }
    }
}

impl SessionSettings {
    /// Idle threshold as a [`Duration`].
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }

    /// Watchdog period as a [`Duration`].
    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_ms)
    }

    /// Session deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Completion service settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionSettings {
    /// Base URL of the Messages API.
    pub base_url: String,
    /// Model id.
    pub model: String,
    /// Max output tokens per turn.
    pub max_tokens: u32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".into(),
            model: "claude-sonnet-4-5".into(),
            max_tokens: 4_096,
            api_key_env: "ANTHROPIC_API_KEY".into(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}
