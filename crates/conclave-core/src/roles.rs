//! Agent roster and per-agent turn state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed set of roles a session instantiates agents for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Server-side code and APIs.
    Backend,
    /// Client-side code and UI.
    Frontend,
    /// Build, deployment, and infrastructure files.
    Devops,
}

impl AgentRole {
    /// Every role, in roster order.
    pub const ALL: [AgentRole; 3] = [AgentRole::Backend, AgentRole::Frontend, AgentRole::Devops];

    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Frontend => "frontend",
            Self::Devops => "devops",
        }
    }

    /// One-line description of what this role owns.
    pub fn specialty(self) -> &'static str {
        match self {
            Self::Backend => "server-side code, APIs, and data models",
            Self::Frontend => "user interfaces, client code, and styling",
            Self::Devops => "containers, build pipelines, and deployment configuration",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string did not name a known role.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown agent role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for AgentRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backend" => Ok(Self::Backend),
            "frontend" => Ok(Self::Frontend),
            "devops" => Ok(Self::Devops),
            _ => Err(UnknownRole(s.to_owned())),
        }
    }
}

/// Turn state of one agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// No turn in flight and no pending work.
    #[default]
    Idle,
    /// A turn is in flight or scheduled.
    Thinking,
    /// Finished; only an incoming message reactivates it.
    Complete,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Complete => "complete",
        })
    }
}

/// Originator of an inter-agent message: another agent or the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Sender {
    /// The supervisor or the agent's own turn engine.
    System,
    /// A peer agent.
    Agent(AgentRole),
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Agent(role) => role.fmt(f),
        }
    }
}

impl From<Sender> for String {
    fn from(sender: Sender) -> Self {
        sender.to_string()
    }
}

impl TryFrom<String> for Sender {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "system" {
            Ok(Self::System)
        } else {
            value.parse().map(Self::Agent)
        }
    }
}

impl From<AgentRole> for Sender {
    fn from(role: AgentRole) -> Self {
        Self::Agent(role)
    }
}
