//! Shared fixtures for tool tests.

use std::sync::Arc;
use std::time::Duration;

use conclave_core::messages::{AgentMessage, Delivery};
use conclave_core::roles::{AgentRole, Sender};
use conclave_workspace::{GuardedWorkspace, LockManager, WorkspaceStore};
use parking_lot::Mutex;

use crate::errors::ToolError;
use crate::traits::{AgentPort, ToolContext};

/// In-memory stand-in for a runtime agent.
pub struct MockAgent {
    pub role: AgentRole,
    pub budget: Mutex<u32>,
    pub inbox: Mutex<Vec<AgentMessage>>,
    pub sent: Mutex<Vec<(AgentRole, String)>>,
    pub offline: Mutex<bool>,
}

impl MockAgent {
    pub fn new(role: AgentRole, budget: u32) -> Arc<Self> {
        Arc::new(Self {
            role,
            budget: Mutex::new(budget),
            inbox: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            offline: Mutex::new(false),
        })
    }

    pub fn queue(&self, from: AgentRole, content: &str) {
        self.inbox.lock().push(AgentMessage::new(
            Sender::Agent(from),
            self.role,
            content,
            Delivery::Queued,
        ));
    }
}

impl AgentPort for MockAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    fn peers(&self) -> Vec<AgentRole> {
        AgentRole::ALL.into_iter().filter(|r| *r != self.role).collect()
    }

    fn talk_budget(&self) -> u32 {
        *self.budget.lock()
    }

    fn spend_talk_budget(&self) -> Option<u32> {
        let mut budget = self.budget.lock();
        *budget = budget.checked_sub(1)?;
        Some(*budget)
    }

    fn send_queued(&self, to: AgentRole, content: &str) -> Result<(), ToolError> {
        if *self.offline.lock() {
            return Err(ToolError::UnknownTarget {
                target: to.to_string(),
            });
        }
        self.sent.lock().push((to, content.to_owned()));
        Ok(())
    }

    fn pop_inbox(&self) -> Option<AgentMessage> {
        self.inbox.lock().pop()
    }

    fn inbox_len(&self) -> usize {
        self.inbox.lock().len()
    }
}

pub fn make_ctx(agent: &Arc<MockAgent>) -> ToolContext {
    ToolContext {
        tool_call_id: "call-1".into(),
        agent: Arc::clone(agent) as Arc<dyn AgentPort>,
    }
}

pub fn workspace() -> (tempfile::TempDir, Arc<GuardedWorkspace>) {
    let dir = tempfile::tempdir().unwrap();
    let store = WorkspaceStore::open(dir.path()).unwrap();
    let locks = Arc::new(LockManager::new(Duration::from_secs(30)));
    (dir, Arc::new(GuardedWorkspace::new(store, locks)))
}
