use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::NodeIdentity;
use crate::discovery::NodeManager;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    Converged,
    Failed(String),
    TimedOut,
}

impl AgentOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, AgentOutcome::Converged)
    }
}

/// Result a single agent or watcher reports to the orchestrator.
pub struct VirtualNode {
    pub identity: Option<NodeIdentity>,
    /// Time it took the node to observe every expected peer. Zero unless converged.
    pub elapsed: Duration,
    pub outcome: AgentOutcome,
    /// Present once the manager was constructed, even when the node timed out.
    pub manager: Option<Arc<dyn NodeManager>>,
    pub converged_at: Option<Instant>,
}

impl VirtualNode {
    pub fn failed(identity: Option<NodeIdentity>, reason: impl Into<String>) -> Self {
        Self {
            identity,
            elapsed: Duration::ZERO,
            outcome: AgentOutcome::Failed(reason.into()),
            manager: None,
            converged_at: None,
        }
    }

    pub fn timed_out(
        identity: Option<NodeIdentity>,
        manager: Option<Arc<dyn NodeManager>>,
    ) -> Self {
        Self {
            identity,
            elapsed: Duration::ZERO,
            outcome: AgentOutcome::TimedOut,
            manager,
            converged_at: None,
        }
    }

    pub fn converged(
        identity: Option<NodeIdentity>,
        manager: Option<Arc<dyn NodeManager>>,
        started: Instant,
    ) -> Self {
        let now = Instant::now();
        Self {
            identity,
            elapsed: now.duration_since(started),
            outcome: AgentOutcome::Converged,
            manager,
            converged_at: Some(now),
        }
    }
}

impl fmt::Debug for VirtualNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualNode")
            .field("identity", &self.identity)
            .field("elapsed", &self.elapsed)
            .field("outcome", &self.outcome)
            .field("has_manager", &self.manager.is_some())
            .finish()
    }
}
