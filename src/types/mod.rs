pub mod node;
pub mod report;
pub mod virtual_node;

pub use node::{Node, NodeIdentity};
pub use report::{BenchmarkReport, JoinedCohort, PhaseReport};
pub use virtual_node::{AgentOutcome, VirtualNode};

use serde::{Deserialize, Serialize};
use std::fmt;

pub type NodeName = String;

/// Prefix all node records live under in the coordination store.
pub const NODES_PREFIX: &str = "nodeperf/state/nodes/v1/";

pub const DEFAULT_MTU: u32 = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Initial,    // First cohort discovering each other
    Additional, // First cohort discovering the added nodes
}

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Phase::Initial => "initial",
            Phase::Additional => "additional",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
