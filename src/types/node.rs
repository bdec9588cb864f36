use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::NodeName;

/// Unique name a virtual node registers under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIdentity(NodeName);

impl NodeIdentity {
    /// Random v4 UUID rendered without hyphens.
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn new(name: impl Into<NodeName>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Record a node publishes to the coordination store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: NodeIdentity,
    pub cluster: String,
    pub mtu: u32,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

impl Node {
    pub fn new(name: NodeIdentity, mtu: u32) -> Self {
        Self {
            name,
            cluster: "default".to_string(),
            mtu,
            registered_at: chrono::Utc::now(),
        }
    }

    /// Key the node is stored under in the coordination store.
    pub fn key(&self) -> String {
        format!("{}{}/{}", super::NODES_PREFIX, self.cluster, self.name)
    }
}
