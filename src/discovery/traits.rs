use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::types::{Node, NodeIdentity};

/// Data-plane hooks a node manager forwards membership changes to.
pub trait NodeHandler: Send + Sync {
    fn node_add(&self, node: &Node);
    fn node_update(&self, old: &Node, new: &Node);
    fn node_delete(&self, node: &Node);
}

/// One virtual node's view of cluster membership.
pub trait NodeManager: Send + Sync {
    fn name(&self) -> &NodeIdentity;

    /// Every node this manager currently knows about, itself included.
    fn get_nodes(&self) -> Vec<NodeIdentity>;

    fn node_count(&self) -> usize {
        self.get_nodes().len()
    }

    fn node_updated(&self, node: Node);
    fn node_deleted(&self, name: &NodeIdentity);
}

#[async_trait]
pub trait Discovery: Send + Sync {
    /// Announce `identity` and begin feeding peer updates into the manager.
    fn start(&self, identity: &NodeIdentity) -> Result<()>;

    /// Resolves once the local node's registration has been acknowledged.
    async fn wait_registered(&self) -> Result<()>;
}

/// Everything a virtual node agent needs to join the cluster.
pub trait DiscoveryProvider: Send + Sync {
    fn generate_identity(&self) -> Result<NodeIdentity> {
        Ok(NodeIdentity::random())
    }

    fn node_handler(&self) -> Arc<dyn NodeHandler>;

    fn new_manager(
        &self,
        identity: &NodeIdentity,
        handler: Arc<dyn NodeHandler>,
    ) -> Result<Arc<dyn NodeManager>>;

    fn new_discovery(&self, manager: Arc<dyn NodeManager>) -> Arc<dyn Discovery>;
}
