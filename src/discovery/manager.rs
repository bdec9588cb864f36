use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::traits::{NodeHandler, NodeManager};
use crate::error::HarnessError;
use crate::types::{Node, NodeIdentity};

pub struct Manager {
    name: NodeIdentity,
    nodes: RwLock<HashMap<NodeIdentity, Node>>,
    handler: Arc<dyn NodeHandler>,
}

impl Manager {
    pub fn new(name: NodeIdentity, handler: Arc<dyn NodeHandler>) -> Result<Self, HarnessError> {
        if name.is_empty() {
            return Err(HarnessError::ManagerConstruction(
                "node name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name,
            nodes: RwLock::new(HashMap::new()),
            handler,
        })
    }
}

impl NodeManager for Manager {
    fn name(&self) -> &NodeIdentity {
        &self.name
    }

    fn get_nodes(&self) -> Vec<NodeIdentity> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.keys().cloned().collect()
    }

    fn node_count(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn node_updated(&self, node: Node) {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        match nodes.insert(node.name.clone(), node.clone()) {
            Some(old) => self.handler.node_update(&old, &node),
            None => {
                log::debug!("{}: learned about node {}", self.name, node.name);
                self.handler.node_add(&node);
            }
        }
    }

    fn node_deleted(&self, name: &NodeIdentity) {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = nodes.remove(name) {
            self.handler.node_delete(&old);
        }
    }
}
