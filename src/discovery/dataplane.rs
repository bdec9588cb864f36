use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::traits::NodeHandler;
use crate::types::Node;

/// Counts node events instead of programming anything.
#[derive(Debug, Default)]
pub struct FakeNodeHandler {
    adds: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
}

impl FakeNodeHandler {
    pub fn adds(&self) -> usize {
        self.adds.load(Ordering::Relaxed)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::Relaxed)
    }
}

impl NodeHandler for FakeNodeHandler {
    fn node_add(&self, _node: &Node) {
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    fn node_update(&self, _old: &Node, _new: &Node) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    fn node_delete(&self, _node: &Node) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDataplane {
    node: Arc<FakeNodeHandler>,
}

impl FakeDataplane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self) -> Arc<dyn NodeHandler> {
        self.node.clone()
    }

    pub fn stats(&self) -> &FakeNodeHandler {
        &self.node
    }
}
