use anyhow::Result;
use std::sync::Arc;

use super::dataplane::FakeDataplane;
use super::manager::Manager;
use super::service::NodeDiscovery;
use super::traits::{Discovery, DiscoveryProvider, NodeHandler, NodeManager};
use crate::kvstore::KvStore;
use crate::types::{NodeIdentity, DEFAULT_MTU};

/// Wires managers and discovery instances to one shared kvstore handle.
#[derive(Clone)]
pub struct KvStoreDiscovery {
    store: Arc<dyn KvStore>,
    dataplane: FakeDataplane,
}

impl KvStoreDiscovery {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            dataplane: FakeDataplane::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }
}

impl DiscoveryProvider for KvStoreDiscovery {
    fn node_handler(&self) -> Arc<dyn NodeHandler> {
        self.dataplane.node()
    }

    fn new_manager(
        &self,
        identity: &NodeIdentity,
        handler: Arc<dyn NodeHandler>,
    ) -> Result<Arc<dyn NodeManager>> {
        let manager = Manager::new(identity.clone(), handler)?;
        Ok(Arc::new(manager))
    }

    fn new_discovery(&self, manager: Arc<dyn NodeManager>) -> Arc<dyn Discovery> {
        Arc::new(NodeDiscovery::new(manager, self.store.clone(), DEFAULT_MTU))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvstore::InMemoryKvStore;

    #[tokio::test]
    async fn test_provider_builds_working_discovery() {
        let provider = KvStoreDiscovery::new(Arc::new(InMemoryKvStore::default()));
        let id = provider.generate_identity().unwrap();
        let manager = provider.new_manager(&id, provider.node_handler()).unwrap();
        let discovery = provider.new_discovery(manager.clone());

        discovery.start(&id).unwrap();
        discovery.wait_registered().await.unwrap();

        let listed = provider
            .store()
            .list_prefix(crate::types::NODES_PREFIX)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(manager.name(), &id);
    }
}
