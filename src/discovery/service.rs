use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use super::traits::{Discovery, NodeManager};
use crate::error::HarnessError;
use crate::kvstore::{KvEvent, KvStore};
use crate::types::{Node, NodeIdentity, NODES_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Registration {
    Pending,
    Registered,
    Failed(String),
}

/// Publishes the local node to the kvstore and mirrors every other node's
/// record into the bound manager.
pub struct NodeDiscovery {
    manager: Arc<dyn NodeManager>,
    store: Arc<dyn KvStore>,
    mtu: u32,
    started: AtomicBool,
    registered_tx: Arc<watch::Sender<Registration>>,
    registered_rx: watch::Receiver<Registration>,
}

impl NodeDiscovery {
    pub fn new(manager: Arc<dyn NodeManager>, store: Arc<dyn KvStore>, mtu: u32) -> Self {
        let (tx, rx) = watch::channel(Registration::Pending);
        Self {
            manager,
            store,
            mtu,
            started: AtomicBool::new(false),
            registered_tx: Arc::new(tx),
            registered_rx: rx,
        }
    }

    pub fn is_registered(&self) -> bool {
        *self.registered_rx.borrow() == Registration::Registered
    }
}

#[async_trait]
impl Discovery for NodeDiscovery {
    fn start(&self, identity: &NodeIdentity) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(anyhow!("discovery for {} already started", identity));
        }

        let local = Node::new(identity.clone(), self.mtu);
        let manager = self.manager.clone();
        let store = self.store.clone();
        let registered = self.registered_tx.clone();

        tokio::spawn(async move {
            // Subscribe first so nothing written during registration is missed.
            let events = store.watch();

            if let Err(e) = register(&*store, &local).await {
                log::warn!("{}: registration failed: {}", local.name, e);
                let _ = registered.send(Registration::Failed(e.to_string()));
                return;
            }
            log::debug!("{}: registered", local.name);
            let _ = registered.send(Registration::Registered);

            if let Err(e) = mirror_nodes(&*store, &*manager, events).await {
                log::warn!("{}: stopped watching nodes: {}", local.name, e);
            }
        });

        Ok(())
    }

    async fn wait_registered(&self) -> Result<()> {
        let mut rx = self.registered_rx.clone();
        let state = rx
            .wait_for(|s| *s != Registration::Pending)
            .await
            .map_err(|_| HarnessError::Discovery("registration task went away".to_string()))?
            .clone();

        match state {
            Registration::Failed(reason) => Err(HarnessError::Discovery(reason).into()),
            _ => Ok(()),
        }
    }
}

async fn register(store: &dyn KvStore, node: &Node) -> Result<()> {
    let value = serde_json::to_vec(node)?;
    store.upsert(&node.key(), value).await
}

async fn resync(store: &dyn KvStore, manager: &dyn NodeManager) -> Result<()> {
    for (key, value) in store.list_prefix(NODES_PREFIX).await? {
        apply_upsert(manager, &key, &value);
    }
    Ok(())
}

async fn mirror_nodes(
    store: &dyn KvStore,
    manager: &dyn NodeManager,
    mut events: broadcast::Receiver<KvEvent>,
) -> Result<()> {
    resync(store, manager).await?;

    loop {
        match events.recv().await {
            Ok(KvEvent::Upsert { key, value }) => apply_upsert(manager, &key, &value),
            Ok(KvEvent::Delete { key }) => {
                if let Some(name) = node_name_from_key(&key) {
                    manager.node_deleted(&name);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::debug!("{}: lagged {} events, resyncing", manager.name(), skipped);
                resync(store, manager).await?;
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

fn apply_upsert(manager: &dyn NodeManager, key: &str, value: &[u8]) {
    if !key.starts_with(NODES_PREFIX) {
        return;
    }
    match serde_json::from_slice::<Node>(value) {
        Ok(node) => manager.node_updated(node),
        Err(e) => log::warn!("{}: ignoring malformed node {}: {}", manager.name(), key, e),
    }
}

fn node_name_from_key(key: &str) -> Option<NodeIdentity> {
    key.strip_prefix(NODES_PREFIX)?
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(NodeIdentity::new)
}
