use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

use super::traits::{KvEvent, KvStore};

const EVENT_CAPACITY: usize = 4096;

/// Process-local coordination store.
///
/// Every write becomes visible, and is broadcast to watchers, only after
/// `latency` has passed.
#[derive(Clone)]
pub struct InMemoryKvStore {
    name: String,
    latency: Duration,
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    events: broadcast::Sender<KvEvent>,
}

impl InMemoryKvStore {
    pub fn new(name: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            name: name.into(),
            latency: Duration::ZERO,
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            events,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn propagate(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn publish(&self, event: KvEvent) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(event);
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.propagate().await;
        {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| anyhow!("kvstore lock poisoned"))?;
            entries.insert(key.to_string(), value.clone());
        }
        self.publish(KvEvent::Upsert {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.propagate().await;
        let removed = {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| anyhow!("kvstore lock poisoned"))?;
            entries.remove(key).is_some()
        };
        if removed {
            self.publish(KvEvent::Delete {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow!("kvstore lock poisoned"))?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn watch(&self) -> broadcast::Receiver<KvEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_list_prefix() {
        let store = InMemoryKvStore::default();
        store.upsert("nodes/a", b"1".to_vec()).await.unwrap();
        store.upsert("nodes/b", b"2".to_vec()).await.unwrap();
        store.upsert("other/c", b"3".to_vec()).await.unwrap();

        let listed = store.list_prefix("nodes/").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0, "nodes/a");
        assert_eq!(listed[1].1, b"2".to_vec());
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = InMemoryKvStore::default();
        store.upsert("k", b"old".to_vec()).await.unwrap();
        store.upsert("k", b"new".to_vec()).await.unwrap();

        assert_eq!(store.len(), 1);
        let listed = store.list_prefix("k").await.unwrap();
        assert_eq!(listed[0].1, b"new".to_vec());
    }

    #[tokio::test]
    async fn test_watch_sees_later_writes() {
        let store = InMemoryKvStore::default();
        let mut rx = store.watch();

        store.upsert("k", b"v".to_vec()).await.unwrap();
        store.delete("k").await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            KvEvent::Upsert {
                key: "k".to_string(),
                value: b"v".to_vec()
            }
        );
        assert_eq!(rx.recv().await.unwrap().key(), "k");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_silent() {
        let store = InMemoryKvStore::default();
        let mut rx = store.watch();
        store.delete("missing").await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_visibility() {
        let store = InMemoryKvStore::default().with_latency(Duration::from_millis(100));
        let writer = store.clone();
        let start = tokio::time::Instant::now();

        let handle = tokio::spawn(async move { writer.upsert("k", b"v".to_vec()).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_empty());

        handle.await.unwrap().unwrap();
        assert_eq!(store.len(), 1);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
