use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvEvent {
    Upsert { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl KvEvent {
    pub fn key(&self) -> &str {
        match self {
            KvEvent::Upsert { key, .. } => key,
            KvEvent::Delete { key } => key,
        }
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Human readable name of the backend, used in logs.
    fn name(&self) -> &str;

    async fn upsert(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Subscribe to every change applied after this call.
    ///
    /// Callers filter by key prefix themselves.
    fn watch(&self) -> broadcast::Receiver<KvEvent>;
}
