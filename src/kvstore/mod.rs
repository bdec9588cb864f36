pub mod memory;
pub mod traits;

pub use memory::InMemoryKvStore;
pub use traits::{KvEvent, KvStore};

use anyhow::Result;
use std::sync::Arc;

use crate::config::{BackendKind, BackendOptions};

/// Connect to the coordination backend once; the handle is passed to every
/// discovery instance.
pub fn setup(options: &BackendOptions) -> Result<Arc<dyn KvStore>> {
    let resolved = options.resolve()?;

    match resolved.kind {
        BackendKind::Memory => {
            log::info!(
                "Using in-process kvstore {} (latency {:?})",
                resolved.address,
                resolved.latency
            );
            Ok(Arc::new(
                InMemoryKvStore::new(resolved.address).with_latency(resolved.latency),
            ))
        }
    }
}
