pub mod dataplane;
pub mod manager;
pub mod provider;
pub mod service;
pub mod traits;

pub use dataplane::FakeDataplane;
pub use manager::Manager;
pub use provider::KvStoreDiscovery;
pub use service::NodeDiscovery;
pub use traits::{Discovery, DiscoveryProvider, NodeHandler, NodeManager};
