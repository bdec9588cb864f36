pub mod agent;
pub mod orchestrator;
pub mod stats;
pub mod watcher;

pub use agent::VirtualNodeAgent;
pub use orchestrator::Orchestrator;
pub use stats::{mean_std_dev, StatsError, Summary};
pub use watcher::wait_for_count;
