pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod kvstore;
pub mod types;

pub use config::BenchConfig;
pub use error::HarnessError;
pub use types::*;
