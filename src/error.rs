use thiserror::Error;

use crate::types::Phase;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("error setting up kvstore: {0}")]
    BackendSetup(String),

    #[error("unsupported kvstore backend: {0}")]
    UnsupportedBackend(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "{phase} phase produced no successful samples ({failed} failed, {timed_out} timed out)"
    )]
    NoSamples {
        phase: Phase,
        failed: usize,
        timed_out: usize,
    },

    #[error("error generating node identity: {0}")]
    Identity(String),

    #[error("error creating node manager: {0}")]
    ManagerConstruction(String),

    #[error("discovery failed: {0}")]
    Discovery(String),
}
