use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::HarnessError;

pub const DEFAULT_BACKEND_ADDRESS: &str = "127.0.0.1:2379";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const ENV_BACKEND: &str = "NODEPERF_BACKEND";
pub const ENV_BACKEND_ADDRESS: &str = "NODEPERF_BACKEND_ADDRESS";
pub const ENV_BACKEND_CONFIG: &str = "NODEPERF_BACKEND_CONFIG";
pub const ENV_BACKEND_LATENCY_MS: &str = "NODEPERF_BACKEND_LATENCY_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "NODEPERF_POLL_INTERVAL_MS";
pub const ENV_PHASE_TIMEOUT_SECS: &str = "NODEPERF_PHASE_TIMEOUT_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
}

impl BackendKind {
    pub fn parse(kind: &str) -> Result<Self, HarnessError> {
        match kind.to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            other => Err(HarnessError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// How to reach the coordination backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendOptions {
    pub kind: String,
    pub address: String,
    /// Takes precedence over `address` when set.
    pub config_file: Option<PathBuf>,
    pub latency: Duration,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            kind: "memory".to_string(),
            address: DEFAULT_BACKEND_ADDRESS.to_string(),
            config_file: None,
            latency: Duration::ZERO,
        }
    }
}

/// Contents of a backend config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BackendFile {
    pub kind: Option<String>,
    pub address: Option<String>,
    pub latency_ms: Option<u64>,
}

impl BackendFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading backend config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing backend config {}", path.display()))
    }
}

/// Backend options after folding in the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBackend {
    pub kind: BackendKind,
    pub address: String,
    pub latency: Duration,
}

impl BackendOptions {
    pub fn resolve(&self) -> Result<ResolvedBackend> {
        let mut kind = self.kind.clone();
        let mut address = self.address.clone();
        let mut latency = self.latency;

        if let Some(path) = &self.config_file {
            let file = BackendFile::load(path)?;
            if let Some(k) = file.kind {
                kind = k;
            }
            if let Some(a) = file.address {
                address = a;
            }
            if let Some(ms) = file.latency_ms {
                latency = Duration::from_millis(ms);
            }
        }

        Ok(ResolvedBackend {
            kind: BackendKind::parse(&kind)?,
            address,
            latency,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    pub initial_count: usize,
    pub additional_count: usize,
    /// Nodes expected from other harness processes sharing the backend.
    pub external_count: usize,
    pub backend: BackendOptions,
    pub poll_interval: Duration,
    pub phase_timeout: Option<Duration>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            initial_count: 1,
            additional_count: 0,
            external_count: 0,
            backend: BackendOptions::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            phase_timeout: None,
        }
    }
}

impl BenchConfig {
    /// Defaults with the `NODEPERF_*` environment variables applied.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides read through `lookup`. Counts are not read
    /// from the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(kind) = lookup(ENV_BACKEND) {
            config.backend.kind = kind;
        }
        if let Some(address) = lookup(ENV_BACKEND_ADDRESS) {
            config.backend.address = address;
        }
        if let Some(path) = lookup(ENV_BACKEND_CONFIG) {
            config.backend.config_file = Some(PathBuf::from(path));
        }
        if let Some(ms) = parse_var(&lookup, ENV_BACKEND_LATENCY_MS)? {
            config.backend.latency = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, ENV_POLL_INTERVAL_MS)? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var(&lookup, ENV_PHASE_TIMEOUT_SECS)? {
            config.phase_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.initial_count == 0 {
            return Err(HarnessError::InvalidConfig(
                "initial count must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(HarnessError::InvalidConfig(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if matches!(self.phase_timeout, Some(t) if t.is_zero()) {
            return Err(HarnessError::InvalidConfig(
                "phase timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn initial_target(&self) -> usize {
        self.initial_count + self.external_count
    }

    pub fn escalated_target(&self) -> usize {
        self.initial_count + self.additional_count + self.external_count
    }
}

fn parse_var<F>(lookup: &F, key: &str) -> Result<Option<u64>, HarnessError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| HarnessError::InvalidConfig(format!("{key}={raw:?} is not a number")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = BenchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_target(), 1);
    }

    #[test]
    fn test_targets_include_external_nodes() {
        let config = BenchConfig {
            initial_count: 3,
            additional_count: 2,
            external_count: 6,
            ..Default::default()
        };
        assert_eq!(config.initial_target(), 9);
        assert_eq!(config.escalated_target(), 11);
    }

    #[test]
    fn test_zero_initial_count_rejected() {
        let config = BenchConfig {
            initial_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HarnessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = BenchConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_kind() {
        let options = BackendOptions {
            kind: "etcd".to_string(),
            ..Default::default()
        };
        let err = options.resolve().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::UnsupportedBackend(k)) if k == "etcd"
        ));
    }

    #[test]
    fn test_config_file_overrides_address() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "address = \"10.0.0.1:2379\"\nlatency_ms = 250").unwrap();

        let options = BackendOptions {
            config_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let resolved = options.resolve().unwrap();
        assert_eq!(resolved.kind, BackendKind::Memory);
        assert_eq!(resolved.address, "10.0.0.1:2379");
        assert_eq!(resolved.latency, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let options = BackendOptions {
            config_file: Some(PathBuf::from("/nonexistent/nodeperf/backend.toml")),
            ..Default::default()
        };
        assert!(options.resolve().is_err());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = BenchConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config.backend.kind, "memory");
        assert_eq!(config.backend.address, DEFAULT_BACKEND_ADDRESS);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.phase_timeout, None);
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let config = BenchConfig::from_lookup(env(&[
            (ENV_BACKEND_ADDRESS, "10.0.0.2:2379"),
            (ENV_BACKEND_CONFIG, "/etc/nodeperf/backend.toml"),
            (ENV_BACKEND_LATENCY_MS, "40"),
            (ENV_POLL_INTERVAL_MS, "250"),
            (ENV_PHASE_TIMEOUT_SECS, " 30 "),
        ]))
        .unwrap();

        assert_eq!(config.backend.address, "10.0.0.2:2379");
        assert_eq!(
            config.backend.config_file,
            Some(PathBuf::from("/etc/nodeperf/backend.toml"))
        );
        assert_eq!(config.backend.latency, Duration::from_millis(40));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.phase_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.initial_count, 1);
    }

    #[test]
    fn test_malformed_environment_value_rejected() {
        let err = BenchConfig::from_lookup(env(&[(ENV_POLL_INTERVAL_MS, "fast")])).unwrap_err();
        match err {
            HarnessError::InvalidConfig(msg) => assert!(msg.contains(ENV_POLL_INTERVAL_MS)),
            other => panic!("unexpected error: {other}"),
        }
    }
}
