use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use nodeperf::config::BenchConfig;
use nodeperf::discovery::KvStoreDiscovery;
use nodeperf::engine::Orchestrator;
use nodeperf::kvstore;

#[derive(Parser)]
#[command(name = "nodeperf")]
#[command(about = "Measure node discovery convergence time", long_about = None)]
#[command(version)]
struct Cli {
    /// Number of concurrent node discovery agents set up initially
    #[arg(long, default_value_t = 1)]
    initial_count: usize,

    /// Number of nodes registered after initial nodes are set up
    #[arg(long, default_value_t = 0)]
    additional_count: usize,

    /// Number of nodes to expect from other nodeperf clients
    #[arg(long, default_value_t = 0)]
    external_count: usize,

    /// Coordination backend kind [env: NODEPERF_BACKEND, default: memory]
    #[arg(long)]
    backend: Option<String>,

    /// Coordination backend address [env: NODEPERF_BACKEND_ADDRESS, default: 127.0.0.1:2379]
    #[arg(long)]
    backend_address: Option<String>,

    /// Backend config file (TOML), takes precedence over the address
    #[arg(long)]
    backend_config: Option<PathBuf>,

    /// Simulated write propagation delay of the in-process backend [default: 0]
    #[arg(long)]
    backend_latency_ms: Option<u64>,

    /// Interval between membership checks [default: 1000]
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Give up on a phase after this many seconds
    #[arg(long)]
    phase_timeout_secs: Option<u64>,

    /// Line printed before the results, e.g. the node count of this run
    #[arg(long)]
    label: Option<String>,

    /// Print each phase report as a JSON line
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Flags win over `NODEPERF_*` variables, which win over defaults.
    fn apply(&self, mut config: BenchConfig) -> BenchConfig {
        config.initial_count = self.initial_count;
        config.additional_count = self.additional_count;
        config.external_count = self.external_count;

        if let Some(kind) = &self.backend {
            config.backend.kind = kind.clone();
        }
        if let Some(address) = &self.backend_address {
            config.backend.address = address.clone();
        }
        if let Some(path) = &self.backend_config {
            config.backend.config_file = Some(path.clone());
        }
        if let Some(ms) = self.backend_latency_ms {
            config.backend.latency = Duration::from_millis(ms);
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = self.phase_timeout_secs {
            config.phase_timeout = Some(Duration::from_secs(secs));
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()
        .context("initializing logger")?;

    let config = cli.apply(BenchConfig::from_env()?);
    config.validate()?;
    let added = config.additional_count;

    if config.backend.config_file.is_some() {
        log::info!("Setting config");
    } else {
        log::info!("Setting address");
    }
    let store = kvstore::setup(&config.backend)?;
    let provider = Arc::new(KvStoreDiscovery::new(store));

    if let Some(label) = &cli.label {
        println!("{}", label);
    }

    // Each phase prints as soon as it completes so a failing additional
    // phase still leaves the initial result on stdout.
    Orchestrator::new(config, provider)
        .run_with(|report| {
            if cli.json {
                println!("{}", serde_json::to_string(report)?);
            } else {
                println!("{}", report.stat_line(added));
            }
            Ok(())
        })
        .await?;

    Ok(())
}
