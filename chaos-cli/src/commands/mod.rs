//! CLI command implementations.

pub mod config;
pub mod run;

use anyhow::{Context, Result};
use chaos_cluster::{MiniCluster, ServiceType};
use chaos_harness::{ClusterConfig, GeneratorKind, RunConfig};
use clap::Args;
use std::path::PathBuf;

/// Configuration source plus command-line overrides.
///
/// Precedence: flag, then `--config` file, then built-in defaults.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of storage nodes [default: 20]
    #[arg(short = 'd', long)]
    pub num_datanodes: Option<usize>,

    /// Number of metadata managers [default: 1]
    #[arg(short = 'o', long)]
    pub num_managers: Option<usize>,

    /// Service type to fail: datanode or manager [default: datanode]
    #[arg(short = 's', long)]
    pub failure_service: Option<ServiceType>,

    /// Number of load worker threads [default: 5]
    #[arg(short = 't', long)]
    pub num_threads: Option<usize>,

    /// Number of pooled I/O buffers [default: 16]
    #[arg(short = 'b', long)]
    pub num_buffers: Option<usize>,

    /// Run duration in minutes [default: 1440]
    #[arg(short = 'm', long, conflicts_with = "duration_secs")]
    pub num_minutes: Option<u64>,

    /// Run duration in seconds
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Data volumes per storage node [default: 3]
    #[arg(short = 'v', long)]
    pub num_data_volumes: Option<usize>,

    /// Seconds between failures, sets both bounds [default: 300]
    #[arg(short = 'i', long)]
    pub failure_interval: Option<u64>,

    /// Lower bound of the seconds between failures
    #[arg(long)]
    pub min_interval: Option<u64>,

    /// Upper bound of the seconds between failures
    #[arg(long)]
    pub max_interval: Option<u64>,

    /// Milliseconds a failed instance stays down [default: 0]
    #[arg(long)]
    pub downtime_ms: Option<u64>,

    /// Load generators to run, comma separated (random, read-only, filesystem, aged)
    #[arg(long, value_delimiter = ',')]
    pub generators: Option<Vec<GeneratorKind>>,

    /// Disable failure injection
    #[arg(long)]
    pub no_chaos: bool,
}

impl ConfigArgs {
    /// Build the validated run configuration.
    pub fn load(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => RunConfig::default(),
        };
        self.apply(&mut config);
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn apply(&self, config: &mut RunConfig) {
        let cluster = &mut config.cluster;
        if let Some(n) = self.num_datanodes {
            cluster.storage_nodes = n;
        }
        if let Some(n) = self.num_managers {
            cluster.metadata_managers = n;
        }
        if let Some(n) = self.num_data_volumes {
            cluster.data_volumes = n;
        }

        let failure = &mut config.failure;
        if let Some(service) = self.failure_service {
            failure.service = service;
        }
        if let Some(secs) = self.failure_interval {
            failure.min_interval_secs = secs;
            failure.max_interval_secs = secs;
        }
        if let Some(secs) = self.min_interval {
            failure.min_interval_secs = secs;
        }
        if let Some(secs) = self.max_interval {
            failure.max_interval_secs = secs;
        }
        if let Some(ms) = self.downtime_ms {
            failure.downtime_ms = ms;
        }
        if self.no_chaos {
            failure.enabled = false;
        }

        let load = &mut config.load;
        if let Some(n) = self.num_threads {
            load.workers = n;
        }
        if let Some(n) = self.num_buffers {
            load.buffers = n;
        }
        if let Some(minutes) = self.num_minutes {
            load.duration_secs = minutes * 60;
        }
        if let Some(secs) = self.duration_secs {
            load.duration_secs = secs;
        }
        if let Some(generators) = &self.generators {
            load.generators = generators.clone();
        }
    }
}

/// In-memory cluster shaped by `config`.
pub fn mini_cluster(config: &ClusterConfig) -> MiniCluster {
    MiniCluster::builder()
        .storage_nodes(config.storage_nodes)
        .metadata_managers(config.metadata_managers)
        .data_volumes(config.data_volumes)
        .replication(config.replication)
        .build()
}
