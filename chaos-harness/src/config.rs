//! Run configuration.
//!
//! A [`RunConfig`] is loaded once (TOML file, CLI overrides, or defaults),
//! validated, and then shared read-only by the scheduler and the engine.
//! Every section and field is optional in the file.

use crate::engine::Selection;
use crate::load::GeneratorKind;
use chaos_cluster::ServiceType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for a chaos run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Cluster shape and readiness.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Failure injection.
    #[serde(default)]
    pub failure: FailureConfig,
    /// Load generation.
    #[serde(default)]
    pub load: LoadConfig,
}

/// Cluster shape and readiness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Number of storage nodes (default: 20).
    #[serde(default = "default_storage_nodes")]
    pub storage_nodes: usize,
    /// Number of metadata managers (default: 1).
    #[serde(default = "default_metadata_managers")]
    pub metadata_managers: usize,
    /// Data volumes per storage node (default: 3).
    #[serde(default = "default_data_volumes")]
    pub data_volumes: usize,
    /// Replicas per object (default: 3).
    #[serde(default = "default_replication")]
    pub replication: usize,
    /// How long to wait for the cluster to become ready (default: 120s).
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

/// Failure injection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureConfig {
    /// Run the failure scheduler at all (default: true).
    #[serde(default = "default_failure_enabled")]
    pub enabled: bool,
    /// Service type to inject failures into (default: storage node).
    #[serde(default = "default_failure_service")]
    pub service: ServiceType,
    /// Lower bound of the wait between injections (default: 300s).
    #[serde(default = "default_failure_interval_secs")]
    pub min_interval_secs: u64,
    /// Upper bound of the wait between injections (default: 300s).
    #[serde(default = "default_failure_interval_secs")]
    pub max_interval_secs: u64,
    /// Time an instance stays down before restart (default: 0 = immediate).
    #[serde(default)]
    pub downtime_ms: u64,
}

/// Load generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Number of concurrent workers (default: 5).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Number of pooled I/O buffers (default: 16).
    #[serde(default = "default_buffers")]
    pub buffers: usize,
    /// Total run duration (default: 1 day).
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    /// How workers pick a generator each iteration (default: random).
    #[serde(default)]
    pub selection: Selection,
    /// Generators to run (default: all four).
    #[serde(default = "default_generators")]
    pub generators: Vec<GeneratorKind>,
    /// Smallest payload written (default: 1 KiB).
    #[serde(default = "default_min_payload_bytes")]
    pub min_payload_bytes: usize,
    /// Largest payload written (default: 64 KiB).
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    /// Longest a worker waits for a free buffer before retrying (default: 5s).
    #[serde(default = "default_checkout_timeout_ms")]
    pub checkout_timeout_ms: u64,
    /// Keys written up front by the read-only generator (default: 10).
    #[serde(default = "default_read_only_keys")]
    pub read_only_keys: usize,
    /// Keys tracked by the aged generator before the oldest is evicted (default: 1000).
    #[serde(default = "default_aged_retention")]
    pub aged_retention: usize,
    /// Directories used by the filesystem generator (default: 8).
    #[serde(default = "default_filesystem_dirs")]
    pub filesystem_dirs: usize,
}

// Default value functions
fn default_storage_nodes() -> usize {
    20
}

fn default_metadata_managers() -> usize {
    1
}

fn default_data_volumes() -> usize {
    3
}

fn default_replication() -> usize {
    3
}

fn default_ready_timeout_secs() -> u64 {
    120
}

fn default_failure_enabled() -> bool {
    true
}

fn default_failure_service() -> ServiceType {
    ServiceType::StorageNode
}

fn default_failure_interval_secs() -> u64 {
    300 // 5 minutes between failures
}

fn default_workers() -> usize {
    5
}

fn default_buffers() -> usize {
    16
}

fn default_duration_secs() -> u64 {
    24 * 60 * 60 // 1 day
}

fn default_generators() -> Vec<GeneratorKind> {
    vec![
        GeneratorKind::Random,
        GeneratorKind::Aged,
        GeneratorKind::Filesystem,
        GeneratorKind::ReadOnly,
    ]
}

fn default_min_payload_bytes() -> usize {
    1024
}

fn default_max_payload_bytes() -> usize {
    64 * 1024
}

fn default_checkout_timeout_ms() -> u64 {
    5000
}

fn default_read_only_keys() -> usize {
    10
}

fn default_aged_retention() -> usize {
    1000
}

fn default_filesystem_dirs() -> usize {
    8
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            storage_nodes: default_storage_nodes(),
            metadata_managers: default_metadata_managers(),
            data_volumes: default_data_volumes(),
            replication: default_replication(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            enabled: default_failure_enabled(),
            service: default_failure_service(),
            min_interval_secs: default_failure_interval_secs(),
            max_interval_secs: default_failure_interval_secs(),
            downtime_ms: 0,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            buffers: default_buffers(),
            duration_secs: default_duration_secs(),
            selection: Selection::default(),
            generators: default_generators(),
            min_payload_bytes: default_min_payload_bytes(),
            max_payload_bytes: default_max_payload_bytes(),
            checkout_timeout_ms: default_checkout_timeout_ms(),
            read_only_keys: default_read_only_keys(),
            aged_retention: default_aged_retention(),
            filesystem_dirs: default_filesystem_dirs(),
        }
    }
}

impl ClusterConfig {
    /// Readiness timeout as a [`Duration`].
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

impl FailureConfig {
    /// Lower interval bound as a [`Duration`].
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    /// Upper interval bound as a [`Duration`].
    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }

    /// Downtime as a [`Duration`].
    pub fn downtime(&self) -> Duration {
        Duration::from_millis(self.downtime_ms)
    }
}

impl LoadConfig {
    /// Run duration as a [`Duration`].
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Buffer checkout timeout as a [`Duration`].
    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(self.checkout_timeout_ms)
    }
}

impl RunConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed. The result is
    /// not validated; call [`RunConfig::validate`] after applying overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let load = &self.load;
        if load.workers == 0 {
            return Err(ConfigError::invalid("load.workers must be > 0"));
        }
        if load.buffers == 0 {
            return Err(ConfigError::invalid("load.buffers must be > 0"));
        }
        if load.duration_secs == 0 {
            return Err(ConfigError::invalid("load.duration_secs must be > 0"));
        }
        if load.generators.is_empty() {
            return Err(ConfigError::invalid("load.generators must not be empty"));
        }
        // Instances of one kind share a key prefix and would clobber each other.
        for (i, kind) in load.generators.iter().enumerate() {
            if load.generators[..i].contains(kind) {
                return Err(ConfigError::invalid(format!(
                    "load.generators lists '{}' more than once",
                    kind
                )));
            }
        }
        if load.min_payload_bytes > load.max_payload_bytes {
            return Err(ConfigError::invalid(format!(
                "load.min_payload_bytes ({}) exceeds load.max_payload_bytes ({})",
                load.min_payload_bytes, load.max_payload_bytes
            )));
        }
        if load.generators.contains(&GeneratorKind::ReadOnly) && load.read_only_keys == 0 {
            return Err(ConfigError::invalid("load.read_only_keys must be > 0"));
        }
        if load.generators.contains(&GeneratorKind::Aged) && load.aged_retention == 0 {
            return Err(ConfigError::invalid("load.aged_retention must be > 0"));
        }
        if load.generators.contains(&GeneratorKind::Filesystem) && load.filesystem_dirs == 0 {
            return Err(ConfigError::invalid("load.filesystem_dirs must be > 0"));
        }

        let failure = &self.failure;
        if failure.min_interval_secs > failure.max_interval_secs {
            return Err(ConfigError::invalid(format!(
                "failure.min_interval_secs ({}) exceeds failure.max_interval_secs ({})",
                failure.min_interval_secs, failure.max_interval_secs
            )));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to render configuration.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),
    /// Configuration values are inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }
}
