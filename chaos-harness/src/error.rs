//! Error types for the chaos harness.
//!
//! Only [`HarnessError`] reaches the caller. Injection and load errors are
//! expected while failures are being injected; they are counted and logged
//! by the scheduler and the engine instead of being propagated.

use chaos_cluster::ClusterError;
use std::time::Duration;

/// Errors that abort a chaos run (setup failures and API misuse).
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Cluster did not become ready in time.
    #[error("cluster not ready after {timeout:?}")]
    ReadyTimeout {
        /// How long we waited.
        timeout: Duration,
    },

    /// Cluster call failed during setup or release.
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// A load generator failed to initialize.
    #[error("load generator {generator} failed to initialize: {source}")]
    GeneratorInit {
        /// Generator name.
        generator: String,
        /// Underlying failure.
        source: LoadError,
    },

    /// Failure interval bounds are inverted.
    #[error("invalid failure interval: min {min:?} > max {max:?}")]
    InvalidInterval {
        /// Lower bound.
        min: Duration,
        /// Upper bound.
        max: Duration,
    },

    /// The scheduler or engine was already started.
    #[error("{0} already started")]
    AlreadyStarted(&'static str),

    /// The engine was built without generators or workers.
    #[error("invalid engine: {0}")]
    InvalidEngine(String),
}

/// Errors from a single load generator invocation.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Cluster operation failed (expected while instances are down).
    #[error("cluster operation failed: {0}")]
    Operation(#[from] ClusterError),

    /// Data read back differs from what was written.
    #[error("data mismatch for key {key}: expected {expected_len} bytes, read {actual_len} bytes")]
    Corruption {
        /// Key that was read.
        key: String,
        /// Length of the expected payload.
        expected_len: usize,
        /// Length of the payload read back.
        actual_len: usize,
    },

    /// A listing did not contain a key that was just written.
    #[error("key {key} missing from listing of {prefix}")]
    MissingFromListing {
        /// Key that should be listed.
        key: String,
        /// Listed prefix.
        prefix: String,
    },
}

impl LoadError {
    /// Whether the error should end the worker that hit it.
    ///
    /// Cluster errors are transient under chaos. Wrong data is not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LoadError::Corruption { .. } | LoadError::MissingFromListing { .. }
        )
    }
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
