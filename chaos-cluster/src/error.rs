//! Error types for cluster collaborators.

use crate::ids::InstanceId;

/// Errors returned by [`Cluster`](crate::Cluster) and
/// [`ObjectStore`](crate::ObjectStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// Not enough healthy instances to serve the request.
    #[error("cluster unavailable: {reason}")]
    Unavailable {
        /// Why the request could not be served.
        reason: String,
    },

    /// The instance does not exist in this cluster.
    #[error("unknown instance: {0}")]
    UnknownInstance(InstanceId),

    /// The instance is not in a state that allows the operation.
    #[error("invalid state for {instance}: {reason}")]
    InvalidState {
        /// The instance that rejected the operation.
        instance: InstanceId,
        /// Description of the conflict.
        reason: String,
    },

    /// The cluster did not become ready.
    #[error("cluster not ready: {0}")]
    NotReady(String),

    /// Volume does not exist.
    #[error("volume not found: {0}")]
    VolumeNotFound(String),

    /// Volume already exists.
    #[error("volume already exists: {0}")]
    VolumeExists(String),

    /// Key does not exist in the volume.
    #[error("key not found: {volume}/{key}")]
    KeyNotFound {
        /// Volume name.
        volume: String,
        /// Key name.
        key: String,
    },

    /// Fault injected by a test hook.
    #[error("injected fault: {0}")]
    Injected(String),

    /// The cluster has been released.
    #[error("cluster has been shut down")]
    Shutdown,
}

impl ClusterError {
    /// Shorthand for [`ClusterError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}
