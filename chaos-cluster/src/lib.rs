//! # minichaos-cluster
//!
//! Collaborator interfaces between the chaos harness and the storage cluster
//! under test.
//!
//! The harness never talks to a concrete cluster. It drives two traits:
//!
//! - [`Cluster`] - service instance lifecycle (list, stop, start, readiness)
//! - [`ObjectStore`] - volume-scoped create/read/delete/list
//!
//! ## Architecture
//!
//! ```text
//!   FailureScheduler ──stop/start──┐        ┌──create/read/delete/list── LoadGeneratorEngine
//!                                  ▼        ▼
//!                          ┌──────────────────────────┐
//!                          │   Cluster + ObjectStore  │
//!                          │  (MiniCluster or a real  │
//!                          │   cluster adapter)       │
//!                          └──────────────────────────┘
//! ```
//!
//! [`MiniCluster`] is an in-memory implementation of both traits used by the
//! test suite and the `minichaos` CLI.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ids;
pub mod mini;

pub use error::ClusterError;
pub use ids::{InstanceId, ServiceType};
pub use mini::{MiniCluster, MiniClusterBuilder};

use async_trait::async_trait;

/// Service instance lifecycle operations.
///
/// Implementations must tolerate `stop`/`start` calls on different instances
/// running concurrently with object-store traffic.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Running instances of the given service type.
    ///
    /// Instances that are currently stopped are not listed.
    async fn list_instances_of(&self, service: ServiceType) -> Result<Vec<InstanceId>, ClusterError>;

    /// Stop a running instance.
    async fn stop(&self, instance: &InstanceId) -> Result<(), ClusterError>;

    /// Start a stopped instance. Starting a running instance is a no-op.
    async fn start(&self, instance: &InstanceId) -> Result<(), ClusterError>;

    /// Wait until the cluster can serve traffic.
    ///
    /// Callers bound this with their own timeout.
    async fn wait_ready(&self) -> Result<(), ClusterError>;

    /// Release the cluster. Every later call fails with [`ClusterError::Shutdown`].
    async fn shutdown(&self) -> Result<(), ClusterError>;
}

/// Volume-scoped object operations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a volume. Fails if the volume already exists.
    async fn create_volume(&self, volume: &str) -> Result<(), ClusterError>;

    /// Write (or overwrite) an object.
    async fn create(&self, volume: &str, key: &str, data: &[u8]) -> Result<(), ClusterError>;

    /// Read an object.
    async fn read(&self, volume: &str, key: &str) -> Result<Vec<u8>, ClusterError>;

    /// Delete an object.
    async fn delete(&self, volume: &str, key: &str) -> Result<(), ClusterError>;

    /// List keys starting with `prefix`, in lexicographic order.
    async fn list(&self, volume: &str, prefix: &str) -> Result<Vec<String>, ClusterError>;
}
