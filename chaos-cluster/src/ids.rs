//! Service and instance identity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Class of cluster service eligible for failure injection.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    /// Instance holding data blocks.
    #[serde(alias = "datanode", alias = "node")]
    StorageNode,
    /// Instance managing namespace and metadata.
    #[serde(alias = "manager", alias = "om")]
    MetadataManager,
}

impl ServiceType {
    /// Canonical name used in instance ids and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::StorageNode => "storage-node",
            ServiceType::MetadataManager => "metadata-manager",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a service name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown service type '{0}' (expected datanode or manager)")]
pub struct ParseServiceTypeError(String);

impl FromStr for ServiceType {
    type Err = ParseServiceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "datanode" | "node" | "storage-node" | "storagenode" => Ok(ServiceType::StorageNode),
            "om" | "manager" | "metadata-manager" | "metadatamanager" => {
                Ok(ServiceType::MetadataManager)
            }
            _ => Err(ParseServiceTypeError(s.to_string())),
        }
    }
}

/// Identifies one service instance within a cluster.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId {
    service: ServiceType,
    index: usize,
}

impl InstanceId {
    /// Create an instance id.
    pub fn new(service: ServiceType, index: usize) -> Self {
        Self { service, index }
    }

    /// Service type of this instance.
    pub fn service(&self) -> ServiceType {
        self.service
    }

    /// Index of this instance among instances of the same type.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.service, self.index)
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self)
    }
}

// Serialized as its display form ("storage-node-3") in reports.
impl Serialize for InstanceId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
