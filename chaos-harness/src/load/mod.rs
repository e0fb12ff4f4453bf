//! Pluggable load generators.
//!
//! A [`LoadGenerator`] performs one logical operation (or a short bounded
//! sequence such as write-then-read) against the object store per call to
//! [`generate`](LoadGenerator::generate), using a buffer the engine borrowed
//! from the [`BufferPool`](crate::buffer::BufferPool).
//!
//! Payload bytes are a pure function of a key index ([`PayloadSpec`]), so any
//! generator can verify what it reads back without remembering the data.
//!
//! | Kind | Behaviour |
//! |------|-----------|
//! | `random` | create / read / delete / list chosen at random |
//! | `read-only` | reads a fixed key set written at initialization |
//! | `filesystem` | directory marker, file create, list, read, delete |
//! | `aged` | writes keys and later re-reads them from a rolling record |

mod aged;
mod filesystem;
mod random;
mod read_only;

pub use aged::AgedLoad;
pub use filesystem::FilesystemLoad;
pub use random::RandomLoad;
pub use read_only::ReadOnlyLoad;

use crate::config::LoadConfig;
use crate::error::LoadError;
use async_trait::async_trait;
use chaos_cluster::ObjectStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const ALPHABET: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// Everything a generator needs to talk to the cluster.
#[derive(Clone)]
pub struct LoadContext {
    /// Object store client.
    pub store: Arc<dyn ObjectStore>,
    /// Volume all generators write into.
    pub volume: String,
    /// Payload size bounds and content.
    pub payload: PayloadSpec,
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadContext")
            .field("volume", &self.volume)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

impl LoadContext {
    /// Fill `buf` with the payload for `index` and write it under `key`.
    pub async fn write_indexed(
        &self,
        key: &str,
        index: u64,
        buf: &mut Vec<u8>,
    ) -> Result<u64, LoadError> {
        self.payload.fill(index, buf);
        self.store.create(&self.volume, key, buf).await?;
        Ok(buf.len() as u64)
    }

    /// Read `key` and check it holds the payload for `index`.
    ///
    /// `buf` is overwritten with the expected payload.
    pub async fn read_verified(
        &self,
        key: &str,
        index: u64,
        buf: &mut Vec<u8>,
    ) -> Result<u64, LoadError> {
        let actual = self.store.read(&self.volume, key).await?;
        self.payload.fill(index, buf);
        if actual != buf.as_slice() {
            return Err(LoadError::Corruption {
                key: key.to_string(),
                expected_len: buf.len(),
                actual_len: actual.len(),
            });
        }
        Ok(actual.len() as u64)
    }
}

/// Deterministic payloads keyed by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSpec {
    min_len: usize,
    max_len: usize,
}

impl PayloadSpec {
    /// Payloads between `min_len` and `max_len` bytes inclusive.
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self {
            min_len: min_len.min(max_len),
            max_len: max_len.max(min_len),
        }
    }

    /// Largest payload this spec produces.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Payload length for `index`, spread across the configured bounds.
    pub fn len_for(&self, index: u64) -> usize {
        let span = (self.max_len - self.min_len) as u64 + 1;
        self.min_len + (mix(index) % span) as usize
    }

    /// Replace the contents of `buf` with the payload for `index`.
    pub fn fill(&self, index: u64, buf: &mut Vec<u8>) {
        let len = self.len_for(index);
        let offset = (mix(index.rotate_left(17)) % ALPHABET.len() as u64) as usize;
        buf.clear();
        buf.extend((0..len).map(|i| ALPHABET[(offset + i) % ALPHABET.len()]));
    }
}

// splitmix64 finalizer
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Key name for an indexed object under a generator prefix.
pub fn key_name(prefix: &str, index: u64) -> String {
    format!("{}/key-{:016x}", prefix, index)
}

/// What one `generate` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpSummary {
    /// Cluster calls issued.
    pub operations: u32,
    /// Payload bytes written.
    pub bytes_written: u64,
    /// Payload bytes read.
    pub bytes_read: u64,
}

/// A strategy producing one class of cluster operations.
///
/// Implementations are shared by all workers and must keep any mutable state
/// behind their own synchronization.
#[async_trait]
pub trait LoadGenerator: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &'static str;

    /// One-time preparation before workers start (for example, seeding keys).
    async fn initialize(&self, _ctx: &LoadContext) -> Result<(), LoadError> {
        Ok(())
    }

    /// Perform one unit of load using `buf` as scratch space.
    async fn generate(&self, ctx: &LoadContext, buf: &mut Vec<u8>) -> Result<OpSummary, LoadError>;
}

/// Registry of built-in generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratorKind {
    /// [`RandomLoad`]
    Random,
    /// [`ReadOnlyLoad`]
    ReadOnly,
    /// [`FilesystemLoad`]
    Filesystem,
    /// [`AgedLoad`]
    Aged,
}

impl GeneratorKind {
    /// Every built-in generator.
    pub const ALL: [GeneratorKind; 4] = [
        GeneratorKind::Random,
        GeneratorKind::ReadOnly,
        GeneratorKind::Filesystem,
        GeneratorKind::Aged,
    ];

    /// Registry name.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::Random => "random",
            GeneratorKind::ReadOnly => "read-only",
            GeneratorKind::Filesystem => "filesystem",
            GeneratorKind::Aged => "aged",
        }
    }

    /// Instantiate the generator with settings from `config`.
    pub fn build(&self, config: &LoadConfig) -> Arc<dyn LoadGenerator> {
        match self {
            GeneratorKind::Random => Arc::new(RandomLoad::new()),
            GeneratorKind::ReadOnly => Arc::new(ReadOnlyLoad::new(config.read_only_keys)),
            GeneratorKind::Filesystem => Arc::new(FilesystemLoad::new(config.filesystem_dirs)),
            GeneratorKind::Aged => Arc::new(AgedLoad::new(config.aged_retention)),
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeneratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GeneratorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown load generator '{}'", s))
    }
}

/// Build every generator named in `config.generators`, in order.
pub fn build_generators(config: &LoadConfig) -> Vec<Arc<dyn LoadGenerator>> {
    config.generators.iter().map(|kind| kind.build(config)).collect()
}
