//! Directory-style workload over key prefixes.
//!
//! Each call picks one of a fixed set of directories and runs
//! mkdir, create, list, read, delete against it. Directories are plain key
//! prefixes with an empty marker object named after the prefix.

use super::{LoadContext, LoadGenerator, OpSummary};
use crate::error::LoadError;
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

const ROOT: &str = "filesystem";

/// Create/list/read/delete files under a small set of directories.
#[derive(Debug)]
pub struct FilesystemLoad {
    dirs: usize,
    next_file: AtomicU64,
}

impl FilesystemLoad {
    /// Generator spreading files over `dirs` directories (at least one).
    pub fn new(dirs: usize) -> Self {
        Self {
            dirs: dirs.max(1),
            next_file: AtomicU64::new(0),
        }
    }

    /// Directory prefix for slot `n`, including the trailing slash.
    pub fn dir_name(n: usize) -> String {
        format!("{}/dir-{}/", ROOT, n)
    }
}

#[async_trait]
impl LoadGenerator for FilesystemLoad {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn generate(&self, ctx: &LoadContext, buf: &mut Vec<u8>) -> Result<OpSummary, LoadError> {
        let dir = Self::dir_name(rand::thread_rng().gen_range(0..self.dirs));
        let index = self.next_file.fetch_add(1, Ordering::Relaxed);
        let file = format!("{}file-{:016x}", dir, index);

        // mkdir -p
        ctx.store.create(&ctx.volume, &dir, &[]).await?;

        let written = ctx.write_indexed(&file, index, buf).await?;

        let listing = ctx.store.list(&ctx.volume, &dir).await?;
        if !listing.iter().any(|k| k == &file) {
            return Err(LoadError::MissingFromListing { key: file, prefix: dir });
        }

        let read = ctx.read_verified(&file, index, buf).await?;
        ctx.store.delete(&ctx.volume, &file).await?;

        Ok(OpSummary {
            operations: 5,
            bytes_written: written,
            bytes_read: read,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;
    use chaos_cluster::ObjectStore;

    #[tokio::test]
    async fn file_cycle_leaves_only_directory_markers() {
        let (cluster, ctx) = context(16, 64).await;
        let generator = FilesystemLoad::new(2);
        let mut buf = Vec::new();

        for _ in 0..50 {
            let summary = generator.generate(&ctx, &mut buf).await.unwrap();
            assert_eq!(summary.operations, 5);
            assert_eq!(summary.bytes_written, summary.bytes_read);
        }

        let remaining = cluster.list("vol", "filesystem/").await.unwrap();
        assert!(!remaining.is_empty());
        assert!(remaining.iter().all(|k| k.ends_with('/')));
        assert!(remaining.len() <= 2);
    }

    #[tokio::test]
    async fn failure_mid_sequence_is_transient() {
        let (cluster, ctx) = context(16, 64).await;
        let generator = FilesystemLoad::new(1);

        cluster.fail_next_op("metadata manager restarting");
        let err = generator.generate(&ctx, &mut Vec::new()).await.unwrap_err();
        assert!(!err.is_fatal());

        generator.generate(&ctx, &mut Vec::new()).await.unwrap();
    }

    #[test]
    fn directory_names_end_with_slash() {
        assert_eq!(FilesystemLoad::dir_name(3), "filesystem/dir-3/");
    }
}
