//! # minichaos
//!
//! Failure injection and load generation harness for distributed storage
//! clusters.
//!
//! A chaos run combines two independently cancellable engines:
//!
//! - [`FailureScheduler`] stops and restarts a random instance of one service
//!   type (storage node or metadata manager) at random intervals
//! - [`LoadGeneratorEngine`] runs a pool of workers executing pluggable
//!   [`LoadGenerator`](load::LoadGenerator) strategies over a shared
//!   [`BufferPool`]
//!
//! [`ChaosHarness`] sets both up against a cluster, runs them concurrently
//! for a fixed duration, and tears everything down in order.
//!
//! ## Example
//!
//! ```no_run
//! use chaos_cluster::MiniCluster;
//! use minichaos::{ChaosHarness, RunConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> minichaos::Result<()> {
//! let config = Arc::new(RunConfig::default());
//! let cluster = Arc::new(MiniCluster::builder().storage_nodes(20).build());
//!
//! let harness = ChaosHarness::setup(config, cluster).await?;
//! let report = harness.run(std::future::pending()).await?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assertions;
pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod failure;
pub mod harness;
pub mod load;
pub mod report;

pub use buffer::{BufferPool, PoolError, PooledBuffer};
pub use config::{ClusterConfig, ConfigError, FailureConfig, LoadConfig, RunConfig};
pub use engine::{EngineBuilder, EngineReport, GeneratorReport, LoadGeneratorEngine, Selection};
pub use error::{HarnessError, LoadError, Result};
pub use failure::{
    FailureAction, FailureEvent, FailureInjector, FailureOutcome, FailureScheduler, FailureStats,
    InjectError,
};
pub use harness::ChaosHarness;
pub use load::{GeneratorKind, LoadContext, LoadGenerator, OpSummary, PayloadSpec};
pub use report::RunReport;
