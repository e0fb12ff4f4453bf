//! Run a chaos test against a mini cluster.

use super::{mini_cluster, ConfigArgs};
use anyhow::{Context, Result};
use chaos_harness::ChaosHarness;
use std::sync::Arc;

/// Run the run command.
pub async fn run(args: &ConfigArgs, json: bool) -> Result<()> {
    let config = Arc::new(args.load()?);
    let cluster = Arc::new(mini_cluster(&config.cluster));

    tracing::info!(
        "Starting mini cluster: {} storage nodes, {} metadata managers",
        config.cluster.storage_nodes,
        config.cluster.metadata_managers
    );

    let harness = ChaosHarness::setup(Arc::clone(&config), cluster)
        .await
        .context("Chaos run setup failed")?;

    let report = harness
        .run(interrupted())
        .await
        .context("Chaos run failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print!("{}", report);
    }

    if report.load.degraded_workers > 0 {
        anyhow::bail!(
            "{} load workers stopped on data errors",
            report.load.degraded_workers
        );
    }
    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
