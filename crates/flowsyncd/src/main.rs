//! Flow-rule reconciliation daemon entry point.

use anyhow::Context;
use clap::Parser;
use flowsync_core::MemoryRuleStore;
use flowsyncd::config::DaemonConfig;
use flowsyncd::loopback::LoopbackTransport;
use flowsyncd::Daemon;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "flowsyncd", about = "SDN flow-rule reconciliation daemon")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the retry budget per flow-mod.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Override the stats audit interval in seconds (0 disables).
    #[arg(long)]
    audit_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("flowsyncd=info".parse()?))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => DaemonConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => DaemonConfig::default(),
    };
    if let Some(max_attempts) = args.max_attempts {
        config.engine.retry.max_attempts = max_attempts;
    }
    if let Some(audit_interval) = args.audit_interval {
        config.engine.audit_interval_secs = audit_interval;
    }

    info!(
        max_attempts = config.engine.retry.max_attempts,
        audit_interval_secs = config.engine.audit_interval_secs,
        "starting flowsyncd"
    );

    // Standalone wiring: in-memory store and a loopback transport. A
    // deployment embeds Daemon with its own store and session layer.
    let store = Arc::new(MemoryRuleStore::new());
    let transport = Arc::new(LoopbackTransport);
    let daemon = Daemon::new(store, transport, config);
    let controller = daemon.controller();
    let engine = tokio::spawn(daemon.run());

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!(switches = controller.list_switches().len(), "shutting down");
    engine.abort();
    Ok(())
}
