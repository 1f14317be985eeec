//! rollcall-collator - attendance collator service
//!
//! Tracks presence of rostered entities from live detection streams and
//! serves the ledger over HTTP (default port 1500).

use anyhow::Result;
use clap::Parser;
use rollcall_collator::{build_router, ledger::SnapshotLoad, AppState, Collator};
use rollcall_common::config::{ConfigOverrides, ConfigResolver};
use rollcall_common::events::EventBus;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Attendance collator: presence ledger fed by detection streams
#[derive(Debug, Parser)]
#[command(name = "rollcall-collator", version)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long)]
    bind: Option<String>,

    /// HTTP server port
    #[arg(long)]
    port: Option<u16>,

    /// Snapshot file used to survive restarts
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_address: self.bind.clone(),
            port: self.port,
            snapshot_path: self.snapshot.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) = ConfigResolver::new()
        .with_path(args.config.clone())
        .resolve_with_source()?;
    let config = config.apply_overrides(args.overrides());

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting rollcall-collator v{}",
        env!("CARGO_PKG_VERSION")
    );
    source.log();
    info!("Snapshot file: {}", config.snapshot_path.display());

    let events = EventBus::new(256);
    let collator = Collator::new(&config, events)?;

    match collator.load_snapshot().await {
        Ok(SnapshotLoad::Loaded(count)) => info!("Restored {} records", count),
        Ok(SnapshotLoad::Missing) => {}
        Err(e) => warn!("Starting with an empty ledger: {}", e),
    }

    let app = build_router(AppState::new(collator.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen_address()).await?;
    info!("rollcall-collator listening on http://{}", config.listen_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    collator.shutdown().await;
    if let Err(e) = collator.save_snapshot().await {
        warn!("Failed to save snapshot on shutdown: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
