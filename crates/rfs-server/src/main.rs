//! rfs-server: Holds the authoritative copy of one file and serves it to
//! sync clients over TCP.

use anyhow::{Context, Result};
use clap::Parser;
use rfs_core::AtomicFs;
use rfs_server::{Document, ServerConfig, SyncServer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rfs-server")]
#[command(about = "Single-file sync server")]
struct Args {
    /// Port to listen on
    port: u16,

    /// Path of the file to serve
    file: PathBuf,

    /// Interface address to bind ("0.0.0.0" for IPv4 only)
    #[arg(long, default_value = "::")]
    bind: String,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,rfs_server=debug"
    } else {
        "info,rfs_server=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::new(args.port, args.file).with_bind(args.bind);

    info!("Starting rfs-server");
    info!("Document path: {:?}", config.file_path);

    let document = Document::load(config.file_path.clone(), Arc::new(AtomicFs::new()))
        .await
        .with_context(|| format!("failed to load {}", config.file_path.display()))?;

    let listener = SyncServer::bind(&config.listen_addr())
        .await
        .with_context(|| format!("failed to listen on {}", config.listen_addr()))?;

    let server = SyncServer::new(Arc::new(document));

    info!("Server running. Press Ctrl+C to stop.");

    server
        .run(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await;

    info!("Shutting down");
    Ok(())
}
