//! rfs-client: Keeps one local file in sync with an rfs-server.
//!
//! Local edits are pushed as they happen; remote changes are pulled after each
//! push. Concurrent edits come back as a conflict block in the file.

use anyhow::{Context, Result};
use clap::Parser;
use rfs_client::{signal, ClientConfig, FileWatcher, Reconciler, TcpTransport};
use rfs_core::AtomicFs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rfs-client")]
#[command(about = "Single-file sync client")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    server: String,

    /// Local file to keep in sync
    #[arg(short, long, default_value = "~/rfs/main.py")]
    file: PathBuf,

    /// How often the idle loop checks for shutdown (ms)
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Pause after each push/pull cycle (ms)
    #[arg(long, default_value_t = 100)]
    churn_delay_ms: u64,

    /// Debounce window for file events (ms)
    #[arg(long, default_value_t = 200)]
    debounce_ms: u64,

    /// TCP connect timeout (ms)
    #[arg(long, default_value_t = 2000)]
    connect_timeout_ms: u64,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> ClientConfig {
        ClientConfig::default()
            .with_server(self.server)
            .with_file(&self.file)
            .with_poll_interval(Duration::from_millis(self.poll_ms))
            .with_churn_delay(Duration::from_millis(self.churn_delay_ms))
            .with_debounce(Duration::from_millis(self.debounce_ms))
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,rfs_client=debug"
    } else {
        "info,rfs_client=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.into_config();
    let file_path = std::path::absolute(&config.file_path)
        .with_context(|| format!("invalid file path {}", config.file_path.display()))?;

    info!("Starting rfs-client");
    info!("Syncing {} with {}", file_path.display(), config.server);

    // The watcher needs the directory to exist, and the first push needs a file
    if let Some(parent) = file_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if tokio::fs::metadata(&file_path).await.is_err() {
        tokio::fs::write(&file_path, b"")
            .await
            .with_context(|| format!("failed to create {}", file_path.display()))?;
    }

    let (sender, receiver) = signal::channel();

    let watcher = FileWatcher::new(file_path.clone(), config.debounce, sender.clone())
        .context("failed to start file watcher")?;
    info!("Watching {}", watcher.file_path().display());

    let transport = TcpTransport::new(config.server.clone(), config.connect_timeout);
    let reconciler = Reconciler::new(file_path, Arc::new(AtomicFs::new()), Arc::new(transport))
        .with_poll_interval(config.poll_interval)
        .with_churn_delay(config.churn_delay);

    let sync_task = tokio::spawn(async move { reconciler.run(receiver).await });

    info!("Client running. Press Ctrl+C to stop.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");

    sender.shutdown();
    sync_task.await.context("reconciliation task failed")?;

    drop(watcher);
    info!("Shutting down");
    Ok(())
}
