//! sockcast daemon - broadcast log lines to socket clients
//!
//! Reads log records from stdin (plain text or JSON, one per line) and fans
//! each one out to every client connected to the socket
//! (/tmp/sockcast.sock by default). Runs until stdin closes or Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use sockcast_broadcaster::SocketServer;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sockcast_daemon::cli::Args;
use sockcast_daemon::config::DaemonConfig;
use sockcast_daemon::input::forward;
use sockcast_daemon::level::Level;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging (stdout stays free for piping)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    info!("📡 Starting sockcast daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &args.config {
        Some(path) => DaemonConfig::load_from(path),
        None => DaemonConfig::load(),
    }
    .context("Failed to load configuration")?;
    args.apply(&mut config);

    info!("📋 Configuration loaded from {}", config.config_path.display());

    let threshold: Level = config
        .level
        .parse()
        .context("Invalid level in configuration")?;

    let server = SocketServer::new(config.server_options()?);
    server
        .start()
        .await
        .context("Failed to start socket server")?;

    info!("🚀 Forwarding stdin records at level {} and below", threshold);

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = forward(&server, stdin, threshold) => {
            match result {
                Ok(stats) => info!(
                    "Input closed: {} forwarded, {} filtered, {} partially delivered",
                    stats.forwarded, stats.filtered, stats.partial
                ),
                Err(e) => error!("Input error: {:#}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Received shutdown signal");
        }
    }

    info!("🧹 Shutting down...");
    server.stop().await.context("Failed to stop socket server")?;
    info!("👋 sockcast daemon stopped");

    Ok(())
}
