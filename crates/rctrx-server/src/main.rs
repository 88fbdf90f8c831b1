//! # rctrxd
//!
//! Remote-control pulse transceiver daemon. Exposes the capture/replay
//! engine over a line-oriented TCP socket speaking the hex duration
//! protocol.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! rctrxd
//!
//! # Run with environment variables
//! RCTRX_PORT=5000 RCTRX_HOST=0.0.0.0 rctrxd
//! ```
//!
//! Configuration is read from `rctrx.toml` in the working directory,
//! `/etc/rctrx/rctrx.toml`, or `~/.config/rctrx/rctrx.toml`.

mod backend;
mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rctrx_server=debug,rctrx_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!(
        "Starting transceiver daemon on {}:{}",
        config.host,
        config.port
    );

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
