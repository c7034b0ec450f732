//! Courier relay daemon
//!
//! Accepts WebSocket connections from users and delivery agents and
//! forwards every frame to the counterpart named in the connect query.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 0.0.0.0:8080, endpoint /ws
//! courierd
//!
//! # Explicit config file, overriding the port
//! courierd --config /etc/courier.toml --port 9000
//!
//! # Clients connect with
//! #   ws://host:8080/ws?user_id=u-1&delivery_id=d-7
//! #   ws://host:8080/ws?delivery_id=d-7&user_id=u-1&role=delivery
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use courierd::config::RelayConfig;
use courierd::logging;
use courierd::registry::spawn_registry;
use courierd::server::RelayServer;

/// Courier relay - forwards WebSocket frames between users and delivery agents
#[derive(Parser, Debug)]
#[command(name = "courierd", version, about)]
struct Args {
    /// TOML config file (also read from COURIER_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// WebSocket endpoint path
    #[arg(long)]
    path: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<RelayConfig> {
        let mut config =
            RelayConfig::load(self.config.as_deref()).context("Failed to load configuration")?;

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(path) = self.path {
            config.path = path;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let config = Args::parse().into_config()?;
    run_relay(config)
}

#[tokio::main]
async fn run_relay(config: RelayConfig) -> Result<()> {
    logging::init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Courier relay starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry();
    info!("Peer registry started");

    let server = RelayServer::new(config, registry, cancel_token);

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Courier relay stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
