//! uptime-gate
//!
//! Edge gate in front of the uptime dashboard, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────────┐
//!                  │                       UPTIME GATE                        │
//!                  │                                                          │
//!  Client Request  │  ┌──────────┐   ┌──────────┐   ┌───────────┐             │
//!  ────────────────┼─▶│request id│──▶│  trace   │──▶│  timeout  │             │
//!                  │  └──────────┘   └──────────┘   └─────┬─────┘             │
//!                  │                                      ▼                   │
//!                  │                              ┌──────────────┐  excluded  │
//!                  │                              │  edge gate   │──────────┐ │
//!                  │                              └──────┬───────┘          │ │
//!                  │                  forged header ◀────┤                  │ │
//!                  │                       403           ▼                  │ │
//!                  │                              ┌──────────────┐          │ │
//!                  │                  redirect ◀──│   session    │          │ │
//!                  │                       307    │  refresher   │          │ │
//!                  │                              └──────┬───────┘          │ │
//!                  │                                     ▼                  │ │
//!  Client Response │                              ┌──────────────┐◀─────────┘ │
//!  ◀───────────────┼──────────────────────────────│   forward    │────────────┼──▶ Dashboard
//!                  │                              └──────────────┘            │
//!                  └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use uptime_gate::config::{load_config, watcher::ConfigWatcher, GateConfig};
use uptime_gate::lifecycle::{signals, Shutdown};
use uptime_gate::observability::{logging, metrics};
use uptime_gate::HttpServer;

#[derive(Parser)]
#[command(name = "uptime-gate")]
#[command(about = "Edge gate and session refresher for the uptime dashboard", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "UPTIME_GATE_CONFIG")]
    config: Option<PathBuf>,

    /// Reload path exclusions when the configuration file changes.
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("uptime-gate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        session_enabled = config.session.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(&shutdown);

    let config_updates = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            watcher.spawn(shutdown.subscribe())?;
            updates
        }
        _ => mpsc::unbounded_channel().1,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
