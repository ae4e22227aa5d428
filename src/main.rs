//! Dev Gathering API server.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                 DEV GATHERING API                │
//!   Client Request        │  ┌──────────┐   ┌──────────┐   ┌─────────────┐   │
//!   ──────────────────────┼─▶│ security │──▶│  rate    │──▶│  handlers   │   │
//!                         │  │ headers  │   │ limiter  │   │ public/admin│   │
//!                         │  └──────────┘   └──────────┘   └──────┬──────┘   │
//!                         │                                       │          │
//!                         │        ┌────────────┬─────────────────┼───────┐  │
//!                         │        ▼            ▼                 ▼       ▼  │
//!                         │  ┌──────────┐ ┌──────────┐  ┌────────┐ ┌──────┐  │
//!                         │  │validation│ │auth/     │  │ store  │ │ mail │  │
//!                         │  │          │ │tokens    │  │        │ │      │  │
//!                         │  └──────────┘ └──────────┘  └────────┘ └──────┘  │
//!                         │                                                  │
//!                         │  audit · config · observability · lifecycle      │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use dev_gathering::config::validation::missing_secrets;
use dev_gathering::config::watcher::ConfigWatcher;
use dev_gathering::config::load_config_or_default;
use dev_gathering::lifecycle::{wait_for_signal, Shutdown};
use dev_gathering::observability::{logging, metrics};
use dev_gathering::HttpServer;

#[derive(Parser)]
#[command(name = "dev-gathering")]
#[command(about = "Dev Gathering community API", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. A missing file means defaults.
    #[arg(short, long, default_value = "gathering.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config_or_default(&args.config)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dev-gathering starting");

    for secret in missing_secrets(&config) {
        tracing::warn!(secret, "Secret is not configured; the feature that needs it is disabled");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.environment,
        request_timeout_secs = config.timeouts.request_secs,
        rate_limit = config.rate_limit.enabled,
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

    // Hot reload only when there is a file to watch.
    let (_watcher, config_updates) = if args.config.exists() {
        let (watcher, updates) = ConfigWatcher::new(&args.config);
        (Some(watcher.run()?), updates)
    } else {
        let (_tx, updates) = mpsc::unbounded_channel();
        (None, updates)
    };

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
