//! Edge gateway
//!
//! Terminates HTTP or HTTPS on one listener and routes each request by host
//! and path to a local directory or an upstream URL.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                 EDGE GATEWAY                  │
//!                        │                                               │
//!   Client Request       │  ┌──────────┐   ┌──────────┐   ┌───────────┐  │
//!   ─────────────────────┼─▶│   net    │──▶│  http    │──▶│  routing  │  │
//!                        │  │listener  │   │ server   │   │   table   │  │
//!                        │  │  + tls   │   └──────────┘   └─────┬─────┘  │
//!                        │  └──────────┘                        │        │
//!                        │                                      ▼        │
//!                        │                              ┌─────────────┐  │
//!                        │                              │  dispatch   │  │
//!                        │                              └──┬───────┬──┘  │
//!                        │                    static dir   │       │     │
//!                        │                  ◀──────────────┘       ▼     │
//!   Client Response      │  ┌──────────┐                    ┌───────────┐ │
//!   ◀────────────────────┼──│ rewrite  │◀───────────────────│ upstream  │◀┼── Backend
//!                        │  └──────────┘                    │  client   │ │
//!                        │                                  └───────────┘ │
//!                        │  config · lifecycle · observability · security │
//!                        └───────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use edge_gateway::config::load_config;
use edge_gateway::lifecycle::startup;
use edge_gateway::observability::{init_logging, init_metrics};

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "HTTP(S) edge gateway routing by host and path", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {}: {e}", cli.config.display());
            return Err(e.into());
        }
    };

    init_logging(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        address = %config.server.address,
        use_tls = config.server.use_tls,
        routes = config.routes.len(),
        "edge-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    if let Err(e) = startup::run(config).await {
        tracing::error!(error = %e, "Gateway exited with error");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
