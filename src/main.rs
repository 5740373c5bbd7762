//! Analysis gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                  GATEWAY                     │
//!   GET /analyze?target  │  ┌────────┐   ┌──────────┐   ┌───────────┐   │
//!   ─────────────────────┼─▶│ method │──▶│ identity │──▶│ admission │   │
//!                        │  │ guard  │   │ resolver │   │ (429)     │   │
//!                        │  └────────┘   └──────────┘   └─────┬─────┘   │
//!                        │                                    ▼         │
//!   status + JSON body   │  ┌────────┐   ┌──────────────────────────┐   │
//!   ◀────────────────────┼──│ relay  │◀──│ upstream client (503)    │◀──┼── Backend
//!                        │  └────────┘   └──────────────────────────┘   │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use analysis_gateway::config::load_or_default;
use analysis_gateway::observability::{logging, metrics};
use analysis_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "analysis-gateway")]
#[command(about = "Rate-limited gateway for the analysis backend", long_about = None)]
struct Args {
    /// Optional TOML configuration file; built-in defaults otherwise.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!("analysis-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        timeout_ms = config.upstream.timeout_ms,
        cooldown_ms = config.rate_limit.cooldown_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(
                address = %config.listener.bind_address,
                error = %e,
                "Failed to bind listener"
            );
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
