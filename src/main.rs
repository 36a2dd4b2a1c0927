//! xtrieve-gateway - serial link to engine relay
//!
//! Accepts emulated null-modem links and relays framed record manager calls
//! to an xtrieve engine over TCP.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use xtrieve_gateway::{Config, Gateway};

#[derive(Parser)]
#[command(name = "xtrieve-gateway")]
#[command(about = "Relay serial-link record manager calls to an xtrieve engine")]
#[command(version)]
struct Args {
    /// YAML config file
    #[arg(short, long, env = "XTRIEVE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Config file (if given), then env overrides; a bad config is fatal
    let config = match Config::load_from(args.config.as_deref()) {
        Ok(c) => {
            match args.config {
                Some(ref path) => tracing::info!("Loaded config from {}", path.display()),
                None => tracing::info!("Using default configuration"),
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting xtrieve gateway");
    tracing::info!("  Link address: {}", config.link.bind_addr);
    tracing::info!("  Link rate: {} baud (nominal)", config.link.baud_rate);
    tracing::info!("  Byte timeout: {} ms", config.link.byte_timeout_ms);
    match config.link.sync_timeout() {
        Some(timeout) => tracing::info!("  Sync timeout: {} ms", timeout.as_millis()),
        None => tracing::info!("  Sync timeout: none"),
    }
    tracing::info!("  Engine address: {}", config.engine.addr);
    if config.reconnect.max_attempts == 0 {
        tracing::info!("  Reconnect: unlimited attempts");
    } else {
        tracing::info!(
            "  Reconnect: {} attempt(s), backoff {}..{} ms",
            config.reconnect.max_attempts,
            config.reconnect.initial_backoff_ms,
            config.reconnect.max_backoff_ms
        );
    }

    let gateway = Arc::new(Gateway::new(config));

    // Spawn shutdown signal handler
    let shutdown_gateway = gateway.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping gateway...");
        shutdown_gateway.shutdown();
    });

    // Run gateway (blocks until shutdown)
    gateway.run().await?;

    let stats = gateway.stats().snapshot();
    tracing::info!(
        links = stats.links_total,
        relayed = stats.requests_relayed,
        stream_aborts = stats.stream_aborts,
        engine_aborts = stats.engine_aborts,
        reconnects = stats.reconnects,
        "Gateway stopped"
    );
    Ok(())
}
