//! Taskboard store server -- in-memory document store over WebSocket.
//!
//! Serves ordered document collections with server-assigned timestamps and
//! pushes a full snapshot to every subscriber after each committed write.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9300
//! cargo run --bin taskboard-store
//!
//! # Run on custom address
//! cargo run --bin taskboard-store -- --bind 127.0.0.1:8080
//! ```

use std::sync::Arc;

use clap::Parser;
use taskboard_store::config::{StoreCliArgs, StoreConfig};
use taskboard_store::server::{self, StoreState};

#[tokio::main]
async fn main() {
    let cli = StoreCliArgs::parse();

    let config = match StoreConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting taskboard store");

    let state = Arc::new(StoreState::with_config(config.max_payload_size));

    match server::start_server_with_state(&config.bind_addr.to_string(), state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "store listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "store server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start store server");
            std::process::exit(1);
        }
    }
}
