// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! fieldlink-hub daemon entry point.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default runtime directory (/run/fieldlink)
//! fieldlink-hub
//!
//! # Custom runtime directory and persistent wiring table
//! fieldlink-hub --runtime-dir /tmp/fieldlink --state-file /var/lib/fieldlink/wiring.json
//!
//! # Load full configuration from a file
//! fieldlink-hub --config hub.json
//! ```

use clap::Parser;
use fieldlink_hub::{HubConfig, HubServer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// fieldlink-hub - directory and observability daemon for fieldlink
#[derive(Parser, Debug)]
#[command(name = "fieldlink-hub")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Runtime directory holding the control socket and data sockets
    #[arg(short, long)]
    runtime_dir: Option<PathBuf>,

    /// Explicit control socket path, overriding the runtime-dir layout
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Persist the wiring table to this file across restarts
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default log directives when RUST_LOG is unset (e.g. "debug",
    /// "fieldlink_hub=trace")
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// RUST_LOG wins; the flag is the fallback.
fn log_filter(env_directives: Option<&str>, fallback: &str) -> EnvFilter {
    match env_directives {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::new(fallback),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let env_directives = std::env::var("RUST_LOG").ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(env_directives.as_deref(), &args.log_level))
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = if let Some(config_path) = &args.config {
        info!("Loading config from {:?}", config_path);
        HubConfig::from_file(config_path)?
    } else {
        HubConfig::default()
    };

    // Flags override the file.
    if let Some(runtime_dir) = args.runtime_dir {
        config.runtime_dir = runtime_dir;
    }
    if let Some(socket) = args.socket {
        config.socket_path = Some(socket);
    }
    if let Some(state_file) = args.state_file {
        config.state_file = Some(state_file);
    }

    info!("+----------------------------------------------------+");
    info!(
        "|       fieldlink-hub v{}                         |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+----------------------------------------------------+");
    info!("|  Socket: {:40} |", config.socket_path().display());
    info!(
        "|  State:  {:40} |",
        config
            .state_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none (wiring lost on restart)".to_string())
    );
    info!("+----------------------------------------------------+");

    let server = HubServer::new(config)?;

    let server_handle = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, stopping hub...");
        server_handle.shutdown();
    });

    server.run().await?;

    info!("Hub stopped");
    Ok(())
}
