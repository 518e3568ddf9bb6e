// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! fieldlinkctl - inspect and rewire fieldlink connections
//!
//! ```bash
//! # What is registered right now?
//! fieldlinkctl endpoints
//!
//! # Who feeds whom?
//! fieldlinkctl connections
//!
//! # Rewire the operator display to the backup sensor
//! fieldlinkctl connect display@double sensor_2@double
//!
//! # Watch a live value without touching the data plane
//! fieldlinkctl watch sensor_2@double
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use fieldlink::protocol::Role;
use fieldlink::{HubClient, RuntimeConfig};
use std::path::PathBuf;

/// Inspect and rewire fieldlink signal/slot connections
#[derive(Parser, Debug)]
#[command(name = "fieldlinkctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Runtime directory (defaults to FIELDLINK_RUNTIME_DIR or /run/fieldlink)
    #[arg(short, long)]
    runtime_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered endpoints
    Endpoints,

    /// List the current slot-to-signal wiring
    Connections,

    /// Wire a slot to a signal
    Connect {
        /// Slot full name (name@type)
        slot: String,
        /// Signal full name (name@type)
        signal: String,
    },

    /// Clear a slot's wiring
    Disconnect {
        /// Slot full name (name@type)
        slot: String,
    },

    /// Print the mirrored last value of an endpoint
    Get {
        /// Endpoint full name (name@type)
        full_name: String,
    },

    /// Stream mirrored value changes of an endpoint until interrupted
    Watch {
        /// Endpoint full name (name@type)
        full_name: String,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.no_color {
        colored::control::set_override(false);
    }

    let config = match &args.runtime_dir {
        Some(dir) => RuntimeConfig::with_runtime_dir(dir.clone()),
        None => RuntimeConfig::from_env(),
    };

    if let Err(e) = run(args.command, config).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(command: Command, config: RuntimeConfig) -> fieldlink::Result<()> {
    let client = HubClient::connect(config).await?;

    match command {
        Command::Endpoints => {
            let endpoints = client.list_endpoints().await?;
            if endpoints.is_empty() {
                println!("no endpoints registered");
                return Ok(());
            }
            println!(
                "{:<40} {:<8} {:<8} DESCRIPTION",
                "FULL NAME".bold(),
                "ROLE".bold(),
                "TYPE".bold()
            );
            for endpoint in endpoints {
                let role = match endpoint.role {
                    Role::Signal => "signal".green(),
                    Role::Slot => "slot".cyan(),
                };
                println!(
                    "{:<40} {:<8} {:<8} {}",
                    endpoint.full_name,
                    role,
                    endpoint.type_tag.type_name(),
                    endpoint.description
                );
            }
        }

        Command::Connections => {
            let connections = client.list_connections().await?;
            if connections.is_empty() {
                println!("no connections configured");
                return Ok(());
            }
            println!("{:<40} {}", "SLOT".bold(), "SIGNAL".bold());
            for conn in connections {
                println!("{:<40} {}", conn.slot.cyan(), conn.signal.green());
            }
        }

        Command::Connect { slot, signal } => {
            client.connect_endpoints(&slot, Some(&signal)).await?;
            println!("{} {} <- {}", "wired".green().bold(), slot, signal);
        }

        Command::Disconnect { slot } => {
            client.connect_endpoints(&slot, None).await?;
            println!("{} {}", "unwired".yellow().bold(), slot);
        }

        Command::Get { full_name } => {
            match client.get_value(&full_name).await? {
                Some(value) => println!("{}", String::from_utf8_lossy(&value.encode())),
                None => println!("no value mirrored for {}", full_name),
            }
        }

        Command::Watch { full_name } => {
            let mut changes = client.watch_value(&full_name).await?;
            eprintln!("watching {} (ctrl-c to stop)", full_name.bold());
            loop {
                tokio::select! {
                    change = changes.recv() => {
                        match change {
                            Some(value) => {
                                println!("{}", String::from_utf8_lossy(&value.encode()));
                            }
                            None => {
                                eprintln!("hub connection closed");
                                break;
                            }
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}
