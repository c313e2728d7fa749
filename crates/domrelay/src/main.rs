// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! domrelay - bridges a browser-based messaging UI to a backend event channel.
//!
//! This is the binary entry point.

mod check;
mod hash;
mod serve;

use std::path::{Path, PathBuf};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};
use domrelay_config::DomRelayConfig;

/// domrelay - relays new messages from a logged-in messaging page to a backend.
#[derive(Parser, Debug)]
#[command(name = "domrelay", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Attach to the browser and relay messages until interrupted.
    Serve,
    /// Validate configuration and, with --live, probe the browser and backend.
    Check {
        /// Also connect to the browser and the backend.
        #[arg(long)]
        live: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Print the pseudonym a sender name maps to under the configured pepper.
    Hash {
        /// Sender display name.
        name: String,
    },
}

/// Loads and validates configuration, rendering diagnostics on failure.
fn load_config(path: Option<&Path>) -> Option<DomRelayConfig> {
    let loaded = match path {
        Some(path) => domrelay_config::load_and_validate_path(path),
        None => domrelay_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => Some(config),
        Err(errors) => {
            domrelay_config::render_errors(&errors);
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Some(Commands::Serve) => {
            let Some(config) = load_config(config_path) else {
                std::process::exit(1);
            };
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Check { live, plain }) => {
            if !check::run_check(config_path, live, plain).await {
                std::process::exit(1);
            }
        }
        Some(Commands::Hash { name }) => {
            let Some(config) = load_config(config_path) else {
                std::process::exit(1);
            };
            match hash::run_hash(&config, &name) {
                Ok(hashed) => println!("{hashed}"),
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("domrelay: use --help for available commands");
        }
    }
}
