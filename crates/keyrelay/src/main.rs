// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyrelay - credential vault and usage-accounting relay for LLM provider
//! keys.
//!
//! Binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod serve;

/// Keyrelay - credential vault and usage relay for LLM provider keys.
#[derive(Parser, Debug)]
#[command(name = "keyrelay", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Keyrelay HTTP server.
    Serve,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match keyrelay_config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("keyrelay: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("keyrelay serve failed: {e}");
                std::process::exit(1);
            }
        }
        None => {
            println!("keyrelay: use --help for available commands");
        }
    }
}
