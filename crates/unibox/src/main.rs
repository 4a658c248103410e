// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unibox - a unified direct-message inbox.
//!
//! Binary entry point: loads and validates configuration, then dispatches
//! to the selected subcommand.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use clap::{Parser, Subcommand};

/// Unibox - a unified direct-message inbox.
#[derive(Parser, Debug)]
#[command(name = "unibox", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the inbox hub, ingestion gateway, and retry scheduler.
    Serve,
    /// Print the effective configuration after layering and validation.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match unibox_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            unibox_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("error: failed to render configuration: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("unibox: use --help for available commands");
        }
    }
}
