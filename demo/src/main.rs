//! `mcplink-demo`: list and call tools on the servers of a config file.
//!
//! Logs go to stderr (`RUST_LOG` overrides the `info` default) so stdout
//! only carries results.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = commands::run(cli::Cli::parse()).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
