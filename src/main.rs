//! nearby service binary.

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nearby::cli::args::*;
use nearby::cli::commands::*;

#[tokio::main]
async fn main() {
    let args = NearbyArgs::parse();

    let default_level = match args.verbosity() {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = execute_command(args).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
