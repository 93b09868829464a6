//! Command line argument parsing for the nearby CLI using clap.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// nearby - location-aware posts with geo and score search
#[derive(Parser, Debug, Clone)]
#[command(name = "nearby")]
#[command(about = "Location-aware posts with radius and score search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct NearbyArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// JSON configuration file
    #[arg(short, long, env = "NEARBY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override the document store with an Elasticsearch-compatible cluster
    #[arg(long, env = "NEARBY_ES_URL", global = true)]
    pub es_url: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl NearbyArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n + 1,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP service
    Serve(ServeArgs),

    /// Create the document store collections
    Provision,

    /// Ingest one post
    Post(PostArgs),

    /// Find posts within a radius
    Search(SearchArgs),

    /// Find posts whose score clears a threshold
    Cluster(ClusterArgs),
}

/// Arguments for running the service
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(short, long, env = "NEARBY_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// HS256 key for signing tokens
    #[arg(long, env = "NEARBY_SIGNING_KEY", hide_env_values = true)]
    pub signing_key: Option<String>,
}

/// Arguments for ingesting a post
#[derive(Parser, Debug, Clone)]
pub struct PostArgs {
    /// Author recorded on the post
    #[arg(short, long)]
    pub author: String,

    /// Message text
    #[arg(short, long, default_value = "")]
    pub message: String,

    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: String,

    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: String,

    /// Media file to attach
    #[arg(long)]
    pub media: Option<PathBuf>,
}

/// Arguments for a radius search
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Latitude of the center
    #[arg(long, allow_hyphen_values = true)]
    pub lat: String,

    /// Longitude of the center
    #[arg(long, allow_hyphen_values = true)]
    pub lon: String,

    /// Radius, e.g. `50`, `50km` or `500m` (kilometers when bare)
    #[arg(short, long, allow_hyphen_values = true)]
    pub range: Option<String>,
}

/// Arguments for a threshold search
#[derive(Parser, Debug, Clone)]
pub struct ClusterArgs {
    /// Numeric field to filter on
    #[arg(short, long, default_value = "face")]
    pub term: String,

    /// Lower bound (inclusive)
    #[arg(long, allow_hyphen_values = true)]
    pub min: Option<f64>,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
}
