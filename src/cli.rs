//! CLI argument parsing for the routeopt binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "routeopt", version, about = "Last-mile route optimization service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,
    /// Optimize one request read from a JSON file and print the result
    Optimize {
        /// Path to an optimization request (`-` reads stdin)
        #[arg(long, short)]
        input: PathBuf,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}
