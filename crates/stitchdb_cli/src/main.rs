//! StitchDB CLI
//!
//! Offline tools for StitchDB database directories.
//!
//! # Commands
//!
//! - `inspect` - Summarize every bucket log
//! - `verify` - Check every log record's framing and checksum
//! - `dump-log` - Print the records of one bucket log

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// StitchDB command-line database tools.
#[derive(Parser)]
#[command(name = "stitchdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the bucket logs of a database
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify the integrity of every bucket log
    Verify,

    /// Dump the records of one bucket log
    DumpLog {
        /// Bucket whose log to dump
        #[arg(short, long)]
        bucket: String,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Database path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::DumpLog {
            bucket,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Database path required for dump-log")?;
            commands::dump_log::run(&path, &bucket, limit, &format)?;
        }
        Commands::Version => {
            println!("StitchDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("StitchDB Core v{}", stitchdb_core::VERSION);
        }
    }

    Ok(())
}
