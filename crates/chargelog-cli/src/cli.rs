//! Command-line argument definitions.

use std::path::PathBuf;

use chargelog_core::DataSource;
use clap::{Parser, Subcommand};

/// Charger log analytics.
///
/// Reconstructs charging sessions from OCPP event logs and reports
/// per-connector energy, duration, power, and failure statistics.
#[derive(Debug, Parser)]
#[command(name = "chargelog", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze a log file and print the result without storing it.
    Process {
        /// Log file (.csv, .json, .jsonl, or .ndjson).
        file: PathBuf,

        /// Export origin: `cms` (oldest first) or `s3` (newest first).
        #[arg(long)]
        source: Option<DataSource>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Analyze a log file and store the result.
    Upload {
        /// Log file (.csv, .json, .jsonl, or .ndjson).
        file: PathBuf,

        /// Owner recorded with the upload.
        #[arg(long)]
        owner: String,

        /// Export origin: `cms` (oldest first) or `s3` (newest first).
        #[arg(long)]
        source: Option<DataSource>,
    },

    /// List stored uploads, newest first.
    Uploads {
        /// Only show uploads by this owner.
        #[arg(long)]
        owner: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print a stored upload's result.
    Show {
        id: i64,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored upload.
    Delete { id: i64 },
}
