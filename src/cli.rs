use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate every SRT file in a directory, resuming where a previous run stopped
    Run {
        /// Directory containing SRT files
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Translate a single SRT file in place
    Translate {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Merge cues into sentence units without translating
    Reformat {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that the oracle is reachable and serves the configured models
    Check,

    /// Write the default configuration to a file
    InitConfig {
        /// Output configuration file
        #[arg(short, long)]
        output: PathBuf,
    },
}
