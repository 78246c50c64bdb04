//! CLI argument definitions using clap
//!
//! Commands:
//! - docshift run --config <path> [--dry-run | --execute]
//! - docshift transforms

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docshift - bulk mutation of documents in a partitioned store
#[derive(Parser, Debug)]
#[command(name = "docshift")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one batch described by a config file
    Run {
        /// Path to configuration file
        #[arg(long, default_value = "./docshift.json")]
        config: PathBuf,

        /// Force a dry run regardless of the config file
        #[arg(long, conflicts_with = "execute")]
        dry_run: bool,

        /// Apply mutations regardless of the config file
        #[arg(long)]
        execute: bool,
    },

    /// List the transforms this build knows about
    Transforms,
}

impl Command {
    /// Dry-run override requested on the command line, if any
    pub fn dry_run_override(&self) -> Option<bool> {
        match self {
            Command::Run { dry_run: true, .. } => Some(true),
            Command::Run { execute: true, .. } => Some(false),
            _ => None,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
