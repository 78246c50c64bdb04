//! CLI module for docshift
//!
//! Provides command-line interface for:
//! - run: execute one batch from a JSON config file
//! - transforms: list registered transforms

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{run, run_batch, run_command, transforms, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_json_file, write_response};
