//! docshift CLI entry point
//!
//! Parses arguments, dispatches the command and exits non-zero only on
//! fatal errors. Per-document failures never change the exit code.

use docshift::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
