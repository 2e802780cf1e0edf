//! Cotejar CLI - conversion conformance harness
//!
//! # Commands
//!
//! - `list` - List shipped case names
//! - `run` - Run one case through export, conversion, backend execution,
//!   and comparison
//! - `suite` - Run every shipped case and aggregate results
//!
//! The process exit code is the verdict: 0 when every requested case passed
//! (or was version-gated and skipped as passed), 1 on any failure.

use clap::Parser;

use cotejar::cli::{entrypoint, Cli};

fn main() {
    let cli = Cli::parse();
    let code = entrypoint(cli);
    if code != 0 {
        std::process::exit(code);
    }
}
