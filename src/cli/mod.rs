//! CLI command implementations
//!
//! Business logic for the `cotejar` binary, extracted from main.rs for
//! testability. Every command resolves into an exit code: 0 when every
//! requested case passed (or was skipped as passed), 1 otherwise.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::cases;
use crate::driver::{run_case, run_suite, ToolVersion, Toolchain};
use crate::error::Result;

/// Conversion conformance harness
///
/// Validates that the external graph-conversion tool preserves per-operator
/// numerics across backend targets.
#[derive(Parser)]
#[command(name = "cotejar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Toolchain description shared by the run commands
#[derive(Args, Debug)]
pub struct ToolchainArgs {
    /// Path to the external conversion tool
    #[arg(long, value_name = "PATH")]
    pub converter: PathBuf,

    /// Directory artifacts are written into
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Conversion timeout in seconds
    #[arg(long, default_value = "120")]
    pub timeout_secs: u64,

    /// Installed toolchain version, used for version-gated cases
    #[arg(long, value_name = "VERSION", default_value = "2.0")]
    pub tool_version: String,
}

/// CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List shipped case names
    List,
    /// Run one case through the full pipeline
    Run {
        /// Case name (see `list`)
        #[arg(value_name = "CASE")]
        case: String,
        /// Toolchain description
        #[command(flatten)]
        toolchain: ToolchainArgs,
    },
    /// Run every shipped case
    Suite {
        /// Toolchain description
        #[command(flatten)]
        toolchain: ToolchainArgs,
    },
}

fn build_toolchain(args: &ToolchainArgs) -> Result<Toolchain> {
    let version: ToolVersion = args.tool_version.parse()?;
    Ok(
        Toolchain::new(&args.converter, &args.work_dir, version)
            .with_timeout(Duration::from_secs(args.timeout_secs)),
    )
}

/// Dispatch a parsed CLI invocation, returning the process exit code
#[must_use]
pub fn entrypoint(cli: Cli) -> i32 {
    match cli.command {
        Commands::List => handle_list(),
        Commands::Run { case, toolchain } => handle_run(&case, &toolchain),
        Commands::Suite { toolchain } => handle_suite(&toolchain),
    }
}

/// Print shipped case names
pub fn handle_list() -> i32 {
    for case in cases::all() {
        println!("{}", case.name());
    }
    0
}

/// Run a single named case
pub fn handle_run(name: &str, args: &ToolchainArgs) -> i32 {
    let Some(case) = cases::find(name) else {
        eprintln!("Unknown case '{name}'; run `cotejar list` for available cases");
        return 1;
    };
    let toolchain = match build_toolchain(args) {
        Ok(toolchain) => toolchain,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        },
    };

    let report = run_case(&case, &toolchain);
    if report.exit_code() == 0 {
        println!("{}: {}", report.name, report.describe());
    } else {
        eprintln!("{}: {}", report.name, report.describe());
    }
    report.exit_code()
}

/// Run every shipped case and print a summary
pub fn handle_suite(args: &ToolchainArgs) -> i32 {
    let toolchain = match build_toolchain(args) {
        Ok(toolchain) => toolchain,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        },
    };

    let all = cases::all();
    let suite = run_suite(&all, &toolchain);
    for report in &suite.reports {
        println!("{}: {}", report.name, report.describe());
    }
    println!(
        "{} passed, {} failed, {} skipped-as-pass",
        suite.passed(),
        suite.failed(),
        suite.skipped_as_pass()
    );
    suite.exit_code()
}
