//! # Cotejar
//!
//! Cotejar (Spanish: "to collate, to cross-check") validates that converting
//! a model from its in-process graph representation into deployment-format
//! representations preserves the numerical behavior of each operator.
//!
//! For every test case the harness builds a small reference model, captures
//! its ground-truth output by direct execution, exports the model to an
//! interchange artifact, invokes the external graph-conversion tool as a
//! subprocess, executes each converted artifact through a backend adapter,
//! and judges the backend output against the reference under the case's
//! tolerance policy.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use cotejar::cases;
//! use cotejar::driver::{run_case, ToolVersion, Toolchain};
//!
//! let toolchain = Toolchain::new(
//!     Path::new("/opt/converter/bin/convert"),
//!     Path::new("work"),
//!     ToolVersion::new(2, 0, 0),
//! );
//! let report = run_case(&cases::matmul(), &toolchain);
//! std::process::exit(report.exit_code());
//! ```
//!
//! ## Pipeline
//!
//! Per case, strictly linear: reference execution → export → conversion →
//! backend run(s) → comparison. Cases are mutually independent and a suite
//! fans them out across a worker pool.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)] // Resolved resize sizes fit in usize
#![allow(clippy::cast_precision_loss)] // usize -> f64 for index mapping is exact in range
#![allow(clippy::cast_sign_loss)] // Clamped index arithmetic only
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

/// Backend kinds, adapter registry, and backend execution
pub mod backend;
/// Shipped conformance cases
pub mod cases;
/// CLI command implementations (extracted for testability)
pub mod cli;
/// Comparator: tolerance policies and verdict reports
pub mod compare;
/// Converter Invoker: drives the external conversion tool
pub mod convert;
/// Test driver and suite runner
pub mod driver;
pub mod error;
/// Interchange artifact export (CJX format)
pub mod export;
/// Reference models: graph specification and operator kernels
pub mod model;
pub mod tensor;

// Re-exports for convenience
pub use compare::{TolerancePolicy, VerdictReport};
pub use error::{CotejarError, Result};
pub use tensor::Tensor;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with("0."));
        assert!(VERSION.contains('.'));
    }
}
