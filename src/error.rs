//! Error types for the conformance harness
//!
//! The taxonomy separates infrastructure failures (export, conversion,
//! backend execution) from judgment failures. A numeric or shape mismatch is
//! not an error: it is a [`crate::compare::VerdictReport`] with
//! `passed() == false`, mapped to the failing exit code by the driver.

use thiserror::Error;

/// Harness error type
#[derive(Debug, Error)]
pub enum CotejarError {
    /// Tensor or operator shape validation failed
    #[error("Invalid shape: {reason}")]
    InvalidShape {
        /// What was wrong with the shape
        reason: String,
    },

    /// Model cannot be represented in the interchange format
    #[error("Export unsupported: {reason}")]
    UnsupportedExport {
        /// Why the model is not exportable
        reason: String,
    },

    /// Interchange artifact is malformed or corrupted
    #[error("Format error: {reason}")]
    FormatError {
        /// What failed while decoding
        reason: String,
    },

    /// External conversion tool failed (non-zero exit, timeout, or missing
    /// output files). Fatal to the test case, never retried.
    #[error("Conversion failed for case '{case}': {reason}")]
    ConversionFailed {
        /// Test case name
        case: String,
        /// Tool exit status, timeout, or missing-artifact detail, with
        /// captured tool output where available
        reason: String,
    },

    /// Backend adapter could not be loaded or executed
    #[error("Backend '{backend}' failed for case '{case}': {reason}")]
    BackendFailed {
        /// Test case name
        case: String,
        /// Backend kind the adapter belongs to
        backend: String,
        /// Load, spawn, exit-status, or output-decode detail
        reason: String,
    },

    /// File system operation failed
    #[error("I/O error: {message}")]
    IoError {
        /// Operation and underlying error
        message: String,
    },
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, CotejarError>;
