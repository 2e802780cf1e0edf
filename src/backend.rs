//! Backend kinds, adapter registry, and backend execution
//!
//! A backend is a downstream execution path for a converted artifact. The
//! set of kinds is closed per build. Adapters are resolved through an
//! explicit registry keyed by `(case name, backend kind)`, populated by the
//! conversion step; nothing is looked up by ambient name at run time.
//!
//! The default adapter is [`ProcessAdapter`]: it executes the generated
//! `<case>_<backend>` program and decodes its stdout as a JSON array of
//! tensors. The generated program regenerates the case's example inputs
//! itself from the exported signature, which is why the input generation in
//! [`crate::tensor`] must be deterministic.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CotejarError, Result};
use crate::tensor::Tensor;

/// Backend execution target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// The conversion tool's own framework-level re-export of the graph.
    /// Numerically identical kernels, so exact-equality fixtures target it.
    Graph,
    /// The deployment inference engine
    Engine,
}

impl BackendKind {
    /// All backend kinds in this build
    pub const ALL: [BackendKind; 2] = [BackendKind::Graph, BackendKind::Engine];

    /// Stable lowercase name, used in artifact file names
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Engine => "engine",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CotejarError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "graph" => Ok(Self::Graph),
            "engine" => Ok(Self::Engine),
            other => Err(CotejarError::FormatError {
                reason: format!("Unknown backend kind '{other}'"),
            }),
        }
    }
}

/// Argument-less adapter entry point returning the backend's output tensors
pub type AdapterFn = Box<dyn Fn() -> Result<Vec<Tensor<f32>>> + Send + Sync>;

/// Explicit adapter registry keyed by `(case name, backend kind)`
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<(String, BackendKind), AdapterFn>,
}

impl AdapterRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter callable for a case and backend
    pub fn register<F>(&mut self, case: &str, kind: BackendKind, adapter: F)
    where
        F: Fn() -> Result<Vec<Tensor<f32>>> + Send + Sync + 'static,
    {
        self.adapters
            .insert((case.to_string(), kind), Box::new(adapter));
    }

    /// Register a [`ProcessAdapter`] for a generated adapter program
    pub fn register_program(&mut self, case: &str, kind: BackendKind, program: &Path) {
        let adapter = ProcessAdapter::new(case, kind, program);
        self.register(case, kind, move || adapter.run());
    }

    /// Whether an adapter is registered
    #[must_use]
    pub fn contains(&self, case: &str, kind: BackendKind) -> bool {
        self.adapters.contains_key(&(case.to_string(), kind))
    }

    /// Execute the adapter for a case and backend
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::BackendFailed`] if no adapter is registered
    /// (a load failure) or if the adapter itself fails.
    pub fn run(&self, case: &str, kind: BackendKind) -> Result<Vec<Tensor<f32>>> {
        let adapter = self
            .adapters
            .get(&(case.to_string(), kind))
            .ok_or_else(|| CotejarError::BackendFailed {
                case: case.to_string(),
                backend: kind.to_string(),
                reason: "No adapter registered".to_string(),
            })?;
        adapter()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.adapters.keys().collect();
        keys.sort();
        f.debug_struct("AdapterRegistry").field("keys", &keys).finish()
    }
}

/// JSON payload for one output tensor on the adapter's stdout
#[derive(Debug, Deserialize)]
struct TensorPayload {
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// Adapter that executes a generated adapter program as a subprocess
///
/// The program takes no arguments, reconstructs the example inputs from the
/// exported signature, runs the converted artifact through the backend's
/// real execution path, and prints its outputs as a JSON array of
/// `{"shape": [...], "data": [...]}` objects.
#[derive(Debug, Clone)]
pub struct ProcessAdapter {
    case: String,
    kind: BackendKind,
    program: PathBuf,
}

impl ProcessAdapter {
    /// Create an adapter for a generated program
    #[must_use]
    pub fn new(case: &str, kind: BackendKind, program: &Path) -> Self {
        Self {
            case: case.to_string(),
            kind,
            program: program.to_path_buf(),
        }
    }

    fn fail(&self, reason: String) -> CotejarError {
        CotejarError::BackendFailed {
            case: self.case.clone(),
            backend: self.kind.to_string(),
            reason,
        }
    }

    /// Execute the adapter program and decode its outputs
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::BackendFailed`] on spawn failure, non-zero
    /// exit, or output-decode failure.
    pub fn run(&self) -> Result<Vec<Tensor<f32>>> {
        let output = Command::new(&self.program)
            .output()
            .map_err(|e| self.fail(format!("Failed to launch {}: {e}", self.program.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.fail(format!(
                "Adapter exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        decode_outputs(&output.stdout).map_err(|e| self.fail(e.to_string()))
    }
}

/// Decode a JSON array of tensor payloads into execution-result tensors
///
/// # Errors
///
/// Returns [`CotejarError::FormatError`] on malformed JSON and
/// [`CotejarError::InvalidShape`] if a payload's shape disagrees with its
/// data length.
pub fn decode_outputs(bytes: &[u8]) -> Result<Vec<Tensor<f32>>> {
    let payloads: Vec<TensorPayload> =
        serde_json::from_slice(bytes).map_err(|e| CotejarError::FormatError {
            reason: format!("Adapter output decode failed: {e}"),
        })?;
    payloads
        .into_iter()
        .map(|p| Tensor::from_vec(p.shape, p.data))
        .collect()
}
