//! Converter Invoker: drives the external graph-conversion tool
//!
//! The conversion tool is a black box behind a narrow process interface: it
//! receives the interchange artifact path, an `inputshape=` specification,
//! and one `backend=` argument per requested target, and writes converted
//! artifacts plus a generated adapter program at deterministic paths next to
//! the input artifact. This module builds the argument list explicitly (no
//! shell involved), enforces a timeout, maps a non-zero exit to a fatal
//! conversion failure, and registers the generated adapters.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::backend::{AdapterRegistry, BackendKind};
use crate::error::{CotejarError, Result};
use crate::export::ExportArtifact;

/// Default conversion timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Files the conversion tool produced for one backend
///
/// The harness never interprets the structure or weights content; it only
/// guarantees their existence and hands the adapter program to the backend
/// runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedArtifact {
    /// Backend the artifact targets
    pub backend: BackendKind,
    /// Graph structure file
    pub graph: PathBuf,
    /// Weights file
    pub weights: PathBuf,
    /// Generated adapter program
    pub adapter: PathBuf,
}

/// Deterministic converted-artifact paths for a case and backend
#[must_use]
pub fn converted_paths(dir: &Path, case: &str, backend: BackendKind) -> ConvertedArtifact {
    let stem = format!("{case}_{backend}");
    ConvertedArtifact {
        backend,
        graph: dir.join(format!("{stem}.graph")),
        weights: dir.join(format!("{stem}.weights")),
        adapter: dir.join(stem),
    }
}

/// Encode per-input shape tuples as the tool's `inputshape=` payload
///
/// One bracketed tuple per model input, in declared order:
/// `[1,3,32],[1,3,32,32]`.
#[must_use]
pub fn encode_input_shapes(shapes: &[Vec<usize>]) -> String {
    let tuples: Vec<String> = shapes
        .iter()
        .map(|shape| {
            let dims: Vec<String> = shape.iter().map(ToString::to_string).collect();
            format!("[{}]", dims.join(","))
        })
        .collect();
    tuples.join(",")
}

/// External conversion tool invoker
#[derive(Debug, Clone)]
pub struct Converter {
    tool: PathBuf,
    timeout: Duration,
}

impl Converter {
    /// Create an invoker for a tool binary
    #[must_use]
    pub fn new(tool: &Path) -> Self {
        Self {
            tool: tool.to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the conversion timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Tool binary path
    #[must_use]
    pub fn tool(&self) -> &Path {
        &self.tool
    }

    /// Build the tool's argument list
    ///
    /// Explicit argv construction; nothing here passes through a shell.
    #[must_use]
    pub fn build_args(
        artifact_path: &Path,
        input_shapes: &[Vec<usize>],
        backends: &[BackendKind],
    ) -> Vec<String> {
        let mut args = Vec::with_capacity(2 + backends.len());
        args.push(artifact_path.display().to_string());
        args.push(format!("inputshape={}", encode_input_shapes(input_shapes)));
        for backend in backends {
            args.push(format!("backend={backend}"));
        }
        args
    }

    /// Run the conversion tool against an exported artifact
    ///
    /// Blocks until the tool exits or the timeout expires. On success,
    /// verifies that every backend's converted files exist and registers
    /// each generated adapter program into `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::ConversionFailed`] on launch failure,
    /// non-zero exit, timeout, or missing converted files. No partial
    /// result is produced.
    pub fn convert(
        &self,
        case: &str,
        artifact: &ExportArtifact,
        input_shapes: &[Vec<usize>],
        backends: &[BackendKind],
        registry: &mut AdapterRegistry,
    ) -> Result<BTreeMap<BackendKind, ConvertedArtifact>> {
        let work_dir = artifact
            .path()
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let args = Self::build_args(artifact.path(), input_shapes, backends);

        let fail = |reason: String| CotejarError::ConversionFailed {
            case: case.to_string(),
            reason,
        };

        let mut child = Command::new(&self.tool)
            .args(&args)
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| fail(format!("Failed to launch {}: {e}", self.tool.display())))?;

        // Drain pipes on reader threads so a chatty tool cannot deadlock on
        // a full pipe buffer while we poll for exit.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        let stderr = stderr_reader.join().unwrap_or_default();
                        return Err(fail(format!(
                            "Timed out after {:?}; partial stderr: {}",
                            self.timeout,
                            stderr.trim()
                        )));
                    }
                    thread::sleep(POLL_INTERVAL);
                },
                Err(e) => return Err(fail(format!("Failed to wait for tool: {e}"))),
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(fail(format!(
                "Tool exited with {:?}; stdout: {}; stderr: {}",
                status.code(),
                stdout.trim(),
                stderr.trim()
            )));
        }

        let mut artifacts = BTreeMap::new();
        for &backend in backends {
            let converted = converted_paths(&work_dir, case, backend);
            for file in [&converted.graph, &converted.weights, &converted.adapter] {
                if !file.exists() {
                    return Err(fail(format!(
                        "Tool exited 0 but did not write {}",
                        file.display()
                    )));
                }
            }
            registry.register_program(case, backend, &converted.adapter);
            artifacts.insert(backend, converted);
        }
        Ok(artifacts)
    }
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = source {
            let _ = reader.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
