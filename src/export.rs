//! Interchange artifact export (CJX format)
//!
//! The exporter serializes a reference model's graph, its input signature,
//! and the case seed into a single portable file consumed by the external
//! conversion tool.
//!
//! ## Format Structure (CJX v1)
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (64 bytes)                            │
//! │   - Magic: "CJX1" (4 bytes)                  │
//! │   - Format version (2 bytes)                 │
//! │   - Flags (2 bytes)                          │
//! │   - Input count (4 bytes)                    │
//! │   - Path count (4 bytes)                     │
//! │   - Metadata offset (8 bytes)                │
//! │   - Metadata size (8 bytes)                  │
//! │   - Metadata CRC32 (4 bytes)                 │
//! │   - Reserved (28 bytes)                      │
//! ├──────────────────────────────────────────────┤
//! │ JSON metadata: graph, input signature, seed  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The artifact path is derived from the test case name; re-exporting
//! overwrites in place. Artifacts are deliberately left on disk after a run
//! for inspection.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CotejarError, Result};
use crate::model::{GraphSpec, ReferenceModel};
use crate::tensor::InputSpec;

/// CJX magic bytes
pub const MAGIC: [u8; 4] = *b"CJX1";
/// CJX format version written by this crate
pub const FORMAT_VERSION: u16 = 1;
/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 64;

/// CRC32 checksum (IEEE polynomial 0xEDB88320)
fn crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let idx = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = TABLE[idx] ^ (crc >> 8);
    }
    !crc
}

/// Everything the conversion tool needs to reproduce the model and its
/// example inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    /// The model graph
    pub graph: GraphSpec,
    /// Input signature in declared order
    pub inputs: Vec<InputSpec>,
    /// Seed the example inputs are generated from
    pub seed: u64,
}

/// An interchange artifact on disk
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    path: PathBuf,
    manifest: ExportManifest,
}

impl ExportArtifact {
    /// Location of the artifact file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed manifest
    #[must_use]
    pub fn manifest(&self) -> &ExportManifest {
        &self.manifest
    }

    /// Load and validate an artifact from disk
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::FormatError`] on bad magic, unsupported
    /// version, truncation, or checksum mismatch, and
    /// [`CotejarError::IoError`] if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| CotejarError::IoError {
            message: format!("Failed to read artifact {}: {e}", path.display()),
        })?;

        if bytes.len() < HEADER_SIZE {
            return Err(CotejarError::FormatError {
                reason: format!("Artifact truncated: {} bytes < header size", bytes.len()),
            });
        }
        if bytes[0..4] != MAGIC {
            return Err(CotejarError::FormatError {
                reason: "Bad magic, not a CJX artifact".to_string(),
            });
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(CotejarError::FormatError {
                reason: format!("Unsupported CJX version {version}"),
            });
        }

        let meta_offset = u64::from_le_bytes(
            bytes[16..24].try_into().expect("8-byte slice"),
        ) as usize;
        let meta_size = u64::from_le_bytes(
            bytes[24..32].try_into().expect("8-byte slice"),
        ) as usize;
        let checksum = u32::from_le_bytes(bytes[32..36].try_into().expect("4-byte slice"));

        let end = meta_offset.checked_add(meta_size).unwrap_or(usize::MAX);
        if meta_offset < HEADER_SIZE || end > bytes.len() {
            return Err(CotejarError::FormatError {
                reason: format!(
                    "Metadata bounds [{meta_offset}, {end}) outside artifact of {} bytes",
                    bytes.len()
                ),
            });
        }

        let metadata = &bytes[meta_offset..end];
        let actual = crc32(metadata);
        if actual != checksum {
            return Err(CotejarError::FormatError {
                reason: format!("Metadata checksum mismatch: {actual:#010x} != {checksum:#010x}"),
            });
        }

        let manifest: ExportManifest =
            serde_json::from_slice(metadata).map_err(|e| CotejarError::FormatError {
                reason: format!("Metadata decode failed: {e}"),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            manifest,
        })
    }
}

/// Artifact path for a test case name
#[must_use]
pub fn artifact_path(work_dir: &Path, case: &str) -> PathBuf {
    work_dir.join(format!("{case}.cjx"))
}

/// Serialize a reference model and its input signature to an interchange
/// artifact
///
/// Writes exactly one file at `path`, overwriting any previous export for
/// the same case.
///
/// # Errors
///
/// Returns [`CotejarError::UnsupportedExport`] if the model cannot describe
/// itself as a graph, and [`CotejarError::IoError`] on write failure.
pub fn export(
    model: &dyn ReferenceModel,
    inputs: &[InputSpec],
    seed: u64,
    path: &Path,
) -> Result<ExportArtifact> {
    let graph = model.graph()?;
    let manifest = ExportManifest {
        graph,
        inputs: inputs.to_vec(),
        seed,
    };

    let metadata = serde_json::to_vec(&manifest).map_err(|e| CotejarError::FormatError {
        reason: format!("Metadata encode failed: {e}"),
    })?;

    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&MAGIC);
    header[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    // flags at [6..8] stay zero
    header[8..12].copy_from_slice(&(manifest.inputs.len() as u32).to_le_bytes());
    header[12..16].copy_from_slice(&(manifest.graph.paths.len() as u32).to_le_bytes());
    header[16..24].copy_from_slice(&(HEADER_SIZE as u64).to_le_bytes());
    header[24..32].copy_from_slice(&(metadata.len() as u64).to_le_bytes());
    header[32..36].copy_from_slice(&crc32(&metadata).to_le_bytes());

    let mut bytes = Vec::with_capacity(HEADER_SIZE + metadata.len());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&metadata);

    fs::write(path, &bytes).map_err(|e| CotejarError::IoError {
        message: format!("Failed to write artifact {}: {e}", path.display()),
    })?;

    Ok(ExportArtifact {
        path: path.to_path_buf(),
        manifest,
    })
}
