//! Converter Invoker against fake external tools
//!
//! These tests stand in a small shell script for the conversion tool to
//! exercise the real subprocess path: argument delivery, exit-code
//! handling, timeout enforcement, and converted-artifact existence checks.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serial_test::serial;

use cotejar::backend::{AdapterRegistry, BackendKind};
use cotejar::convert::{converted_paths, Converter};
use cotejar::error::CotejarError;
use cotejar::export::{artifact_path, export, ExportArtifact};
use cotejar::model::{GraphModel, GraphOp, GraphPath, GraphSpec};
use cotejar::tensor::InputSpec;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

// Fake converter: derives the case stem from the artifact path and writes
// the expected structure/weights pair plus an empty adapter program for
// every backend= argument.
const WRITE_ALL_OUTPUTS: &str = r#"#!/bin/sh
stem=$(basename "$1" .cjx)
for arg in "$@"; do
  case "$arg" in
    backend=*)
      b=${arg#backend=}
      : > "${stem}_${b}.graph"
      : > "${stem}_${b}.weights"
      printf '#!/bin/sh\nexit 0\n' > "${stem}_${b}"
      chmod +x "${stem}_${b}"
      ;;
  esac
done
exit 0
"#;

fn exported_case(dir: &Path, case: &str) -> ExportArtifact {
    let model = GraphModel::new(GraphSpec {
        paths: vec![GraphPath::chain(0, vec![GraphOp::HardSigmoid])],
    });
    export(
        &model,
        &[InputSpec::uniform("x", vec![2, 3])],
        0,
        &artifact_path(dir, case),
    )
    .unwrap()
}

#[test]
#[serial]
fn conversion_success_returns_artifacts_and_registers_adapters() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_script(dir.path(), "fake-convert", WRITE_ALL_OUTPUTS);
    let artifact = exported_case(dir.path(), "hsig");

    let mut registry = AdapterRegistry::new();
    let backends = [BackendKind::Graph, BackendKind::Engine];
    let artifacts = Converter::new(&tool)
        .convert("hsig", &artifact, &[vec![2, 3]], &backends, &mut registry)
        .unwrap();

    assert_eq!(artifacts.len(), 2);
    for &backend in &backends {
        let converted = &artifacts[&backend];
        assert_eq!(*converted, converted_paths(dir.path(), "hsig", backend));
        assert!(converted.graph.exists());
        assert!(converted.weights.exists());
        assert!(converted.adapter.exists());
        assert!(registry.contains("hsig", backend));
    }
}

#[test]
#[serial]
fn converter_receives_inputshape_argument() {
    let dir = tempfile::tempdir().unwrap();
    // Record argv, then produce the expected outputs
    let body = r#"#!/bin/sh
echo "$@" > argv.txt
stem=$(basename "$1" .cjx)
for arg in "$@"; do
  case "$arg" in
    backend=*)
      b=${arg#backend=}
      : > "${stem}_${b}.graph"
      : > "${stem}_${b}.weights"
      printf '#!/bin/sh\nexit 0\n' > "${stem}_${b}"
      chmod +x "${stem}_${b}"
      ;;
  esac
done
exit 0
"#;
    let tool = write_script(dir.path(), "fake-convert", body);
    let artifact = exported_case(dir.path(), "hsig");

    let mut registry = AdapterRegistry::new();
    Converter::new(&tool)
        .convert(
            "hsig",
            &artifact,
            &[vec![1, 3, 32], vec![1, 3, 32, 32]],
            &[BackendKind::Graph],
            &mut registry,
        )
        .unwrap();

    let argv = fs::read_to_string(dir.path().join("argv.txt")).unwrap();
    assert!(argv.contains("hsig.cjx"));
    assert!(argv.contains("inputshape=[1,3,32],[1,3,32,32]"));
    assert!(argv.contains("backend=graph"));
}

#[test]
#[serial]
fn nonzero_exit_is_fatal_conversion_failure() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_script(
        dir.path(),
        "fake-convert",
        "#!/bin/sh\necho unsupported operator >&2\nexit 3\n",
    );
    let artifact = exported_case(dir.path(), "hsig");

    let mut registry = AdapterRegistry::new();
    let err = Converter::new(&tool)
        .convert(
            "hsig",
            &artifact,
            &[vec![2, 3]],
            &[BackendKind::Graph],
            &mut registry,
        )
        .unwrap_err();

    match err {
        CotejarError::ConversionFailed { case, reason } => {
            assert_eq!(case, "hsig");
            assert!(reason.contains('3'));
            assert!(reason.contains("unsupported operator"));
        },
        other => panic!("Expected ConversionFailed, got {other:?}"),
    }
    // No partial registration on failure
    assert!(!registry.contains("hsig", BackendKind::Graph));
}

#[test]
#[serial]
fn zero_exit_without_artifacts_is_conversion_failure() {
    let dir = tempfile::tempdir().unwrap();
    // Tool claims success but writes only the graph file
    let body = r#"#!/bin/sh
stem=$(basename "$1" .cjx)
: > "${stem}_graph.graph"
exit 0
"#;
    let tool = write_script(dir.path(), "fake-convert", body);
    let artifact = exported_case(dir.path(), "hsig");

    let mut registry = AdapterRegistry::new();
    let err = Converter::new(&tool)
        .convert(
            "hsig",
            &artifact,
            &[vec![2, 3]],
            &[BackendKind::Graph],
            &mut registry,
        )
        .unwrap_err();

    match err {
        CotejarError::ConversionFailed { reason, .. } => {
            assert!(reason.contains("hsig_graph.weights"));
        },
        other => panic!("Expected ConversionFailed, got {other:?}"),
    }
}

#[test]
#[serial]
fn timeout_kills_tool_and_fails_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_script(dir.path(), "fake-convert", "#!/bin/sh\nsleep 30\n");
    let artifact = exported_case(dir.path(), "hsig");

    let mut registry = AdapterRegistry::new();
    let err = Converter::new(&tool)
        .with_timeout(Duration::from_millis(200))
        .convert(
            "hsig",
            &artifact,
            &[vec![2, 3]],
            &[BackendKind::Graph],
            &mut registry,
        )
        .unwrap_err();

    match err {
        CotejarError::ConversionFailed { reason, .. } => {
            assert!(reason.contains("Timed out"));
        },
        other => panic!("Expected ConversionFailed, got {other:?}"),
    }
}

#[test]
#[serial]
fn missing_tool_binary_is_conversion_failure() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = exported_case(dir.path(), "hsig");

    let mut registry = AdapterRegistry::new();
    let err = Converter::new(Path::new("/nonexistent/tool"))
        .convert(
            "hsig",
            &artifact,
            &[vec![2, 3]],
            &[BackendKind::Graph],
            &mut registry,
        )
        .unwrap_err();
    assert!(matches!(err, CotejarError::ConversionFailed { .. }));
}
