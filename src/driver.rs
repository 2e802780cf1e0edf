//! Test driver: per-case pipeline and suite runner
//!
//! A test case runs as a strictly linear pipeline: version gate, input
//! generation, reference execution, export, conversion, then one backend
//! run and comparison per target. Every infrastructure failure and every
//! failed verdict collapses to the same process-level signal (exit code 1);
//! the [`CaseReport`] keeps them distinguishable for diagnostics.
//!
//! Cases are mutually independent: no shared state, artifact paths scoped
//! by case name. The suite runner exploits that by fanning cases out over a
//! rayon worker pool; ordering between cases carries no meaning.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backend::{AdapterRegistry, BackendKind};
use crate::compare::{compare, TolerancePolicy, VerdictReport};
use crate::convert::{Converter, DEFAULT_TIMEOUT};
use crate::error::{CotejarError, Result};
use crate::export::{artifact_path, export};
use crate::model::ReferenceModel;
use crate::tensor::{generate_inputs, InputSpec};

/// Version of the installed conversion toolchain
///
/// Parsed from `"major"`, `"major.minor"`, or `"major.minor.patch"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ToolVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl ToolVersion {
    /// Create a version triple
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for ToolVersion {
    type Err = CotejarError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || CotejarError::FormatError {
            reason: format!("Invalid tool version '{s}'"),
        };
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() > 3 {
            return Err(bad());
        }
        let mut components = [0u32; 3];
        for (idx, part) in parts.iter().enumerate() {
            components[idx] = part.parse::<u32>().map_err(|_| bad())?;
        }
        Ok(Self {
            major: components[0],
            minor: components[1],
            patch: components[2],
        })
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

/// Capability object describing the installed toolchain
///
/// Queried once at setup and passed into every case run; no case reads
/// version or tool location from ambient environment state.
#[derive(Debug, Clone)]
pub struct Toolchain {
    converter: PathBuf,
    work_dir: PathBuf,
    timeout: Duration,
    version: ToolVersion,
}

impl Toolchain {
    /// Describe a toolchain
    #[must_use]
    pub fn new(converter: &Path, work_dir: &Path, version: ToolVersion) -> Self {
        Self {
            converter: converter.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
            version,
        }
    }

    /// Override the conversion timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Installed toolchain version
    #[must_use]
    pub fn version(&self) -> ToolVersion {
        self.version
    }

    /// Work directory artifacts are written into
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn invoker(&self) -> Converter {
        Converter::new(&self.converter).with_timeout(self.timeout)
    }
}

/// One test case: a reference model, its example inputs, and the judgment
/// policy
pub struct TestCase {
    name: String,
    model: Box<dyn ReferenceModel>,
    inputs: Vec<InputSpec>,
    seed: u64,
    policy: TolerancePolicy,
    backends: Vec<BackendKind>,
    min_version: Option<ToolVersion>,
}

impl TestCase {
    /// Create a case with the default policy (approximate 1e-4), seed 0,
    /// and the graph backend as its only target
    pub fn new(
        name: &str,
        model: impl ReferenceModel + 'static,
        inputs: Vec<InputSpec>,
    ) -> Self {
        Self {
            name: name.to_string(),
            model: Box::new(model),
            inputs,
            seed: 0,
            policy: TolerancePolicy::approximate(),
            backends: vec![BackendKind::Graph],
            min_version: None,
        }
    }

    /// Override the input-generation seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the tolerance policy
    #[must_use]
    pub fn with_policy(mut self, policy: TolerancePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the backend targets
    #[must_use]
    pub fn with_backends(mut self, backends: Vec<BackendKind>) -> Self {
        self.backends = backends;
        self
    }

    /// Require a minimum toolchain version; older installations skip the
    /// case as passed
    #[must_use]
    pub fn with_min_version(mut self, version: ToolVersion) -> Self {
        self.min_version = Some(version);
        self
    }

    /// Case name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The reference model
    #[must_use]
    pub fn model(&self) -> &dyn ReferenceModel {
        self.model.as_ref()
    }

    /// Input signature in declared order
    #[must_use]
    pub fn inputs(&self) -> &[InputSpec] {
        &self.inputs
    }

    /// Tolerance policy
    #[must_use]
    pub fn policy(&self) -> TolerancePolicy {
        self.policy
    }

    /// Backend targets
    #[must_use]
    pub fn backends(&self) -> &[BackendKind] {
        &self.backends
    }

    /// Minimum required toolchain version, if any
    #[must_use]
    pub fn min_version(&self) -> Option<ToolVersion> {
        self.min_version
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("inputs", &self.inputs.len())
            .field("policy", &self.policy)
            .field("backends", &self.backends)
            .field("min_version", &self.min_version)
            .finish_non_exhaustive()
    }
}

/// Why a case failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Reference-side execution failed (input generation or forward pass)
    Reference(String),
    /// Model could not be exported to the interchange format
    Export(String),
    /// External conversion tool failed
    Conversion(String),
    /// Backend adapter load or execution failed
    Backend {
        /// Backend that failed
        backend: BackendKind,
        /// Failure detail
        detail: String,
    },
    /// Conversion succeeded but the numerics disagree
    Verdict {
        /// Backend whose output disagreed
        backend: BackendKind,
        /// Full comparison diagnostics
        report: VerdictReport,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(detail) => write!(f, "reference execution failed: {detail}"),
            Self::Export(detail) => write!(f, "export failed: {detail}"),
            Self::Conversion(detail) => write!(f, "conversion failed: {detail}"),
            Self::Backend { backend, detail } => {
                write!(f, "backend '{backend}' failed: {detail}")
            },
            Self::Verdict { backend, report } => {
                write!(f, "verdict mismatch on backend '{backend}': {}", report.summary())
            },
        }
    }
}

/// Outcome of one case run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaseOutcome {
    /// Every backend verdict passed
    Passed,
    /// Case requires a newer toolchain; vacuously passed, pipeline not run
    SkippedAsPass {
        /// The case's minimum required version
        required: ToolVersion,
        /// The installed version that fell short
        installed: ToolVersion,
    },
    /// Infrastructure failure or failed verdict
    Failed(FailureReason),
}

/// Report for one case run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
    /// Case name
    pub name: String,
    /// Outcome
    pub outcome: CaseOutcome,
}

impl CaseReport {
    /// Process exit code for this case: 0 on pass or skip-as-pass, 1 on
    /// any failure
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            CaseOutcome::Passed | CaseOutcome::SkippedAsPass { .. } => 0,
            CaseOutcome::Failed(_) => 1,
        }
    }

    /// One-line human-readable outcome
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.outcome {
            CaseOutcome::Passed => "pass".to_string(),
            CaseOutcome::SkippedAsPass {
                required,
                installed,
            } => format!("pass (skipped: requires toolchain >= {required}, installed {installed})"),
            CaseOutcome::Failed(reason) => format!("FAIL: {reason}"),
        }
    }
}

/// Run one test case through the full pipeline
///
/// Never panics and never returns `Err`: every failure mode is folded into
/// the report so one case cannot take down a multi-case run.
#[must_use]
pub fn run_case(case: &TestCase, toolchain: &Toolchain) -> CaseReport {
    let report = |outcome| CaseReport {
        name: case.name().to_string(),
        outcome,
    };

    if let Some(required) = case.min_version() {
        if toolchain.version() < required {
            return report(CaseOutcome::SkippedAsPass {
                required,
                installed: toolchain.version(),
            });
        }
    }

    match run_pipeline(case, toolchain) {
        Ok(outcome) => report(outcome),
        Err(reason) => report(CaseOutcome::Failed(reason)),
    }
}

fn run_pipeline(
    case: &TestCase,
    toolchain: &Toolchain,
) -> std::result::Result<CaseOutcome, FailureReason> {
    let inputs = generate_inputs(case.inputs(), case.seed)
        .map_err(|e| FailureReason::Reference(e.to_string()))?;
    let expected = case
        .model()
        .forward(&inputs)
        .map_err(|e| FailureReason::Reference(e.to_string()))?;

    fs::create_dir_all(toolchain.work_dir())
        .map_err(|e| FailureReason::Export(format!("work dir: {e}")))?;
    let artifact = export(
        case.model(),
        case.inputs(),
        case.seed,
        &artifact_path(toolchain.work_dir(), case.name()),
    )
    .map_err(|e| FailureReason::Export(e.to_string()))?;

    let shapes: Vec<Vec<usize>> = case.inputs().iter().map(|s| s.shape.clone()).collect();
    let mut registry = AdapterRegistry::new();
    toolchain
        .invoker()
        .convert(case.name(), &artifact, &shapes, case.backends(), &mut registry)
        .map_err(|e| FailureReason::Conversion(e.to_string()))?;

    for &backend in case.backends() {
        let actual = registry
            .run(case.name(), backend)
            .map_err(|e| FailureReason::Backend {
                backend,
                detail: e.to_string(),
            })?;
        let verdict = compare(&expected, &actual, case.policy());
        if !verdict.passed() {
            return Err(FailureReason::Verdict {
                backend,
                report: verdict,
            });
        }
    }
    Ok(CaseOutcome::Passed)
}

/// Aggregated suite results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Per-case reports in case order
    pub reports: Vec<CaseReport>,
}

impl SuiteReport {
    /// Count of fully passed cases
    #[must_use]
    pub fn passed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, CaseOutcome::Passed))
            .count()
    }

    /// Count of version-gated cases counted as passed
    #[must_use]
    pub fn skipped_as_pass(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, CaseOutcome::SkippedAsPass { .. }))
            .count()
    }

    /// Count of failed cases
    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, CaseOutcome::Failed(_)))
            .count()
    }

    /// Suite exit code: nonzero if any case failed
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.failed() > 0)
    }
}

/// Run a set of independent cases across a worker pool
///
/// Cases share no state and no artifact paths, so they fan out over rayon;
/// report order still matches case order.
#[must_use]
pub fn run_suite(cases: &[TestCase], toolchain: &Toolchain) -> SuiteReport {
    let reports = cases
        .par_iter()
        .map(|case| run_case(case, toolchain))
        .collect();
    SuiteReport { reports }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphModel, GraphOp, GraphPath, GraphSpec};

    fn hardsigmoid_model() -> GraphModel {
        GraphModel::new(GraphSpec {
            paths: vec![GraphPath::chain(0, vec![GraphOp::HardSigmoid])],
        })
    }

    #[test]
    fn test_tool_version_parse_forms() {
        assert_eq!("2".parse::<ToolVersion>().unwrap(), ToolVersion::new(2, 0, 0));
        assert_eq!(
            "1.12".parse::<ToolVersion>().unwrap(),
            ToolVersion::new(1, 12, 0)
        );
        assert_eq!(
            "1.12.3".parse::<ToolVersion>().unwrap(),
            ToolVersion::new(1, 12, 3)
        );
    }

    #[test]
    fn test_tool_version_parse_rejects_garbage() {
        assert!("".parse::<ToolVersion>().is_err());
        assert!("a.b".parse::<ToolVersion>().is_err());
        assert!("1.2.3.4".parse::<ToolVersion>().is_err());
    }

    #[test]
    fn test_tool_version_ordering() {
        let v1_11 = ToolVersion::new(1, 11, 0);
        let v1_12 = ToolVersion::new(1, 12, 0);
        let v2_0 = ToolVersion::new(2, 0, 0);
        assert!(v1_11 < v1_12);
        assert!(v1_12 < v2_0);
        assert!(ToolVersion::new(1, 12, 1) > v1_12);
    }

    #[test]
    fn test_tool_version_display() {
        assert_eq!(ToolVersion::new(1, 12, 0).to_string(), "1.12");
        assert_eq!(ToolVersion::new(1, 12, 3).to_string(), "1.12.3");
    }

    #[test]
    fn test_case_builder_defaults() {
        let case = TestCase::new("t", hardsigmoid_model(), vec![InputSpec::uniform("x", vec![4])]);
        assert_eq!(case.name(), "t");
        assert_eq!(case.backends(), &[BackendKind::Graph]);
        assert_eq!(case.policy(), TolerancePolicy::approximate());
        assert!(case.min_version().is_none());
    }

    #[test]
    fn test_version_gate_skips_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        // Converter path is deliberately bogus: the gate must fire before
        // any pipeline stage touches it
        let toolchain = Toolchain::new(
            Path::new("/nonexistent/converter"),
            dir.path(),
            ToolVersion::new(1, 11, 0),
        );
        let case = TestCase::new(
            "gated",
            hardsigmoid_model(),
            vec![InputSpec::uniform("x", vec![4])],
        )
        .with_min_version(ToolVersion::new(1, 12, 0));

        let report = run_case(&case, &toolchain);
        assert_eq!(report.exit_code(), 0);
        assert!(matches!(
            report.outcome,
            CaseOutcome::SkippedAsPass { .. }
        ));
        assert!(!artifact_path(dir.path(), "gated").exists());
    }

    #[test]
    fn test_version_gate_allows_equal_version() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = Toolchain::new(
            Path::new("/nonexistent/converter"),
            dir.path(),
            ToolVersion::new(1, 12, 0),
        );
        let case = TestCase::new(
            "ungated",
            hardsigmoid_model(),
            vec![InputSpec::uniform("x", vec![4])],
        )
        .with_min_version(ToolVersion::new(1, 12, 0));

        // Equal version runs the pipeline, which then fails on the bogus
        // converter: a conversion failure, not a skip
        let report = run_case(&case, &toolchain);
        assert_eq!(report.exit_code(), 1);
        assert!(matches!(
            report.outcome,
            CaseOutcome::Failed(FailureReason::Conversion(_))
        ));
    }

    #[test]
    fn test_launch_failure_is_conversion_failure() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = Toolchain::new(
            Path::new("/nonexistent/converter"),
            dir.path(),
            ToolVersion::new(2, 0, 0),
        );
        let case = TestCase::new(
            "launchfail",
            hardsigmoid_model(),
            vec![InputSpec::uniform("x", vec![4])],
        );
        let report = run_case(&case, &toolchain);
        match report.outcome {
            CaseOutcome::Failed(FailureReason::Conversion(detail)) => {
                assert!(detail.contains("launchfail"));
            },
            other => panic!("Expected conversion failure, got {other:?}"),
        }
        // The export artifact was still written and left for inspection
        assert!(artifact_path(dir.path(), "launchfail").exists());
    }

    #[test]
    fn test_suite_counts_and_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = Toolchain::new(
            Path::new("/nonexistent/converter"),
            dir.path(),
            ToolVersion::new(1, 0, 0),
        );
        let cases = vec![
            TestCase::new(
                "skipped",
                hardsigmoid_model(),
                vec![InputSpec::uniform("x", vec![4])],
            )
            .with_min_version(ToolVersion::new(99, 0, 0)),
            TestCase::new(
                "failing",
                hardsigmoid_model(),
                vec![InputSpec::uniform("x", vec![4])],
            ),
        ];

        let suite = run_suite(&cases, &toolchain);
        assert_eq!(suite.reports.len(), 2);
        assert_eq!(suite.skipped_as_pass(), 1);
        assert_eq!(suite.failed(), 1);
        assert_eq!(suite.passed(), 0);
        assert_eq!(suite.exit_code(), 1);
        // Report order matches case order despite parallel execution
        assert_eq!(suite.reports[0].name, "skipped");
        assert_eq!(suite.reports[1].name, "failing");
    }
}
