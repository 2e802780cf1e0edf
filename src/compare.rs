//! Comparator: judges backend outputs against reference outputs
//!
//! Two equivalence rules, chosen per test case by the operator semantics
//! under test. Pure index and shape manipulations (pixel rearrangement,
//! replication padding re-executed on identical kernels) must survive
//! conversion bit-for-bit; anything accumulating floating-point arithmetic
//! (matrix multiplication, activations) is held to an absolute-plus-relative
//! tolerance instead.
//!
//! Shape disagreement is itself a failed verdict, never an error to be
//! swallowed, and no element comparison is attempted on mismatched shapes.

use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Default absolute tolerance for approximate comparison
pub const DEFAULT_ATOL: f32 = 1e-4;
/// Default relative tolerance for approximate comparison
pub const DEFAULT_RTOL: f32 = 1e-4;

/// Equivalence rule applied to each output element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TolerancePolicy {
    /// Every element must be bit-identical
    Exact,
    /// Every element must satisfy `|actual - expected| <= atol + rtol * |expected|`
    Approximate {
        /// Absolute tolerance
        atol: f32,
        /// Relative tolerance
        rtol: f32,
    },
}

impl TolerancePolicy {
    /// The standard approximate policy (atol = rtol = 1e-4)
    #[must_use]
    pub fn approximate() -> Self {
        Self::Approximate {
            atol: DEFAULT_ATOL,
            rtol: DEFAULT_RTOL,
        }
    }
}

impl Default for TolerancePolicy {
    fn default() -> Self {
        Self::approximate()
    }
}

/// One observed disagreement between expected and actual outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mismatch {
    /// The two runs produced different numbers of outputs
    OutputCount {
        /// Reference output count
        expected: usize,
        /// Backend output count
        actual: usize,
    },
    /// Output shapes disagree; elements were not compared
    Shape {
        /// Output index
        output: usize,
        /// Reference shape
        expected: Vec<usize>,
        /// Backend shape
        actual: Vec<usize>,
    },
    /// Element values disagree under the policy
    Value {
        /// Output index
        output: usize,
        /// Flat index of the worst element
        element: usize,
        /// Largest observed `|actual - expected|` in this output
        max_abs_deviation: f32,
    },
}

/// Comparison verdict with diagnostics
///
/// `passed()` is the boolean contract; the mismatch list exists for
/// debugging and failure reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictReport {
    mismatches: Vec<Mismatch>,
}

impl VerdictReport {
    /// Overall verdict: all outputs passed the policy
    #[must_use]
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Observed disagreements, empty on pass
    #[must_use]
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    /// Human-readable single-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        if self.passed() {
            return "pass".to_string();
        }
        let details: Vec<String> = self
            .mismatches
            .iter()
            .map(|m| match m {
                Mismatch::OutputCount { expected, actual } => {
                    format!("output count {actual} != {expected}")
                },
                Mismatch::Shape {
                    output,
                    expected,
                    actual,
                } => format!("output {output}: shape {actual:?} != {expected:?}"),
                Mismatch::Value {
                    output,
                    element,
                    max_abs_deviation,
                } => format!(
                    "output {output}: max deviation {max_abs_deviation:e} at element {element}"
                ),
            })
            .collect();
        format!("fail ({})", details.join("; "))
    }
}

fn compare_output(
    output: usize,
    expected: &Tensor<f32>,
    actual: &Tensor<f32>,
    policy: TolerancePolicy,
) -> Option<Mismatch> {
    if expected.shape() != actual.shape() {
        return Some(Mismatch::Shape {
            output,
            expected: expected.shape().to_vec(),
            actual: actual.shape().to_vec(),
        });
    }

    let mut worst_element = 0usize;
    let mut worst_deviation = 0.0f32;
    let mut failed = false;

    for (element, (&e, &a)) in expected.data().iter().zip(actual.data().iter()).enumerate() {
        let within = match policy {
            TolerancePolicy::Exact => e.to_bits() == a.to_bits(),
            TolerancePolicy::Approximate { atol, rtol } => {
                (a - e).abs() <= atol + rtol * e.abs()
            },
        };
        if within {
            continue;
        }
        failed = true;
        let deviation = (a - e).abs();
        // NaN deviations (either side non-finite) take precedence as worst
        if deviation.is_nan() || deviation > worst_deviation {
            worst_deviation = deviation;
            worst_element = element;
            if deviation.is_nan() {
                break;
            }
        }
    }

    if failed {
        Some(Mismatch::Value {
            output,
            element: worst_element,
            max_abs_deviation: worst_deviation,
        })
    } else {
        None
    }
}

/// Compare backend outputs against reference outputs under a policy
///
/// Each output is judged independently; the overall verdict is the logical
/// AND across outputs.
#[must_use]
pub fn compare(
    expected: &[Tensor<f32>],
    actual: &[Tensor<f32>],
    policy: TolerancePolicy,
) -> VerdictReport {
    if expected.len() != actual.len() {
        return VerdictReport {
            mismatches: vec![Mismatch::OutputCount {
                expected: expected.len(),
                actual: actual.len(),
            }],
        };
    }

    let mismatches = expected
        .iter()
        .zip(actual.iter())
        .enumerate()
        .filter_map(|(idx, (e, a))| compare_output(idx, e, a, policy))
        .collect();
    VerdictReport { mismatches }
}
