//! Reference models: graph specification and execution
//!
//! A reference model is a pure function from input tensors to output
//! tensors. The standard implementation, [`GraphModel`], interprets a
//! serializable [`GraphSpec`]: a list of paths, each consuming one or more
//! of the case's example inputs and producing exactly one output through a
//! chain of operators. The same spec is what the exporter writes into the
//! interchange artifact.

pub mod ops;

use serde::{Deserialize, Serialize};

use crate::error::{CotejarError, Result};
use crate::tensor::Tensor;
pub use ops::ResizeTarget;

/// One operator in a graph path
///
/// Closed enumeration: every member is backed by a reference kernel in
/// [`ops`] and is representable in the interchange format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphOp {
    /// Element-wise `x * mul + add`
    Affine {
        /// Multiplier
        mul: f32,
        /// Offset
        add: f32,
    },
    /// 2-D matrix multiplication, consumes two inputs
    MatMul,
    /// Hard sigmoid activation
    HardSigmoid,
    /// Edge-replication padding of a 4-D NCHW tensor
    ReplicationPad2d {
        /// Left margin
        left: usize,
        /// Right margin
        right: usize,
        /// Top margin
        top: usize,
        /// Bottom margin
        bottom: usize,
    },
    /// Channel-to-space rearrangement `(N, C*r^2, H, W) -> (N, C, H*r, W*r)`
    PixelShuffle {
        /// Upscale factor `r`
        upscale: usize,
    },
    /// Nearest-neighbor resampling along the last dimension of a 3-D tensor
    UpsampleNearest1d {
        /// Output size or scale factor
        target: ResizeTarget,
    },
    /// Nearest-neighbor resampling of a 4-D NCHW tensor
    UpsampleNearest2d {
        /// Output size or scale factor
        target: ResizeTarget,
    },
    /// Linear resampling along the last dimension of a 3-D tensor
    UpsampleLinear1d {
        /// Output size or scale factor
        target: ResizeTarget,
        /// Endpoint-aligned source mapping
        align_corners: bool,
    },
    /// Bilinear resampling of a 4-D NCHW tensor
    UpsampleBilinear2d {
        /// Output size or scale factor
        target: ResizeTarget,
        /// Endpoint-aligned source mapping
        align_corners: bool,
    },
}

impl GraphOp {
    /// Number of tensors this operator consumes
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::MatMul => 2,
            _ => 1,
        }
    }

    /// Apply the operator to its inputs
    ///
    /// # Errors
    ///
    /// Returns `Err` on arity mismatch or kernel shape validation failure.
    pub fn apply(&self, inputs: &[&Tensor<f32>]) -> Result<Tensor<f32>> {
        if inputs.len() != self.arity() {
            return Err(CotejarError::InvalidShape {
                reason: format!(
                    "{self:?} consumes {} input(s), got {}",
                    self.arity(),
                    inputs.len()
                ),
            });
        }
        match self {
            Self::Affine { mul, add } => ops::affine(inputs[0], *mul, *add),
            Self::MatMul => ops::matmul(inputs[0], inputs[1]),
            Self::HardSigmoid => ops::hardsigmoid(inputs[0]),
            Self::ReplicationPad2d {
                left,
                right,
                top,
                bottom,
            } => ops::replication_pad2d(inputs[0], *left, *right, *top, *bottom),
            Self::PixelShuffle { upscale } => ops::pixel_shuffle(inputs[0], *upscale),
            Self::UpsampleNearest1d { target } => ops::upsample_nearest_1d(inputs[0], target),
            Self::UpsampleNearest2d { target } => ops::upsample_nearest_2d(inputs[0], target),
            Self::UpsampleLinear1d {
                target,
                align_corners,
            } => ops::upsample_linear_1d(inputs[0], target, *align_corners),
            Self::UpsampleBilinear2d {
                target,
                align_corners,
            } => ops::upsample_bilinear_2d(inputs[0], target, *align_corners),
        }
    }
}

/// One output-producing path through the graph
///
/// The first operator consumes the gathered inputs (this is where
/// multi-input operators live); every following operator is unary and
/// consumes its predecessor's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    /// Indices into the case's example inputs, in consumption order
    pub inputs: Vec<usize>,
    /// Operator chain, at least one entry
    pub ops: Vec<GraphOp>,
}

impl GraphPath {
    /// Build a single-input path
    #[must_use]
    pub fn chain(input: usize, ops: Vec<GraphOp>) -> Self {
        Self {
            inputs: vec![input],
            ops,
        }
    }
}

/// Serializable model graph: ordered paths, one output per path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    /// Output-producing paths; output order is path order
    pub paths: Vec<GraphPath>,
}

/// A reference model under test
///
/// Implementations must be pure: stateless and deterministic for fixed
/// inputs. `forward` produces the ground-truth outputs; `graph` describes
/// the model to the exporter.
pub trait ReferenceModel: Send + Sync {
    /// Execute the model on the example inputs
    ///
    /// # Errors
    ///
    /// Returns `Err` if inputs do not satisfy the model's signature.
    fn forward(&self, inputs: &[Tensor<f32>]) -> Result<Vec<Tensor<f32>>>;

    /// Describe the model as a serializable graph
    ///
    /// # Errors
    ///
    /// Returns `Err` with [`CotejarError::UnsupportedExport`] if the model
    /// cannot be represented in the interchange format.
    fn graph(&self) -> Result<GraphSpec>;
}

/// Standard reference model: a [`GraphSpec`] interpreted with the reference
/// kernels
#[derive(Debug, Clone)]
pub struct GraphModel {
    spec: GraphSpec,
}

impl GraphModel {
    /// Create a model from a graph spec
    #[must_use]
    pub fn new(spec: GraphSpec) -> Self {
        Self { spec }
    }

    /// The underlying graph spec
    #[must_use]
    pub fn spec(&self) -> &GraphSpec {
        &self.spec
    }
}

impl ReferenceModel for GraphModel {
    fn forward(&self, inputs: &[Tensor<f32>]) -> Result<Vec<Tensor<f32>>> {
        let mut outputs = Vec::with_capacity(self.spec.paths.len());
        for path in &self.spec.paths {
            let mut gathered = Vec::with_capacity(path.inputs.len());
            for &idx in &path.inputs {
                let tensor = inputs.get(idx).ok_or_else(|| CotejarError::InvalidShape {
                    reason: format!(
                        "Graph path references input {idx}, only {} provided",
                        inputs.len()
                    ),
                })?;
                gathered.push(tensor);
            }

            let (first, rest) = path.ops.split_first().ok_or_else(|| {
                CotejarError::InvalidShape {
                    reason: "Graph path has no operators".to_string(),
                }
            })?;
            let mut current = first.apply(&gathered)?;
            for op in rest {
                current = op.apply(&[&current])?;
            }
            outputs.push(current);
        }
        Ok(outputs)
    }

    fn graph(&self) -> Result<GraphSpec> {
        Ok(self.spec.clone())
    }
}
