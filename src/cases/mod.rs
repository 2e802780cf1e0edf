//! Shipped conformance cases
//!
//! Each case pins one or a few operator configurations with fixed input
//! shapes and a fixed seed, so re-running against the same toolchain is
//! fully reproducible. Index-permutation cases are held to exact equality;
//! cases whose arithmetic accumulates rounding differences across backends
//! use the standard approximate policy.

use crate::backend::BackendKind;
use crate::compare::TolerancePolicy;
use crate::driver::{TestCase, ToolVersion};
use crate::model::{GraphModel, GraphOp, GraphPath, GraphSpec, ResizeTarget};
use crate::tensor::InputSpec;

/// Replication padding, three stacked margin configurations
///
/// (1,12,13,13) padded by (2,2,2,2), (3,4,5,6), (1,0,2,0) to (1,12,25,28).
#[must_use]
pub fn replication_pad2d() -> TestCase {
    let model = GraphModel::new(GraphSpec {
        paths: vec![GraphPath::chain(
            0,
            vec![
                GraphOp::ReplicationPad2d {
                    left: 2,
                    right: 2,
                    top: 2,
                    bottom: 2,
                },
                GraphOp::ReplicationPad2d {
                    left: 3,
                    right: 4,
                    top: 5,
                    bottom: 6,
                },
                GraphOp::ReplicationPad2d {
                    left: 1,
                    right: 0,
                    top: 2,
                    bottom: 0,
                },
            ],
        )],
    });
    TestCase::new(
        "replication_pad2d",
        model,
        vec![InputSpec::uniform("x", vec![1, 12, 13, 13])],
    )
    .with_backends(vec![BackendKind::Engine])
}

/// Plain 2-D matrix multiplication, (23,14) x (14,35)
#[must_use]
pub fn matmul() -> TestCase {
    let model = GraphModel::new(GraphSpec {
        paths: vec![GraphPath {
            inputs: vec![0, 1],
            ops: vec![GraphOp::MatMul],
        }],
    });
    TestCase::new(
        "matmul",
        model,
        vec![
            InputSpec::uniform("a0", vec![23, 14]),
            InputSpec::uniform("a1", vec![14, 35]),
        ],
    )
    .with_backends(vec![BackendKind::Engine])
}

/// Hard sigmoid over four input ranks
///
/// Each input is first mapped from [0,1) to [-1,1) so the activation is
/// exercised on both sides of zero.
#[must_use]
pub fn hardsigmoid() -> TestCase {
    let chain = |input: usize| {
        GraphPath::chain(
            input,
            vec![
                GraphOp::Affine {
                    mul: 2.0,
                    add: -1.0,
                },
                GraphOp::HardSigmoid,
            ],
        )
    };
    let model = GraphModel::new(GraphSpec {
        paths: vec![chain(0), chain(1), chain(2), chain(3)],
    });
    TestCase::new(
        "hardsigmoid",
        model,
        vec![
            InputSpec::uniform("x", vec![1, 16]),
            InputSpec::uniform("y", vec![12, 2, 16]),
            InputSpec::uniform("z", vec![1, 3, 12, 16]),
            InputSpec::uniform("w", vec![1, 5, 7, 9, 11]),
        ],
    )
}

/// Two successive pixel shuffles, factors 2 then 4
///
/// Pure index permutation: outputs must survive conversion bit-for-bit.
/// The second shuffle factor needs toolchain 1.12.
#[must_use]
pub fn pixel_shuffle() -> TestCase {
    let model = GraphModel::new(GraphSpec {
        paths: vec![GraphPath::chain(
            0,
            vec![
                GraphOp::PixelShuffle { upscale: 2 },
                GraphOp::PixelShuffle { upscale: 4 },
            ],
        )],
    });
    TestCase::new(
        "pixel_shuffle",
        model,
        vec![InputSpec::uniform("x", vec![1, 128, 6, 7])],
    )
    .with_policy(TolerancePolicy::Exact)
    .with_min_version(ToolVersion::new(1, 12, 0))
}

/// Nearest and linear resampling chains over 3-D and 4-D inputs
///
/// Targets the graph backend only, where resampling re-executes the same
/// kernels and stays deterministic; exact equality applies.
#[must_use]
pub fn upsample() -> TestCase {
    let model = GraphModel::new(GraphSpec {
        paths: vec![
            GraphPath::chain(
                0,
                vec![
                    GraphOp::UpsampleNearest1d {
                        target: ResizeTarget::Size(vec![16]),
                    },
                    GraphOp::UpsampleNearest1d {
                        target: ResizeTarget::Scale(vec![2.0]),
                    },
                    GraphOp::UpsampleLinear1d {
                        target: ResizeTarget::Size(vec![24]),
                        align_corners: true,
                    },
                ],
            ),
            GraphPath::chain(
                1,
                vec![
                    GraphOp::UpsampleNearest2d {
                        target: ResizeTarget::Size(vec![16, 16]),
                    },
                    GraphOp::UpsampleNearest2d {
                        target: ResizeTarget::Scale(vec![2.0, 2.0]),
                    },
                    GraphOp::UpsampleBilinear2d {
                        target: ResizeTarget::Size(vec![20, 20]),
                        align_corners: false,
                    },
                    GraphOp::UpsampleBilinear2d {
                        target: ResizeTarget::Scale(vec![2.0, 3.0]),
                        align_corners: true,
                    },
                ],
            ),
        ],
    });
    TestCase::new(
        "upsample",
        model,
        vec![
            InputSpec::uniform("x", vec![1, 3, 32]),
            InputSpec::uniform("y", vec![1, 3, 32, 32]),
        ],
    )
    .with_policy(TolerancePolicy::Exact)
}

/// All shipped cases, in a stable order
#[must_use]
pub fn all() -> Vec<TestCase> {
    vec![
        replication_pad2d(),
        matmul(),
        hardsigmoid(),
        pixel_shuffle(),
        upsample(),
    ]
}

/// Look up a shipped case by name
#[must_use]
pub fn find(name: &str) -> Option<TestCase> {
    all().into_iter().find(|case| case.name() == name)
}
