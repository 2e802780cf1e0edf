//! Tensor type and deterministic example-input generation
//!
//! The tensor is a plain N-dimensional array: row-major data plus a shape.
//! Example inputs for a test case are described by [`InputSpec`] and
//! generated from a seeded PRNG, so the reference run and the generated
//! backend adapter reconstruct bit-identical inputs from the same
//! specification.

use std::fmt;

use num_traits::Num;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{CotejarError, Result};

/// N-dimensional tensor with row-major storage
///
/// # Examples
///
/// ```
/// use cotejar::Tensor;
///
/// let t = Tensor::from_vec(vec![2, 3], vec![
///     1.0, 2.0, 3.0,
///     4.0, 5.0, 6.0,
/// ]).unwrap();
///
/// assert_eq!(t.shape(), &[2, 3]);
/// assert_eq!(t.ndim(), 2);
/// assert_eq!(t.size(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor<T: Num> {
    /// Flattened data in row-major order
    data: Vec<T>,
    /// Shape of the tensor
    shape: Vec<usize>,
}

impl<T: Num + Clone> Tensor<T> {
    /// Create a new tensor from a vector and shape
    ///
    /// # Errors
    ///
    /// Returns `Err` if the shape is empty, contains a zero dimension, or
    /// does not match the data length.
    pub fn from_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        if shape.is_empty() {
            return Err(CotejarError::InvalidShape {
                reason: "Shape cannot be empty".to_string(),
            });
        }

        if shape.contains(&0) {
            return Err(CotejarError::InvalidShape {
                reason: "Shape dimensions cannot be zero".to_string(),
            });
        }

        let expected_size: usize = shape.iter().product();
        if data.len() != expected_size {
            return Err(CotejarError::InvalidShape {
                reason: format!(
                    "Data length {} does not match shape {:?} (expected {})",
                    data.len(),
                    shape,
                    expected_size
                ),
            });
        }

        Ok(Self { data, shape })
    }

    /// Shape of the tensor
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Flattened data in row-major order
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Consume the tensor, returning its flattened data
    #[must_use]
    pub fn into_data(self) -> Vec<T> {
        self.data
    }
}

impl<T: Num + fmt::Debug> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(shape={:?}, size={})", self.shape, self.data.len())
    }
}

/// How an example input tensor is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillPolicy {
    /// Uniform values in `[0, 1)`
    Uniform,
    /// Uniform values in `[-1, 1)`
    UniformSigned,
}

/// Named example input: shape plus fill policy
///
/// The ordered list of `InputSpec`s on a test case is the input signature of
/// its reference model. The same specs and seed must be used on both sides
/// of the conversion; a generation mismatch between the reference run and a
/// generated adapter is a harness bug, not a conversion defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Input name, in declared order
    pub name: String,
    /// Tensor shape
    pub shape: Vec<usize>,
    /// Fill policy for generated values
    pub fill: FillPolicy,
}

impl InputSpec {
    /// Create a uniform-`[0,1)` input spec
    #[must_use]
    pub fn uniform(name: &str, shape: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            shape,
            fill: FillPolicy::Uniform,
        }
    }

    /// Generate the example tensor, consuming values from `rng`
    ///
    /// # Errors
    ///
    /// Returns `Err` if the declared shape is invalid.
    pub fn generate(&self, rng: &mut StdRng) -> Result<Tensor<f32>> {
        let size: usize = self.shape.iter().product();
        let data: Vec<f32> = (0..size)
            .map(|_| match self.fill {
                FillPolicy::Uniform => rng.gen_range(0.0..1.0),
                FillPolicy::UniformSigned => rng.gen_range(-1.0..1.0),
            })
            .collect();
        Tensor::from_vec(self.shape.clone(), data)
    }
}

/// Generate all example inputs for a case from a single seeded PRNG
///
/// Inputs are generated in declared order from one PRNG stream, so a fixed
/// seed reproduces the full input set exactly.
///
/// # Errors
///
/// Returns `Err` if any spec declares an invalid shape.
pub fn generate_inputs(specs: &[InputSpec], seed: u64) -> Result<Vec<Tensor<f32>>> {
    let mut rng = StdRng::seed_from_u64(seed);
    specs.iter().map(|spec| spec.generate(&mut rng)).collect()
}
