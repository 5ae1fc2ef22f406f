//! Data block payloads
//!
//! A block is the array-like payload a data object carries. Its variant is
//! fixed when the block is built, so callers never have to re-derive the
//! shape by inspecting the contents.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use sparsecube_common::{Error, Result};

/// Payload of one data object
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Block {
    /// A single value (rank 0)
    Scalar(f64),
    /// An array of any rank
    Dense(ArrayD<f64>),
}

impl Block {
    /// Build a dense block from a flat buffer in row-major order
    pub fn from_shape_vec(shape: &[usize], data: Vec<f64>) -> Result<Self> {
        let found = data.len();
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(Self::Dense)
            .map_err(|_| Error::ShapeMismatch {
                expected: shape.to_vec(),
                found: vec![found],
            })
    }

    /// Shape of the payload; empty for scalars
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Self::Scalar(_) => Vec::new(),
            Self::Dense(array) => array.shape().to_vec(),
        }
    }

    /// Number of values held
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Dense(array) => array.len(),
        }
    }

    /// Check if the block holds no values
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value of a scalar block
    #[must_use]
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Dense(_) => None,
        }
    }

    /// Copy the payload into an owned array (rank 0 for scalars)
    #[must_use]
    pub fn to_array(&self) -> ArrayD<f64> {
        match self {
            Self::Scalar(v) => ArrayD::from_elem(IxDyn(&[]), *v),
            Self::Dense(array) => array.clone(),
        }
    }

    /// Elementwise in-place sum. Both blocks must have the same shape.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        let (ours, theirs) = (self.shape(), other.shape());
        if ours != theirs {
            return Err(Error::ShapeMismatch {
                expected: ours,
                found: theirs,
            });
        }
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => *a += *b,
            (Self::Dense(a), Self::Dense(b)) => *a += b,
            (Self::Scalar(a), Self::Dense(b)) => *a += b.sum(),
            (Self::Dense(a), Self::Scalar(b)) => *a += *b,
        }
        Ok(())
    }
}

impl From<f64> for Block {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<ArrayD<f64>> for Block {
    fn from(value: ArrayD<f64>) -> Self {
        Self::Dense(value)
    }
}
