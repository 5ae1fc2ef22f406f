//! Error types for sparsecube
//!
//! Every failure in the container is a local, recoverable condition. Nothing
//! here is meant to abort the process; callers match on the variant and
//! decide what to do.

use crate::types::{MetaId, ObjectId};
use thiserror::Error;

/// Common result type for sparsecube operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for sparsecube
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    // Structural errors
    #[error("dimension mismatch on object {object}: expected {expected} axes, found {found}")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        object: ObjectId,
    },

    #[error("block shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("structure holds no data objects")]
    EmptyStructure,

    #[error("structure has not been validated")]
    NotValidated,

    // Lookup errors
    #[error("data object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("metadata record not found: {0}")]
    MetadataNotFound(MetaId),

    #[error("axis not found: {0}")]
    AxisNotFound(String),

    #[error("metadata field not found: {0}")]
    FieldNotFound(String),

    #[error("coordinate {value} not found on axis {axis}")]
    CoordNotFound { axis: usize, value: String },

    #[error("no data object matches {0}")]
    NoMatch(String),

    // Argument errors
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cannot parse {raw:?} as {kind} for field {field}")]
    ParseValue {
        field: String,
        kind: String,
        raw: String,
    },

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid query error
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ObjectNotFound(_)
                | Self::MetadataNotFound(_)
                | Self::AxisNotFound(_)
                | Self::FieldNotFound(_)
                | Self::CoordNotFound { .. }
                | Self::NoMatch(_)
        )
    }

    /// Check if the caller violated a precondition (as opposed to a lookup miss)
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. }
                | Self::ShapeMismatch { .. }
                | Self::EmptyStructure
                | Self::NotValidated
                | Self::InvalidQuery(_)
                | Self::InvalidArgument(_)
        )
    }
}
