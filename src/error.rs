//! Error type for batched transform construction and conversion.
//!
//! Every shape problem surfaces as [`GeometryError::ShapeMismatch`]. Bad
//! geometry (collinear points, zero-length axes) is not an error: the numeric
//! routines guard those cases with epsilons and return a best-effort value.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// Trailing dimensions are wrong, batch shapes disagree, or an index or
    /// axis does not fit the batch shape.
    #[error("shape mismatch in {operation}: {detail}")]
    ShapeMismatch {
        operation: &'static str,
        detail: String,
    },
}

pub type GeometryResult<T> = Result<T, GeometryError>;

impl GeometryError {
    pub fn shape_mismatch(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            operation,
            detail: detail.into(),
        }
    }
}

impl From<ndarray::ShapeError> for GeometryError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::shape_mismatch("array layout", err.to_string())
    }
}
