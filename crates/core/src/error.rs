use thiserror::Error;

/// Failure kinds shared by every geometry stage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Empty or malformed cloud, e.g. `width * height != len`.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Too few points, or collinear/coplanar points where a full-rank
    /// covariance is required.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Robust fitting found no candidate with a non-empty inlier set.
    #[error("no model found")]
    NoModelFound,

    /// A local neighborhood is too small for the requested estimator.
    #[error("insufficient neighbors: found {found}, need at least {required}")]
    InsufficientNeighbors { found: usize, required: usize },
}
