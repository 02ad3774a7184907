//! Error types for the KKT solvers.

use thiserror::Error;

/// Errors that can occur while building operators or exchanging time points.
///
/// Numerical divergence of the global iteration is not an error; it is
/// reported through [`SolveStatus::Diverged`](crate::SolveStatus::Diverged).
#[derive(Error, Debug)]
pub enum OptCtlError {
    /// Grid or discretization parameters are unusable
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Factorization produced a vanishing or non-finite pivot
    #[error("Pivot underflow at row {index}: {value:e}")]
    PivotUnderflow {
        /// Row of the failing pivot
        index: usize,
        /// Pivot value
        value: f64,
    },

    /// A field block does not have the grid's spatial length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Transport buffer is too short for one time point
    #[error("Buffer too small: need {expected} reals, got {actual}")]
    BufferSize {
        /// Required number of reals
        expected: usize,
        /// Provided number of reals
        actual: usize,
    },

    /// Writing a history failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for KKT operations.
pub type OptCtlResult<T> = Result<T, OptCtlError>;
