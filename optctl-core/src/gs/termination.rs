//! Termination criteria for the block Gauss-Seidel iteration.
//!
//! Checks, in order:
//! - Divergence: NaN or infinite residual norm
//! - Convergence: residual norm at or below the tolerance
//! - Iteration cap

use crate::problem::{SolveStatus, SolverSettings};

/// Termination criteria.
#[derive(Debug, Clone)]
pub struct TerminationCriteria {
    /// Absolute tolerance on the global residual norm
    pub tol: f64,

    /// Maximum iterations
    pub max_iter: usize,
}

impl Default for TerminationCriteria {
    fn default() -> Self {
        Self {
            tol: 1e-6,
            max_iter: 300,
        }
    }
}

impl From<&SolverSettings> for TerminationCriteria {
    fn from(settings: &SolverSettings) -> Self {
        Self {
            tol: settings.tol,
            max_iter: settings.max_iter,
        }
    }
}

/// Check termination conditions after `iter` completed iterations.
///
/// Returns `Some(status)` if the iteration should stop, `None` otherwise.
pub fn check_termination(
    residual_norm: f64,
    iter: usize,
    criteria: &TerminationCriteria,
) -> Option<SolveStatus> {
    if !residual_norm.is_finite() {
        return Some(SolveStatus::Diverged);
    }

    if residual_norm <= criteria.tol {
        return Some(SolveStatus::Converged);
    }

    if iter >= criteria.max_iter {
        return Some(SolveStatus::MaxIters);
    }

    None
}
