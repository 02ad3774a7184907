//! Engine-facing interface of the local kernel.
//!
//! A multilevel time-decomposition engine owns the time grid, the
//! scheduling and the data exchange. It only touches the problem through
//! [`TriApp`]: vector callbacks (init, sum, norm, pack/unpack), solution
//! access, and the local residual and solve at one time point.

pub mod app;

use crate::error::OptCtlResult;
use crate::kkt::{Neighbors, TimePoint};

pub use app::AdvecDiffApp;

/// Position of one local call in the engine's time hierarchy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriContext {
    /// Time of the point being relaxed
    pub t: f64,

    /// Time of the left neighbor
    pub t_prev: f64,

    /// Time of the right neighbor
    pub t_next: f64,

    /// Index of the point on its level
    pub index: usize,

    /// Grid level (0 is the fine grid)
    pub level: usize,

    /// Drop all source terms (residual of the linear part only)
    pub homogeneous: bool,
}

impl TriContext {
    /// Local step size: the right interval, or the left one at the last point.
    #[inline]
    pub fn dt(&self) -> f64 {
        if self.t < self.t_next {
            self.t_next - self.t
        } else {
            self.t - self.t_prev
        }
    }
}

/// Result of one local solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOutcome {
    /// Requested refinement factor of the time grid (1 = none)
    pub rfactor: usize,

    /// Max-norm of the local rows after the update
    pub residual_inf: f64,
}

/// Callbacks the time-decomposition engine needs from a problem.
///
/// `residual` and `solve` take `&self` and may run concurrently on distinct
/// time points.
pub trait TriApp: Send + Sync {
    /// Initial guess at a time index.
    fn init(&self, index: usize) -> TimePoint;

    /// y ← a x + b y
    fn sum(&self, a: f64, x: &TimePoint, b: f64, y: &mut TimePoint);

    /// Norm used by the engine's convergence test.
    fn spatial_norm(&self, x: &TimePoint) -> f64;

    /// Receive the final value at a time index.
    fn access(&mut self, index: usize, x: &TimePoint);

    /// Local residual of `point` written to `r`.
    fn residual(
        &self,
        ctx: &TriContext,
        nbrs: &Neighbors<'_>,
        point: &TimePoint,
        r: &mut TimePoint,
    ) -> OptCtlResult<()>;

    /// Relax `u` in place with neighbors fixed.
    fn solve(
        &self,
        ctx: &TriContext,
        nbrs: &Neighbors<'_>,
        u: &mut TimePoint,
    ) -> OptCtlResult<SolveOutcome>;

    /// Reals needed to transport one time point.
    fn buf_size(&self) -> usize;

    /// Serialize `x` into `buf`, returning the number of reals written.
    fn buf_pack(&self, x: &TimePoint, buf: &mut [f64]) -> OptCtlResult<usize>;

    /// Inverse of [`TriApp::buf_pack`].
    fn buf_unpack(&self, buf: &[f64]) -> OptCtlResult<TimePoint>;
}
