//! Local KKT kernel: block residual and exact block solve at one time point.
//!
//! The local system couples the three fields of a single time point, with
//! the state of the left neighbor and the adjoint of the right neighbor held
//! fixed. With `h = Δx Δt`:
//!
//! ```text
//! r1 = h (u - U0) + Aᵗ w - w_right        adjoint row
//! r2 = α h v - Δt w                       control row
//! r3 = A u - Δt v - u_left                state row (U0 without a left neighbor)
//! r4 = h (u_left - U0) + Aᵗ w_left - w    closure row, four-block variant only
//! ```
//!
//! The rows are linear in `(u, v, w)`, so one Newton step with the exact
//! Jacobian solves them; see [`relax`].

pub mod block;
pub mod buffer;
pub mod relax;
pub mod residual;

use std::borrow::Cow;

use crate::error::OptCtlResult;
use crate::linalg::schur::SchurFactorization;
use crate::linalg::stencil::Stencil;
use crate::problem::{Discretization, GridParams, ProblemData};
use crate::tri::TriContext;

pub use block::{Neighbors, TimePoint};

/// Relative tolerance for matching a context's `Δt` to the cached one.
const DT_MATCH_RTOL: f64 = 1e-12;

/// Operators for one `Δt`.
#[derive(Debug, Clone)]
pub struct LocalOperators {
    pub stencil: Stencil,
    pub schur: SchurFactorization,
}

impl LocalOperators {
    pub fn build(grid: &GridParams, dt: f64, disc: Discretization) -> OptCtlResult<Self> {
        let stencil = Stencil::for_step(grid, dt, disc.scheme)?;
        let schur = SchurFactorization::new(&stencil, grid.m)?;
        Ok(Self { stencil, schur })
    }
}

/// Shared, read-only state of the local kernel.
///
/// Holds the problem data and the operators for the fine-grid `Δt`. Calls
/// on other time grids build their operators on the fly.
#[derive(Debug, Clone)]
pub struct KktOperators {
    grid: GridParams,
    disc: Discretization,
    target: Vec<f64>,
    refine_iters: usize,
    fine: LocalOperators,
}

impl KktOperators {
    /// Validate the problem and factor the fine-grid operators.
    pub fn new(prob: &ProblemData, refine_iters: usize) -> OptCtlResult<Self> {
        prob.validate()?;
        let fine = LocalOperators::build(&prob.grid, prob.grid.dt, prob.discretization)?;

        Ok(Self {
            grid: prob.grid,
            disc: prob.discretization,
            target: prob.target.clone(),
            refine_iters,
            fine,
        })
    }

    #[inline]
    pub fn grid(&self) -> &GridParams {
        &self.grid
    }

    #[inline]
    pub fn discretization(&self) -> Discretization {
        self.disc
    }

    #[inline]
    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Fine-grid operators.
    #[inline]
    pub fn fine(&self) -> &LocalOperators {
        &self.fine
    }

    /// Operators for the context's time step.
    pub fn operators_for(&self, ctx: &TriContext) -> OptCtlResult<Cow<'_, LocalOperators>> {
        let dt = ctx.dt();
        let fine_dt = self.fine.stencil.dt();
        if dt_matches(dt, fine_dt) {
            return Ok(Cow::Borrowed(&self.fine));
        }

        log::debug!(
            "rebuilding local operators: index={} level={} dt={:e} (fine dt={:e})",
            ctx.index,
            ctx.level,
            dt,
            fine_dt
        );
        LocalOperators::build(&self.grid, dt, self.disc).map(Cow::Owned)
    }

    /// State operator for the context's time step.
    ///
    /// Cheaper than [`KktOperators::operators_for`] off the fine grid: no
    /// Schur factorization is built.
    pub fn stencil_for(&self, ctx: &TriContext) -> OptCtlResult<Stencil> {
        let dt = ctx.dt();
        let fine_dt = self.fine.stencil.dt();
        if dt_matches(dt, fine_dt) {
            return Ok(self.fine.stencil);
        }
        Stencil::for_step(&self.grid, dt, self.disc.scheme)
    }

    /// Check a time point's blocks against the grid.
    pub(crate) fn check_point(&self, point: &TimePoint) -> OptCtlResult<()> {
        point.check_dim(self.grid.m)
    }

    #[inline]
    pub fn refine_iters(&self) -> usize {
        self.refine_iters
    }
}

#[inline]
fn dt_matches(dt: f64, fine_dt: f64) -> bool {
    (dt - fine_dt).abs() <= DT_MATCH_RTOL * fine_dt
}
