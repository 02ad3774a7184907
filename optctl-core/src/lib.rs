//! optctl: KKT block solvers for advection-diffusion optimal control
//!
//! This library solves the discretized first-order optimality (KKT) system
//! of the linear-quadratic control problem
//!
//! ```text
//! min  1/2 ∫∫ (u - U0)^2 + α v^2  dx dt
//! s.t. u_t + u_x - ν u_xx = v,   u(0,t) = u(1,t) = 0,   u(x,0) = U0(x)
//! ```
//!
//! on a uniform time-space grid with backward-Euler time stepping and a
//! central or upwind advection stencil. The state `u`, control `v` and
//! adjoint `w` are coupled at every time point.
//!
//! Two solvers share the same stencil operators:
//!
//! - **Local relaxation kernel** ([`kkt`], [`tri`]): residual and exact
//!   block solve at one time point with fixed neighbors, exposed to a
//!   multilevel time-decomposition engine through [`tri::TriApp`].
//! - **Global block Gauss-Seidel** ([`gs`]): forward state sweep, backward
//!   adjoint sweep and control update over the whole history.
//!
//! # Example
//!
//! ```no_run
//! use optctl_core::{solve, AdvectionScheme, Discretization, GridParams, ProblemData, SolverSettings};
//!
//! let grid = GridParams::new(12, 4096, 1.5, 0.005);
//! let disc = Discretization { scheme: AdvectionScheme::Central, ..Default::default() };
//! let prob = ProblemData::new(grid, disc);
//!
//! let result = solve(&prob, &SolverSettings::default())?;
//! println!("Status: {} after {} iterations", result.status, result.info.iters);
//! # Ok::<(), optctl_core::OptCtlError>(())
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod problem;
pub mod linalg;
pub mod kkt;
pub mod tri;
pub mod gs;
pub mod output;

// Re-export main types
pub use error::{OptCtlError, OptCtlResult};
pub use problem::{
    AdvectionScheme, BlockArity, Discretization, GridParams, ProblemData,
    SolverSettings, SolveResult, SolveStatus, SolveInfo,
};
pub use kkt::{KktOperators, Neighbors, TimePoint};
pub use tri::{AdvecDiffApp, SolveOutcome, TriApp, TriContext};

/// Main solve entry point.
///
/// Runs the global block Gauss-Seidel driver on the whole time history.
pub fn solve(problem: &ProblemData, settings: &SolverSettings) -> OptCtlResult<SolveResult> {
    gs::solve_block_gs(problem, settings)
}
