//! Problem data structures and validation.
//!
//! This module defines the discretized optimal-control problem, the
//! discretization variant, solver settings and result types.

use std::fmt;

use crate::error::{OptCtlError, OptCtlResult};

/// Uniform time-space grid and PDE/objective coefficients.
///
/// The state lives on `m` interior points of `[0, 1]`; the two Dirichlet
/// boundary values are implicitly zero and never stored.
///
/// ```text
/// min  1/2 ∫∫ (u - U0)^2 + α v^2  dx dt
/// s.t. u_t + u_x - ν u_xx = v
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridParams {
    /// Number of interior spatial points (M)
    pub m: usize,

    /// Number of time steps (N)
    pub n: usize,

    /// Time-step size Δt
    pub dt: f64,

    /// Space-step size Δx
    pub dx: f64,

    /// Diffusion coefficient ν
    pub nu: f64,

    /// Control-cost weight α
    pub alpha: f64,
}

impl GridParams {
    /// Grid on the unit time horizon: `Δx = 1/(m+1)`, `Δt = 1/n`.
    pub fn new(m: usize, n: usize, nu: f64, alpha: f64) -> Self {
        let dx = 1.0 / (m as f64 + 1.0);
        let dt = if n > 0 { 1.0 / n as f64 } else { f64::NAN };
        Self { m, n, dt, dx, nu, alpha }
    }

    /// Grid with explicit step sizes.
    pub fn with_steps(m: usize, n: usize, dt: f64, dx: f64, nu: f64, alpha: f64) -> Self {
        Self { m, n, dt, dx, nu, alpha }
    }

    /// Cell volume `Δx·Δt`, the diagonal of the state mass matrix.
    #[inline]
    pub fn cell(&self) -> f64 {
        self.dx * self.dt
    }

    /// Validate grid dimensions and coefficients.
    ///
    /// `ν` is allowed to be non-positive: such problems are ill-posed but
    /// still well-defined, and the global driver reports them as diverged.
    pub fn validate(&self) -> OptCtlResult<()> {
        if self.m < 3 {
            return Err(OptCtlError::InvalidGrid(format!(
                "need at least 3 spatial points, got {}",
                self.m
            )));
        }
        if self.n == 0 {
            return Err(OptCtlError::InvalidGrid("need at least 1 time step".to_string()));
        }
        check_step("dt", self.dt)?;
        check_step("dx", self.dx)?;
        if !self.nu.is_finite() {
            return Err(OptCtlError::InvalidGrid(format!("nu must be finite, got {}", self.nu)));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(OptCtlError::InvalidGrid(format!(
                "alpha must be positive, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

pub(crate) fn check_step(name: &str, value: f64) -> OptCtlResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(OptCtlError::InvalidGrid(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

/// Discretization of the advection term `u_x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvectionScheme {
    /// Central difference: `(u[i+1] - u[i-1]) / 2Δx`
    Central,

    /// First-order upwind: `(u[i] - u[i-1]) / Δx`
    #[default]
    Upwind,
}

impl fmt::Display for AdvectionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvectionScheme::Central => write!(f, "central"),
            AdvectionScheme::Upwind => write!(f, "upwind"),
        }
    }
}

/// Number of field blocks carried per time point by the relaxation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockArity {
    /// State, control, adjoint
    Three,

    /// State, control, adjoint plus the closure-residual block
    #[default]
    Four,
}

impl BlockArity {
    /// Number of blocks of length `m` per time point.
    #[inline]
    pub fn blocks(self) -> usize {
        match self {
            BlockArity::Three => 3,
            BlockArity::Four => 4,
        }
    }
}

/// Discretization variant, resolved once when operators are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Discretization {
    /// Advection stencil
    pub scheme: AdvectionScheme,

    /// Local system size
    pub arity: BlockArity,
}

/// Optimal-control problem on a fixed grid.
#[derive(Debug, Clone)]
pub struct ProblemData {
    /// Grid and coefficients
    pub grid: GridParams,

    /// Tracking target U0 (length m), also the initial state
    pub target: Vec<f64>,

    /// Discretization variant
    pub discretization: Discretization,
}

impl ProblemData {
    /// Problem with the default step target (ones on the left half).
    pub fn new(grid: GridParams, discretization: Discretization) -> Self {
        Self {
            target: step_profile(grid.m),
            grid,
            discretization,
        }
    }

    /// Replace the tracking target.
    pub fn with_target(mut self, target: Vec<f64>) -> Self {
        self.target = target;
        self
    }

    /// Number of interior spatial points.
    #[inline]
    pub fn m(&self) -> usize {
        self.grid.m
    }

    /// Number of time steps.
    #[inline]
    pub fn n(&self) -> usize {
        self.grid.n
    }

    /// Validate the grid and the target length.
    pub fn validate(&self) -> OptCtlResult<()> {
        self.grid.validate()?;
        if self.target.len() != self.grid.m {
            return Err(OptCtlError::DimensionMismatch {
                expected: self.grid.m,
                actual: self.target.len(),
            });
        }
        if self.target.iter().any(|x| !x.is_finite()) {
            return Err(OptCtlError::InvalidGrid("target has non-finite entries".to_string()));
        }
        Ok(())
    }
}

/// Step profile: `1` on the first `m/2` points, `0` elsewhere.
pub fn step_profile(m: usize) -> Vec<f64> {
    (0..m).map(|i| if i < m / 2 { 1.0 } else { 0.0 }).collect()
}

/// Solver settings and parameters.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Maximum number of global block Gauss-Seidel iterations
    pub max_iter: usize,

    /// Absolute tolerance on the global residual norm
    pub tol: f64,

    /// Log per-iteration progress
    pub verbose: bool,

    /// Seed for the random initial guess
    pub seed: u64,

    /// Extra exact-elimination passes in the local kernel
    pub refine_iters: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let max_iter = std::env::var("OPTCTL_MAX_ITER")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(300);
        let tol = std::env::var("OPTCTL_TOL")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(1e-6);
        // One refinement pass removes the 1/(Δx·Δt) cancellation error of
        // the state back-substitution
        let refine_iters = std::env::var("OPTCTL_REFINE_ITERS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(1);

        Self {
            max_iter,
            tol,
            verbose: std::env::var("OPTCTL_VERBOSE")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(false),
            seed: 1,
            refine_iters,
        }
    }
}

/// Outcome of the global iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Residual norm fell below the tolerance
    Converged,

    /// Iteration cap reached with a finite residual
    MaxIters,

    /// Residual norm became NaN or infinite
    Diverged,
}

impl SolveStatus {
    /// Whether the iteration met its tolerance.
    pub fn is_converged(self) -> bool {
        matches!(self, SolveStatus::Converged)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Converged => write!(f, "Converged"),
            SolveStatus::MaxIters => write!(f, "MaxIters"),
            SolveStatus::Diverged => write!(f, "Diverged"),
        }
    }
}

/// Solution histories with diagnostics.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Solution status
    pub status: SolveStatus,

    /// State history, `n` blocks of length `m`
    pub u: Vec<Vec<f64>>,

    /// Control history
    pub v: Vec<Vec<f64>>,

    /// Adjoint history
    pub w: Vec<Vec<f64>>,

    /// Iteration diagnostics
    pub info: SolveInfo,
}

/// Iteration diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SolveInfo {
    /// Number of completed iterations
    pub iters: usize,

    /// Last global residual norm
    pub residual_norm: f64,

    /// Residual norm after every iteration
    pub residual_history: Vec<f64>,

    /// Wall-clock solve time (milliseconds)
    pub solve_time_ms: u64,
}
