//! Constant-coefficient stencil of the implicit advection-diffusion step.
//!
//! One backward-Euler step of `u_t + u_x - ν u_xx = v` on the interior grid
//! gives the tridiagonal state operator
//!
//! ```text
//! A = tridiag(sub, diag, super)
//! ```
//!
//! with `b = ν Δt / Δx²` and
//!
//! | scheme  | g          | sub    | diag         | super  |
//! |---------|------------|--------|--------------|--------|
//! | central | Δt / (2Δx) | -g - b | 1 + 2b       | g - b  |
//! | upwind  | Δt / Δx    | -g - b | 1 + g + 2b   | -b     |
//!
//! Every consumer derives the coefficients through [`Stencil::new`], so the
//! operator, its factorization and the Schur complement always agree.
//!
//! The diagonal scalings of the KKT system live here as well: the state
//! mass `U = Δx Δt I`, the control mass `V = α Δx Δt I` and the coupling
//! `D = Δt I`.

use super::sparse::{self, SparseCsc};
use crate::error::{OptCtlError, OptCtlResult};
use crate::problem::{check_step, AdvectionScheme, GridParams};

/// Tridiagonal stencil plus the diagonal KKT scalings for one `Δt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    /// Sub-diagonal coefficient (couples `u[i-1]`)
    pub sub: f64,

    /// Diagonal coefficient
    pub diag: f64,

    /// Super-diagonal coefficient (couples `u[i+1]`)
    pub sup: f64,

    dt: f64,
    dx: f64,
    alpha: f64,
}

impl Stencil {
    /// Derive the stencil for the given step sizes.
    pub fn new(dt: f64, dx: f64, nu: f64, alpha: f64, scheme: AdvectionScheme) -> OptCtlResult<Self> {
        check_step("dt", dt)?;
        check_step("dx", dx)?;
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(OptCtlError::InvalidGrid(format!("alpha must be positive, got {}", alpha)));
        }

        let b = nu * dt / (dx * dx);
        let (sub, diag, sup) = match scheme {
            AdvectionScheme::Central => {
                let g = dt / (2.0 * dx);
                (-g - b, 1.0 + 2.0 * b, g - b)
            }
            AdvectionScheme::Upwind => {
                let g = dt / dx;
                (-g - b, 1.0 + g + 2.0 * b, -b)
            }
        };

        Ok(Self { sub, diag, sup, dt, dx, alpha })
    }

    /// Stencil for the grid's own `Δt`.
    pub fn for_grid(grid: &GridParams, scheme: AdvectionScheme) -> OptCtlResult<Self> {
        Self::new(grid.dt, grid.dx, grid.nu, grid.alpha, scheme)
    }

    /// Stencil for the grid's `Δx, ν, α` with a different `Δt`.
    pub fn for_step(grid: &GridParams, dt: f64, scheme: AdvectionScheme) -> OptCtlResult<Self> {
        Self::new(dt, grid.dx, grid.nu, grid.alpha, scheme)
    }

    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    #[inline]
    pub fn dx(&self) -> f64 {
        self.dx
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// `Δx·Δt`
    #[inline]
    pub fn cell(&self) -> f64 {
        self.dx * self.dt
    }

    /// out = A x
    pub fn apply(&self, x: &[f64], out: &mut [f64]) -> OptCtlResult<()> {
        check_len(x, out)?;
        self.mul_into(x, out);
        Ok(())
    }

    /// out = Aᵗ x
    pub fn apply_adjoint(&self, x: &[f64], out: &mut [f64]) -> OptCtlResult<()> {
        check_len(x, out)?;
        self.mul_adjoint_into(x, out);
        Ok(())
    }

    /// out = A x, lengths already checked by the caller
    pub(crate) fn mul_into(&self, x: &[f64], out: &mut [f64]) {
        let m = x.len();
        debug_assert_eq!(out.len(), m);
        for i in 0..m {
            let mut acc = self.diag * x[i];
            if i > 0 {
                acc += self.sub * x[i - 1];
            }
            if i + 1 < m {
                acc += self.sup * x[i + 1];
            }
            out[i] = acc;
        }
    }

    /// out = Aᵗ x, lengths already checked by the caller
    pub(crate) fn mul_adjoint_into(&self, x: &[f64], out: &mut [f64]) {
        let m = x.len();
        debug_assert_eq!(out.len(), m);
        for i in 0..m {
            let mut acc = self.diag * x[i];
            if i > 0 {
                acc += self.sup * x[i - 1];
            }
            if i + 1 < m {
                acc += self.sub * x[i + 1];
            }
            out[i] = acc;
        }
    }

    /// x ← A x
    pub fn apply_in_place(&self, x: &mut [f64]) {
        let m = x.len();
        let mut prev = 0.0;
        for i in 0..m {
            let cur = x[i];
            let next = if i + 1 < m { x[i + 1] } else { 0.0 };
            x[i] = self.sub * prev + self.diag * cur + self.sup * next;
            prev = cur;
        }
    }

    /// x ← Aᵗ x
    pub fn apply_adjoint_in_place(&self, x: &mut [f64]) {
        let m = x.len();
        let mut prev = 0.0;
        for i in 0..m {
            let cur = x[i];
            let next = if i + 1 < m { x[i + 1] } else { 0.0 };
            x[i] = self.sup * prev + self.diag * cur + self.sub * next;
            prev = cur;
        }
    }

    /// x ← U x, `U = Δx Δt I`
    pub fn apply_state_mass(&self, x: &mut [f64]) {
        let h = self.cell();
        x.iter_mut().for_each(|xi| *xi *= h);
    }

    /// x ← U⁻¹ x
    pub fn apply_state_mass_inv(&self, x: &mut [f64]) {
        let h = self.cell();
        x.iter_mut().for_each(|xi| *xi /= h);
    }

    /// x ← V x, `V = α Δx Δt I`
    pub fn apply_control_mass(&self, x: &mut [f64]) {
        let s = self.alpha * self.cell();
        x.iter_mut().for_each(|xi| *xi *= s);
    }

    /// x ← V⁻¹ x
    pub fn apply_control_mass_inv(&self, x: &mut [f64]) {
        let s = self.alpha * self.cell();
        x.iter_mut().for_each(|xi| *xi /= s);
    }

    /// x ← D x
    ///
    /// Known approximation: the control-to-state coupling is a plain `Δt`
    /// scaling rather than a derived discrete operator. The documented
    /// convergence behavior of the block iteration depends on it.
    pub fn apply_coupling(&self, x: &mut [f64]) {
        let dt = self.dt;
        x.iter_mut().for_each(|xi| *xi *= dt);
    }

    /// x ← Dᵗ x (same `Δt` scaling, see [`Stencil::apply_coupling`])
    pub fn apply_coupling_adjoint(&self, x: &mut [f64]) {
        self.apply_coupling(x);
    }

    /// Assemble `A` for `m` interior points.
    pub fn to_csc(&self, m: usize) -> SparseCsc {
        let mut triplets = Vec::with_capacity(3 * m);
        for i in 0..m {
            if i > 0 {
                triplets.push((i, i - 1, self.sub));
            }
            triplets.push((i, i, self.diag));
            if i + 1 < m {
                triplets.push((i, i + 1, self.sup));
            }
        }
        sparse::from_triplets(m, m, triplets)
    }
}

fn check_len(x: &[f64], out: &[f64]) -> OptCtlResult<()> {
    if out.len() != x.len() {
        return Err(OptCtlError::DimensionMismatch {
            expected: x.len(),
            actual: out.len(),
        });
    }
    Ok(())
}
