//! LU factorization of the tridiagonal state operator.
//!
//! `A = L·U` with unit lower bidiagonal `L` (multipliers `l`) and upper
//! bidiagonal `U` (pivots `a` on the diagonal, the constant super-diagonal
//! above it). Built once per stencil and read-only afterwards, so a single
//! factorization can be shared by concurrent solves.

use super::stencil::Stencil;
use crate::error::{OptCtlError, OptCtlResult};

/// Smallest pivot magnitude accepted by the factorization.
pub const PIVOT_TOL: f64 = 1e-14;

/// Thomas-algorithm factorization of `A = tridiag(sub, diag, super)`.
#[derive(Debug, Clone)]
pub struct LuFactorization {
    /// Diagonal of `U` (length m)
    pivots: Vec<f64>,

    /// Sub-diagonal of `L` (length m-1)
    multipliers: Vec<f64>,

    /// Super-diagonal of `U`, equal to the stencil's super coefficient
    upper: f64,
}

impl LuFactorization {
    /// Factor the stencil's operator on `m` interior points.
    pub fn new(stencil: &Stencil, m: usize) -> OptCtlResult<Self> {
        if m < 3 {
            return Err(OptCtlError::InvalidGrid(format!(
                "need at least 3 spatial points, got {}",
                m
            )));
        }

        let mut pivots = Vec::with_capacity(m);
        let mut multipliers = Vec::with_capacity(m - 1);

        let a0 = stencil.diag;
        check_pivot(0, a0)?;
        pivots.push(a0);

        for i in 1..m {
            let l = stencil.sub / pivots[i - 1];
            let a = stencil.diag - l * stencil.sup;
            check_pivot(i, a)?;
            multipliers.push(l);
            pivots.push(a);
        }

        Ok(Self {
            pivots,
            multipliers,
            upper: stencil.sup,
        })
    }

    /// Number of interior points.
    #[inline]
    pub fn dim(&self) -> usize {
        self.pivots.len()
    }

    pub fn pivots(&self) -> &[f64] {
        &self.pivots
    }

    pub fn multipliers(&self) -> &[f64] {
        &self.multipliers
    }

    /// x ← A⁻¹ x
    pub fn solve(&self, x: &mut [f64]) {
        let m = self.dim();
        debug_assert_eq!(x.len(), m);

        // L y = x
        for i in 1..m {
            x[i] -= self.multipliers[i - 1] * x[i - 1];
        }

        // U x = y
        x[m - 1] /= self.pivots[m - 1];
        for i in (0..m - 1).rev() {
            x[i] = (x[i] - self.upper * x[i + 1]) / self.pivots[i];
        }
    }

    /// x ← A⁻ᵗ x
    pub fn solve_adjoint(&self, x: &mut [f64]) {
        let m = self.dim();
        debug_assert_eq!(x.len(), m);

        // Uᵗ z = x
        x[0] /= self.pivots[0];
        for i in 1..m {
            x[i] = (x[i] - self.upper * x[i - 1]) / self.pivots[i];
        }

        // Lᵗ x = z
        for i in (0..m - 1).rev() {
            x[i] -= self.multipliers[i] * x[i + 1];
        }
    }
}

fn check_pivot(index: usize, value: f64) -> OptCtlResult<()> {
    if value.is_finite() && value.abs() >= PIVOT_TOL {
        Ok(())
    } else {
        Err(OptCtlError::PivotUnderflow { index, value })
    }
}
