//! Banded LDLᵀ factorization of the local Schur complement.
//!
//! Eliminating the state and control increments from the local KKT block
//! leaves one system for the adjoint increment:
//!
//! ```text
//! S = A·Aᵗ + c·I,   c = Δt² / α
//! ```
//!
//! `S` is symmetric positive definite and pentadiagonal, so the factorization
//! `S = L·D·Lᵗ` needs no pivoting and `L` has two sub-diagonals:
//!
//! - `l1[j] = L[j+1, j]`
//! - `l2[j] = L[j+2, j]`
//!
//! Both the factorization and the solve are O(m).

use super::stencil::Stencil;
use super::tridiag::PIVOT_TOL;
use crate::error::{OptCtlError, OptCtlResult};

/// LDLᵀ factors of `S = A·Aᵗ + (Δt²/α)·I`.
#[derive(Debug, Clone)]
pub struct SchurFactorization {
    /// Diagonal of D (length m)
    d: Vec<f64>,

    /// First sub-diagonal of L (length m-1)
    l1: Vec<f64>,

    /// Second sub-diagonal of L (length m-2)
    l2: Vec<f64>,

    /// Operator the factors were built from, kept for [`SchurFactorization::apply`]
    stencil: Stencil,

    /// Diagonal shift Δt²/α
    shift: f64,
}

impl SchurFactorization {
    /// Factor `S` for the stencil on `m` interior points.
    pub fn new(stencil: &Stencil, m: usize) -> OptCtlResult<Self> {
        if m < 3 {
            return Err(OptCtlError::InvalidGrid(format!(
                "need at least 3 spatial points, got {}",
                m
            )));
        }

        let (s, dg, p) = (stencil.sub, stencil.diag, stencil.sup);
        let shift = stencil.dt() * stencil.dt() / stencil.alpha();

        // Constant bands of A·Aᵗ away from the boundary rows
        let off1 = dg * (s + p);
        let off2 = p * s;

        let mut d = Vec::with_capacity(m);
        let mut l1 = Vec::with_capacity(m - 1);
        let mut l2 = Vec::with_capacity(m - 2);

        for j in 0..m {
            let mut diag = dg * dg + shift;
            if j > 0 {
                diag += s * s;
            }
            if j + 1 < m {
                diag += p * p;
            }

            let mut dj = diag;
            if j >= 1 {
                dj -= l1[j - 1] * l1[j - 1] * d[j - 1];
            }
            if j >= 2 {
                dj -= l2[j - 2] * l2[j - 2] * d[j - 2];
            }
            if !(dj.is_finite() && dj >= PIVOT_TOL) {
                return Err(OptCtlError::PivotUnderflow { index: j, value: dj });
            }
            d.push(dj);

            if j + 1 < m {
                let mut v = off1;
                if j >= 1 {
                    v -= l2[j - 1] * l1[j - 1] * d[j - 1];
                }
                l1.push(v / dj);
            }
            if j + 2 < m {
                l2.push(off2 / dj);
            }
        }

        Ok(Self {
            d,
            l1,
            l2,
            stencil: *stencil,
            shift,
        })
    }

    /// Number of interior points.
    #[inline]
    pub fn dim(&self) -> usize {
        self.d.len()
    }

    /// Diagonal shift `Δt²/α`.
    #[inline]
    pub fn shift(&self) -> f64 {
        self.shift
    }

    /// x ← S⁻¹ x
    pub fn solve(&self, x: &mut [f64]) {
        let m = self.dim();
        debug_assert_eq!(x.len(), m);

        for i in 1..m {
            x[i] -= self.l1[i - 1] * x[i - 1];
            if i >= 2 {
                x[i] -= self.l2[i - 2] * x[i - 2];
            }
        }

        for (xi, di) in x.iter_mut().zip(self.d.iter()) {
            *xi /= di;
        }

        for i in (0..m - 1).rev() {
            x[i] -= self.l1[i] * x[i + 1];
            if i + 2 < m {
                x[i] -= self.l2[i] * x[i + 2];
            }
        }
    }

    /// out = S x, matrix-free
    pub fn apply(&self, x: &[f64], out: &mut [f64]) {
        let mut tmp = vec![0.0; x.len()];
        self.stencil.mul_adjoint_into(x, &mut tmp);
        self.stencil.mul_into(&tmp, out);
        for (oi, &xi) in out.iter_mut().zip(x.iter()) {
            *oi += self.shift * xi;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::AdvectionScheme;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn dense_a(stencil: &Stencil, m: usize) -> DMatrix<f64> {
        DMatrix::from_fn(m, m, |i, j| {
            if i == j {
                stencil.diag
            } else if j + 1 == i {
                stencil.sub
            } else if i + 1 == j {
                stencil.sup
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_solve_inverts_apply() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for scheme in [AdvectionScheme::Central, AdvectionScheme::Upwind] {
            let stencil = Stencil::new(1.0 / 256.0, 1.0 / 9.0, 2.0, 0.005, scheme).unwrap();
            for m in [3, 4, 8, 20] {
                let schur = SchurFactorization::new(&stencil, m).unwrap();
                let x: Vec<f64> = (0..m).map(|_| rng.gen_range(-1.0..1.0)).collect();
                let mut y = vec![0.0; m];
                schur.apply(&x, &mut y);
                schur.solve(&mut y);
                for i in 0..m {
                    assert_relative_eq!(y[i], x[i], epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_matches_dense_solve() {
        let m = 8;
        let stencil = Stencil::new(1.0 / 64.0, 1.0 / 9.0, 0.7, 0.01, AdvectionScheme::Central).unwrap();
        let schur = SchurFactorization::new(&stencil, m).unwrap();

        let a = dense_a(&stencil, m);
        let s = &a * a.transpose() + DMatrix::identity(m, m) * schur.shift();
        let rhs: Vec<f64> = (0..m).map(|i| (i as f64 * 0.37).cos()).collect();

        let reference = s
            .cholesky()
            .expect("S is SPD")
            .solve(&DVector::from_column_slice(&rhs));

        let mut x = rhs.clone();
        schur.solve(&mut x);
        for i in 0..m {
            assert_relative_eq!(x[i], reference[i], epsilon = 1e-10, max_relative = 1e-10);
        }
    }

    #[test]
    fn test_shift() {
        let stencil = Stencil::new(0.01, 0.1, 1.0, 0.5, AdvectionScheme::Upwind).unwrap();
        let schur = SchurFactorization::new(&stencil, 5).unwrap();
        assert_relative_eq!(schur.shift(), 0.0002, epsilon = 1e-18);
        assert_eq!(schur.dim(), 5);
    }
}
