//! Exact local block solve.
//!
//! The Jacobian of the local rows with respect to `(u, v, w)` is
//!
//! ```text
//! [ hI   0    Aᵗ  ]
//! [ 0    αhI  -ΔtI ]
//! [ A    -ΔtI  0   ]
//! ```
//!
//! Eliminating `δu` and `δv` leaves the Schur system
//!
//! ```text
//! (A Aᵗ + Δt²/α I) δw = A r1 - (Δt/α) r2 - h r3
//! ```
//!
//! after which `δv = (r2 + Δt δw) / (α h)` and `δu = (r1 - Aᵗ δw) / h`.
//! The `1/h` back-substitution amplifies round-off, so the elimination is
//! repeated `refine_iters` times on the fresh residual.

use super::block::{Neighbors, TimePoint};
use super::residual::{evaluate_rows, shape_aux};
use super::{KktOperators, LocalOperators};
use crate::error::OptCtlResult;
use crate::linalg::ops::{axpy, inf_norm};
use crate::tri::{SolveOutcome, TriContext};

impl KktOperators {
    /// Solve the local KKT block of `point` in place.
    ///
    /// Neighbors are held fixed. For the four-block variant the closure row
    /// after the update is stored in `point.aux`.
    pub fn solve(
        &self,
        ctx: &TriContext,
        nbrs: &Neighbors<'_>,
        point: &mut TimePoint,
    ) -> OptCtlResult<SolveOutcome> {
        let m = self.grid.m;
        self.check_point(point)?;
        nbrs.check_dim(m)?;

        let ops = self.operators_for(ctx)?;
        let source = self.source(ctx);
        let mut r = TimePoint::zeros(m, self.disc.arity);
        let mut scratch = vec![0.0; m];

        for _ in 0..=self.refine_iters {
            evaluate_rows(&ops.stencil, source, nbrs, point, &mut r);
            eliminate(&ops, &r, point, &mut scratch);
        }

        evaluate_rows(&ops.stencil, source, nbrs, point, &mut r);
        let residual_inf = inf_norm(&r.u).max(inf_norm(&r.v)).max(inf_norm(&r.w));

        shape_aux(point, self.disc.arity, m);
        if let (Some(aux), Some(r4)) = (point.aux.as_mut(), r.aux.as_ref()) {
            aux.copy_from_slice(r4);
        }

        Ok(SolveOutcome {
            rfactor: 1,
            residual_inf,
        })
    }
}

/// One Newton step with the exact local Jacobian: `point -= J⁻¹ r`.
fn eliminate(ops: &LocalOperators, r: &TimePoint, point: &mut TimePoint, scratch: &mut [f64]) {
    let stencil = &ops.stencil;
    let h = stencil.cell();
    let alpha = stencil.alpha();
    let dt = stencil.dt();
    let m = point.m();

    // δw = S⁻¹ (A r1 - (Δt/α) r2 - h r3)
    let mut dw = vec![0.0; m];
    stencil.mul_into(&r.u, &mut dw);
    axpy(-dt / alpha, &r.v, &mut dw);
    axpy(-h, &r.w, &mut dw);
    ops.schur.solve(&mut dw);

    // δv = V⁻¹ (r2 + Dᵗ δw)
    for k in 0..m {
        point.v[k] -= (r.v[k] + dt * dw[k]) / (alpha * h);
    }

    // δu = U⁻¹ (r1 - Aᵗ δw)
    stencil.mul_adjoint_into(&dw, scratch);
    for k in 0..m {
        point.u[k] -= (r.u[k] - scratch[k]) / h;
    }

    axpy(-1.0, &dw, &mut point.w);
}
