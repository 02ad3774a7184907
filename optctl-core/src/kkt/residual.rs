//! Local block residual.

use super::block::{Neighbors, TimePoint};
use super::KktOperators;
use crate::error::OptCtlResult;
use crate::linalg::ops::axpy;
use crate::linalg::stencil::Stencil;
use crate::problem::BlockArity;
use crate::tri::TriContext;

impl KktOperators {
    /// Evaluate the local KKT rows of `point` into `out`.
    ///
    /// `out.u, out.v, out.w` receive the adjoint, control and state rows; for
    /// the four-block variant `out.aux` receives the closure row. In a
    /// homogeneous context every `U0` source term is dropped.
    pub fn residual(
        &self,
        ctx: &TriContext,
        nbrs: &Neighbors<'_>,
        point: &TimePoint,
        out: &mut TimePoint,
    ) -> OptCtlResult<()> {
        let m = self.grid.m;
        self.check_point(point)?;
        self.check_point(out)?;
        nbrs.check_dim(m)?;

        let stencil = self.stencil_for(ctx)?;
        shape_aux(out, self.disc.arity, m);
        evaluate_rows(&stencil, self.source(ctx), nbrs, point, out);
        Ok(())
    }

    /// `U0`, or `None` when source terms are dropped.
    pub(crate) fn source(&self, ctx: &TriContext) -> Option<&[f64]> {
        if ctx.homogeneous {
            None
        } else {
            Some(&self.target)
        }
    }
}

/// Make `out.aux` present exactly for the four-block variant.
pub(crate) fn shape_aux(out: &mut TimePoint, arity: BlockArity, m: usize) {
    match arity {
        BlockArity::Three => out.aux = None,
        BlockArity::Four => {
            if out.aux.is_none() {
                out.aux = Some(vec![0.0; m]);
            }
        }
    }
}

/// Write `r1, r2, r3` (and `r4` if `out.aux` is present) into `out`.
pub(crate) fn evaluate_rows(
    stencil: &Stencil,
    source: Option<&[f64]>,
    nbrs: &Neighbors<'_>,
    point: &TimePoint,
    out: &mut TimePoint,
) {
    let h = stencil.cell();
    let vh = stencil.alpha() * h;
    let dt = stencil.dt();

    // r1 = h (u - U0) + Aᵗ w - w_right
    stencil.mul_adjoint_into(&point.w, &mut out.u);
    axpy(h, &point.u, &mut out.u);
    if let Some(u0) = source {
        axpy(-h, u0, &mut out.u);
    }
    if let Some(right) = nbrs.right {
        axpy(-1.0, &right.w, &mut out.u);
    }

    // r2 = α h v - Δt w
    for k in 0..out.v.len() {
        out.v[k] = vh * point.v[k] - dt * point.w[k];
    }

    // r3 = A u - Δt v - (u_left | U0)
    stencil.mul_into(&point.u, &mut out.w);
    axpy(-dt, &point.v, &mut out.w);
    match (nbrs.left, source) {
        (Some(left), _) => axpy(-1.0, &left.u, &mut out.w),
        (None, Some(u0)) => axpy(-1.0, u0, &mut out.w),
        (None, None) => {}
    }

    // r4 = h (u_left - U0) + Aᵗ w_left - w
    if let Some(aux) = out.aux.as_mut() {
        match nbrs.left {
            Some(left) => {
                stencil.mul_adjoint_into(&left.w, aux);
                axpy(h, &left.u, aux);
                if let Some(u0) = source {
                    axpy(-h, u0, aux);
                }
                axpy(-1.0, &point.w, aux);
            }
            None => aux.fill(0.0),
        }
    }

    if let Some(f) = nbrs.forcing {
        axpy(-1.0, &f.u, &mut out.u);
        axpy(-1.0, &f.v, &mut out.v);
        axpy(-1.0, &f.w, &mut out.w);
        if let (Some(aux), Some(faux)) = (out.aux.as_mut(), f.aux.as_ref()) {
            axpy(-1.0, faux, aux);
        }
    }
}
