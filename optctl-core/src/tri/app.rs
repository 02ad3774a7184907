//! Advection-diffusion control problem as a [`TriApp`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{SolveOutcome, TriApp, TriContext};
use crate::error::OptCtlResult;
use crate::kkt::buffer::{buffer_len, pack, unpack};
use crate::kkt::{KktOperators, Neighbors, TimePoint};
use crate::linalg::ops::{axpy, scale};
use crate::problem::{BlockArity, ProblemData, SolverSettings};

/// Local KKT kernel plus the solution store filled by [`TriApp::access`].
#[derive(Debug, Clone)]
pub struct AdvecDiffApp {
    ops: KktOperators,
    seed: u64,
    solution: Vec<Option<TimePoint>>,
}

impl AdvecDiffApp {
    pub fn new(prob: &ProblemData, settings: &SolverSettings) -> OptCtlResult<Self> {
        Ok(Self {
            ops: KktOperators::new(prob, settings.refine_iters)?,
            seed: settings.seed,
            solution: vec![None; prob.n()],
        })
    }

    /// Shared local operators.
    pub fn operators(&self) -> &KktOperators {
        &self.ops
    }

    /// Values recorded by `access`, one slot per time index.
    pub fn solution(&self) -> &[Option<TimePoint>] {
        &self.solution
    }

    fn arity(&self) -> BlockArity {
        self.ops.discretization().arity
    }
}

impl TriApp for AdvecDiffApp {
    fn init(&self, index: usize) -> TimePoint {
        let m = self.ops.grid().m;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(index as u64));
        let mut draw = || (0..m).map(|_| rng.gen::<f64>()).collect::<Vec<_>>();

        let u = draw();
        let v = draw();
        let w = draw();
        let mut point = TimePoint::from_fields(u, v, w);
        if self.arity() == BlockArity::Four {
            point.aux = Some(vec![0.0; m]);
        }
        point
    }

    fn sum(&self, a: f64, x: &TimePoint, b: f64, y: &mut TimePoint) {
        for (xs, ys) in [(&x.u, &mut y.u), (&x.v, &mut y.v), (&x.w, &mut y.w)] {
            scale(b, ys);
            axpy(a, xs, ys);
        }
    }

    fn spatial_norm(&self, x: &TimePoint) -> f64 {
        x.field_sum_sq().sqrt()
    }

    fn access(&mut self, index: usize, x: &TimePoint) {
        if index >= self.solution.len() {
            self.solution.resize(index + 1, None);
        }
        self.solution[index] = Some(TimePoint::from_fields(x.u.clone(), x.v.clone(), x.w.clone()));
    }

    fn residual(
        &self,
        ctx: &TriContext,
        nbrs: &Neighbors<'_>,
        point: &TimePoint,
        r: &mut TimePoint,
    ) -> OptCtlResult<()> {
        self.ops.residual(ctx, nbrs, point, r)
    }

    fn solve(
        &self,
        ctx: &TriContext,
        nbrs: &Neighbors<'_>,
        u: &mut TimePoint,
    ) -> OptCtlResult<SolveOutcome> {
        self.ops.solve(ctx, nbrs, u)
    }

    fn buf_size(&self) -> usize {
        buffer_len(self.ops.grid().m, self.arity())
    }

    fn buf_pack(&self, x: &TimePoint, buf: &mut [f64]) -> OptCtlResult<usize> {
        x.check_dim(self.ops.grid().m)?;
        pack(x, self.arity(), buf)
    }

    fn buf_unpack(&self, buf: &[f64]) -> OptCtlResult<TimePoint> {
        unpack(buf, self.ops.grid().m, self.arity())
    }
}
