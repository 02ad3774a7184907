//! End-to-end tests for the local KKT kernel and the global driver.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use optctl_core::linalg::ops::inf_norm;
use optctl_core::linalg::sparse;
use optctl_core::linalg::stencil::Stencil;
use optctl_core::linalg::tridiag::LuFactorization;
use optctl_core::{
    solve, AdvecDiffApp, AdvectionScheme, BlockArity, Discretization, GridParams, KktOperators,
    Neighbors, ProblemData, SolveStatus, SolverSettings, TimePoint, TriApp, TriContext,
};

fn reference_problem(arity: BlockArity) -> ProblemData {
    // m = 8, n = 256: Δx = 1/9, Δt = 1/256
    let disc = Discretization {
        scheme: AdvectionScheme::Upwind,
        arity,
    };
    ProblemData::new(GridParams::new(8, 256, 2.0, 0.005), disc)
        .with_target(vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0])
}

fn fine_ctx(index: usize, n: usize, homogeneous: bool) -> TriContext {
    let dt = 1.0 / n as f64;
    TriContext {
        t: index as f64 * dt,
        t_prev: index.saturating_sub(1) as f64 * dt,
        t_next: (index + 1) as f64 * dt,
        index,
        level: 0,
        homogeneous,
    }
}

fn random_block(rng: &mut ChaCha8Rng, m: usize, scale: f64) -> Vec<f64> {
    (0..m).map(|_| scale * rng.gen_range(-1.0..1.0)).collect()
}

fn random_point(rng: &mut ChaCha8Rng, m: usize) -> TimePoint {
    TimePoint {
        u: random_block(rng, m, 1.0),
        v: random_block(rng, m, 1.0),
        w: random_block(rng, m, 1e-3),
        aux: Some(vec![0.0; m]),
    }
}

/// Neighbors whose data make `(u*, v*, w*)` the exact local solution,
/// including a vanishing closure row.
struct Consistent {
    left: TimePoint,
    right: TimePoint,
    exact: TimePoint,
}

fn consistent_neighbors(ops: &KktOperators, rng: &mut ChaCha8Rng) -> Consistent {
    let grid = ops.grid();
    let m = grid.m;
    let stencil = Stencil::for_grid(grid, ops.discretization().scheme).unwrap();
    let lu = LuFactorization::new(&stencil, m).unwrap();
    let h = grid.cell();
    let u0 = ops.target();

    let u = random_block(rng, m, 1.0);
    let w = random_block(rng, m, 1e-3);
    let v: Vec<f64> = w.iter().map(|wk| grid.dt * wk / (grid.alpha * h)).collect();

    // Adjoint row: w_right = h (u - U0) + Aᵗ w
    let mut w_right = vec![0.0; m];
    stencil.apply_adjoint(&w, &mut w_right).unwrap();
    for k in 0..m {
        w_right[k] += h * (u[k] - u0[k]);
    }

    // State row: u_left = A u - Δt v
    let mut u_left = vec![0.0; m];
    stencil.apply(&u, &mut u_left).unwrap();
    for k in 0..m {
        u_left[k] -= grid.dt * v[k];
    }

    // Closure row: w_left = A⁻ᵗ (w - h (u_left - U0))
    let mut w_left: Vec<f64> = (0..m).map(|k| w[k] - h * (u_left[k] - u0[k])).collect();
    lu.solve_adjoint(&mut w_left);

    Consistent {
        left: TimePoint::from_fields(u_left, random_block(rng, m, 1.0), w_left),
        right: TimePoint::from_fields(random_block(rng, m, 1.0), random_block(rng, m, 1.0), w_right),
        exact: TimePoint::from_fields(u, v, w),
    }
}

fn residual(ops: &KktOperators, ctx: &TriContext, nbrs: &Neighbors<'_>, p: &TimePoint) -> TimePoint {
    let mut r = TimePoint::zeros(p.m(), ops.discretization().arity);
    ops.residual(ctx, nbrs, p, &mut r).unwrap();
    r
}

fn assert_blocks_close(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_relative_eq!(x, y, epsilon = tol);
    }
}

#[test]
fn test_local_solve_is_exact_with_consistent_neighbors() {
    let prob = reference_problem(BlockArity::Four);
    let ops = KktOperators::new(&prob, 1).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let data = consistent_neighbors(&ops, &mut rng);

    let ctx = fine_ctx(17, 256, false);
    let nbrs = Neighbors::none().with_left(&data.left).with_right(&data.right);
    let mut point = random_point(&mut rng, 8);

    let outcome = ops.solve(&ctx, &nbrs, &mut point).unwrap();
    assert_eq!(outcome.rfactor, 1);
    assert!(outcome.residual_inf <= 1e-10, "residual {:e}", outcome.residual_inf);

    let r = residual(&ops, &ctx, &nbrs, &point);
    let r_inf = inf_norm(&r.u).max(inf_norm(&r.v)).max(inf_norm(&r.w));
    assert!(r_inf <= 1e-10, "re-evaluated residual {:e}", r_inf);

    // Closure row of consistent data vanishes
    let aux = point.aux.as_ref().unwrap();
    assert!(inf_norm(aux) <= 1e-10);

    assert_blocks_close(&point.u, &data.exact.u, 1e-8);
    assert_blocks_close(&point.v, &data.exact.v, 1e-8);
    assert_blocks_close(&point.w, &data.exact.w, 1e-10);
}

#[test]
fn test_increment_matches_dense_solve() {
    let prob = reference_problem(BlockArity::Three);
    let m = prob.m();
    let ops = KktOperators::new(&prob, 0).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let data = consistent_neighbors(&ops, &mut rng);

    let ctx = fine_ctx(3, 256, false);
    let nbrs = Neighbors::none().with_left(&data.left).with_right(&data.right);
    let mut point = random_point(&mut rng, m);
    point.aux = None;
    let before = point.clone();

    // Dense Newton step: x - J⁻¹ r(x)
    let r = residual(&ops, &ctx, &nbrs, &before);
    let jac = sparse::local_kkt(&ops.fine().stencil, m);
    let mut dense = DMatrix::<f64>::zeros(3 * m, 3 * m);
    for (val, (row, col)) in jac.iter() {
        dense[(row, col)] += *val;
    }
    let rhs = DVector::from_iterator(3 * m, r.u.iter().chain(&r.v).chain(&r.w).copied());
    let delta = dense.lu().solve(&rhs).expect("local KKT block is nonsingular");

    ops.solve(&ctx, &nbrs, &mut point).unwrap();

    for k in 0..m {
        assert_relative_eq!(point.u[k], before.u[k] - delta[k], epsilon = 1e-8, max_relative = 1e-8);
        assert_relative_eq!(
            point.v[k],
            before.v[k] - delta[m + k],
            epsilon = 1e-8,
            max_relative = 1e-8
        );
        assert_relative_eq!(
            point.w[k],
            before.w[k] - delta[2 * m + k],
            epsilon = 1e-12,
            max_relative = 1e-8
        );
    }
}

#[test]
fn test_absent_neighbors_are_boundary_conditions() {
    let prob = reference_problem(BlockArity::Four);
    let ops = KktOperators::new(&prob, 1).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let point = random_point(&mut rng, 8);
    let ctx = fine_ctx(0, 256, false);

    // Missing right neighbor: no adjoint inflow, same as a zero adjoint
    let zero = TimePoint::zeros(8, BlockArity::Four);
    let free = residual(&ops, &ctx, &Neighbors::none(), &point);
    let zero_right = residual(&ops, &ctx, &Neighbors::none().with_right(&zero), &point);
    assert_eq!(free.u, zero_right.u);

    // Missing left neighbor: the state row uses U0
    let mut initial = zero.clone();
    initial.u = ops.target().to_vec();
    let with_u0 = residual(&ops, &ctx, &Neighbors::none().with_left(&initial), &point);
    assert_eq!(free.w, with_u0.w);
    assert_eq!(free.v, with_u0.v);

    // Closure row is zero without a left neighbor
    assert_eq!(free.aux, Some(vec![0.0; 8]));
    assert!(with_u0.aux.as_ref().map(|a| inf_norm(a) > 0.0).unwrap_or(false));
}

#[test]
fn test_forcing_is_subtracted() {
    let prob = reference_problem(BlockArity::Four);
    let ops = KktOperators::new(&prob, 1).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(12);
    let point = random_point(&mut rng, 8);
    let left = random_point(&mut rng, 8);
    let right = random_point(&mut rng, 8);
    let mut forcing = random_point(&mut rng, 8);
    forcing.aux = Some(random_block(&mut rng, 8, 1.0));
    let ctx = fine_ctx(9, 256, false);

    let nbrs = Neighbors::none().with_left(&left).with_right(&right);
    let plain = residual(&ops, &ctx, &nbrs, &point);
    let forced = residual(&ops, &ctx, &nbrs.with_forcing(&forcing), &point);

    let f_aux = forcing.aux.as_ref().unwrap();
    let p_aux = plain.aux.as_ref().unwrap();
    let r_aux = forced.aux.as_ref().unwrap();
    for k in 0..8 {
        assert_relative_eq!(forced.u[k], plain.u[k] - forcing.u[k], epsilon = 1e-14);
        assert_relative_eq!(forced.v[k], plain.v[k] - forcing.v[k], epsilon = 1e-14);
        assert_relative_eq!(forced.w[k], plain.w[k] - forcing.w[k], epsilon = 1e-14);
        assert_relative_eq!(r_aux[k], p_aux[k] - f_aux[k], epsilon = 1e-14);
    }
}

#[test]
fn test_homogeneous_drops_source_terms() {
    let prob = reference_problem(BlockArity::Four);
    let ops = KktOperators::new(&prob, 1).unwrap();
    let h = ops.grid().cell();
    let u0 = ops.target().to_vec();
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    let point = random_point(&mut rng, 8);
    let left = random_point(&mut rng, 8);

    // Initial time: U0 enters the adjoint and state rows
    let full = residual(&ops, &fine_ctx(0, 256, false), &Neighbors::none(), &point);
    let lin = residual(&ops, &fine_ctx(0, 256, true), &Neighbors::none(), &point);
    for k in 0..8 {
        assert_relative_eq!(lin.u[k], full.u[k] + h * u0[k], epsilon = 1e-14);
        assert_eq!(lin.v[k], full.v[k]);
        assert_relative_eq!(lin.w[k], full.w[k] + u0[k], epsilon = 1e-14);
    }

    // Interior: U0 enters the adjoint and closure rows only
    let nbrs = Neighbors::none().with_left(&left);
    let full = residual(&ops, &fine_ctx(4, 256, false), &nbrs, &point);
    let lin = residual(&ops, &fine_ctx(4, 256, true), &nbrs, &point);
    let (fa, la) = (full.aux.as_ref().unwrap(), lin.aux.as_ref().unwrap());
    for k in 0..8 {
        assert_relative_eq!(lin.u[k], full.u[k] + h * u0[k], epsilon = 1e-14);
        assert_eq!(lin.w[k], full.w[k]);
        assert_relative_eq!(la[k], fa[k] + h * u0[k], epsilon = 1e-14);
    }

    // The homogeneous residual is linear in the point and its neighbors
    let scaled = |p: &TimePoint| TimePoint {
        u: p.u.iter().map(|x| 2.0 * x).collect(),
        v: p.v.iter().map(|x| 2.0 * x).collect(),
        w: p.w.iter().map(|x| 2.0 * x).collect(),
        aux: p.aux.clone(),
    };
    let (point2, left2) = (scaled(&point), scaled(&left));
    let lin2 = residual(&ops, &fine_ctx(4, 256, true), &Neighbors::none().with_left(&left2), &point2);
    for k in 0..8 {
        assert_relative_eq!(lin2.u[k], 2.0 * lin.u[k], epsilon = 1e-13);
        assert_relative_eq!(lin2.w[k], 2.0 * lin.w[k], epsilon = 1e-13);
    }
}

#[test]
fn test_coarse_step_rebuilds_operators() {
    let prob = reference_problem(BlockArity::Three);
    let ops = KktOperators::new(&prob, 1).unwrap();
    let fine = fine_ctx(2, 256, false);
    let coarse = TriContext {
        t: 0.0,
        t_prev: 0.0,
        t_next: 4.0 / 256.0,
        index: 0,
        level: 1,
        homogeneous: false,
    };

    let fine_ops = ops.operators_for(&fine).unwrap();
    let coarse_ops = ops.operators_for(&coarse).unwrap();
    assert_eq!(fine_ops.stencil, ops.fine().stencil);
    assert_relative_eq!(coarse_ops.stencil.dt(), 4.0 / 256.0, epsilon = 1e-16);

    // The kernel stays exact on the coarse step
    let mut point = TimePoint::zeros(8, BlockArity::Three);
    let outcome = ops.solve(&coarse, &Neighbors::none(), &mut point).unwrap();
    assert!(outcome.residual_inf < 1e-9);
}

#[test]
fn test_reference_scenario_single_solve() {
    let prob = reference_problem(BlockArity::Four);
    let app = AdvecDiffApp::new(&prob, &SolverSettings::default()).unwrap();
    let ctx = fine_ctx(0, 256, false);

    let zero_right = TimePoint::zeros(8, BlockArity::Four);
    let nbrs = Neighbors::none().with_right(&zero_right);
    let mut point = app.init(0);

    let outcome = app.solve(&ctx, &nbrs, &mut point).unwrap();
    assert_eq!(outcome.rfactor, 1);

    let mut r = TimePoint::zeros(8, BlockArity::Four);
    app.residual(&ctx, &nbrs, &point, &mut r).unwrap();
    let r_inf = inf_norm(&r.u).max(inf_norm(&r.v)).max(inf_norm(&r.w));
    assert!(r_inf < 1e-9, "residual {:e}", r_inf);
}

#[test]
fn test_pack_round_trip_through_app() {
    let prob = reference_problem(BlockArity::Four);
    let app = AdvecDiffApp::new(&prob, &SolverSettings::default()).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let point = random_point(&mut rng, 8);

    let mut buf = vec![0.0; app.buf_size() + 3];
    let written = app.buf_pack(&point, &mut buf).unwrap();
    assert_eq!(written, 32);
    let back = app.buf_unpack(&buf).unwrap();
    assert_eq!(back, point);
    for (a, b) in back.u.iter().zip(&point.u) {
        assert_eq!(a.to_bits(), b.to_bits());
    }

    let mut short = vec![0.0; 31];
    assert!(app.buf_pack(&point, &mut short).is_err());
}

#[test]
fn test_global_gs_converges() {
    let disc = Discretization {
        scheme: AdvectionScheme::Central,
        ..Default::default()
    };
    let prob = ProblemData::new(GridParams::new(12, 4096, 1.5, 0.005), disc);
    let settings = SolverSettings {
        max_iter: 300,
        tol: 1e-6,
        verbose: false,
        seed: 1,
        refine_iters: 1,
    };

    let result = solve(&prob, &settings).expect("solve failed");
    println!(
        "status={} iters={} residual={:e}",
        result.status, result.info.iters, result.info.residual_norm
    );

    assert_eq!(result.status, SolveStatus::Converged);
    assert!(result.info.iters <= 300);
    assert!(result.info.residual_norm <= 1e-6);

    let hist = &result.info.residual_history;
    assert_eq!(hist.len(), result.info.iters);
    for pair in hist[5..].windows(2) {
        assert!(pair[1] <= pair[0] * (1.0 + 1e-12), "residual increased: {:?}", pair);
    }

    assert_eq!(result.u.len(), 4096);
    assert!(result.u.iter().flatten().all(|x| x.is_finite()));
}

#[test]
fn test_global_gs_reports_divergence() {
    let disc = Discretization {
        scheme: AdvectionScheme::Central,
        ..Default::default()
    };
    let prob = ProblemData::new(GridParams::new(12, 4096, -1.5, 0.005), disc);
    let settings = SolverSettings {
        max_iter: 300,
        tol: 1e-6,
        verbose: false,
        seed: 1,
        refine_iters: 1,
    };

    let result = solve(&prob, &settings).expect("solve failed");
    assert_eq!(result.status, SolveStatus::Diverged);
    assert!(!result.status.is_converged());
    assert!(!result.info.residual_norm.is_finite());
}
