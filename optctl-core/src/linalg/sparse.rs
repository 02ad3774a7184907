//! Sparse assembly of the stencil operators.
//!
//! The solvers never form matrices; these CSC (Compressed Sparse Column)
//! assemblies exist for export and for cross-checking the matrix-free
//! operators.

use sprs::{CsMat, TriMat};

use super::stencil::Stencil;

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// # Arguments
///
/// * `nrows` - Number of rows
/// * `ncols` - Number of columns
/// * `triplets` - Iterator of (row, col, value) tuples
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Sparse matrix-vector product: y = alpha * A * x + beta * y
pub fn spmv(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.cols(), x.len());
    assert_eq!(a.rows(), y.len());

    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }

    if alpha != 0.0 {
        for (val, (row, col)) in a.iter() {
            y[row] += alpha * (*val) * x[col];
        }
    }
}

/// Transpose-vector product: y = A^T * x
pub fn spmv_transpose(a: &SparseCsc, x: &[f64], y: &mut [f64]) {
    assert_eq!(a.rows(), x.len());
    assert_eq!(a.cols(), y.len());

    y.fill(0.0);
    for (val, (row, col)) in a.iter() {
        y[col] += (*val) * x[row];
    }
}

/// Assemble the 3m × 3m Jacobian of the local KKT rows.
///
/// Unknowns are ordered `(u, v, w)`, rows `(adjoint, control, state)`:
///
/// ```text
/// [ U   0   Aᵗ ]
/// [ 0   V  -D  ]
/// [ A  -D   0  ]
/// ```
///
/// with `U = Δx Δt I`, `V = α Δx Δt I`, `D = Δt I`.
pub fn local_kkt(stencil: &Stencil, m: usize) -> SparseCsc {
    let h = stencil.cell();
    let vh = stencil.alpha() * h;
    let dt = stencil.dt();
    let (u0, v0, w0) = (0, m, 2 * m);

    let mut triplets = Vec::with_capacity(9 * m);
    for i in 0..m {
        // Adjoint row: U u + Aᵗ w
        triplets.push((u0 + i, u0 + i, h));
        if i > 0 {
            triplets.push((u0 + i, w0 + i - 1, stencil.sup));
        }
        triplets.push((u0 + i, w0 + i, stencil.diag));
        if i + 1 < m {
            triplets.push((u0 + i, w0 + i + 1, stencil.sub));
        }

        // Control row: V v - D w
        triplets.push((v0 + i, v0 + i, vh));
        triplets.push((v0 + i, w0 + i, -dt));

        // State row: A u - D v
        if i > 0 {
            triplets.push((w0 + i, u0 + i - 1, stencil.sub));
        }
        triplets.push((w0 + i, u0 + i, stencil.diag));
        if i + 1 < m {
            triplets.push((w0 + i, u0 + i + 1, stencil.sup));
        }
        triplets.push((w0 + i, v0 + i, -dt));
    }

    from_triplets(3 * m, 3 * m, triplets)
}
