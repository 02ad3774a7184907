//! Linear algebra layer.
//!
//! Stencil operators, tridiagonal and Schur factorizations, sparse assembly.

pub mod ops;
pub mod sparse;
pub mod stencil;
pub mod tridiag;
pub mod schur;
