//! Field blocks of one time point and its neighbor set.

use crate::error::{OptCtlError, OptCtlResult};
use crate::linalg::ops::sum_sq;
use crate::problem::BlockArity;

/// State, control and adjoint blocks at one time point.
///
/// `aux` carries the closure residual for [`BlockArity::Four`]; it is `None`
/// for the three-block variant.
#[derive(Debug, Clone, PartialEq)]
pub struct TimePoint {
    /// State
    pub u: Vec<f64>,
    /// Control
    pub v: Vec<f64>,
    /// Adjoint
    pub w: Vec<f64>,
    /// Closure residual
    pub aux: Option<Vec<f64>>,
}

impl TimePoint {
    /// All-zero time point.
    pub fn zeros(m: usize, arity: BlockArity) -> Self {
        Self {
            u: vec![0.0; m],
            v: vec![0.0; m],
            w: vec![0.0; m],
            aux: match arity {
                BlockArity::Three => None,
                BlockArity::Four => Some(vec![0.0; m]),
            },
        }
    }

    /// Three-block time point from its fields.
    pub fn from_fields(u: Vec<f64>, v: Vec<f64>, w: Vec<f64>) -> Self {
        Self { u, v, w, aux: None }
    }

    /// Spatial length of the blocks.
    #[inline]
    pub fn m(&self) -> usize {
        self.u.len()
    }

    pub fn arity(&self) -> BlockArity {
        if self.aux.is_some() {
            BlockArity::Four
        } else {
            BlockArity::Three
        }
    }

    /// Sum of squares over `u, v, w`.
    pub fn field_sum_sq(&self) -> f64 {
        sum_sq(&self.u) + sum_sq(&self.v) + sum_sq(&self.w)
    }

    /// Check every stored block has length `m`.
    pub fn check_dim(&self, m: usize) -> OptCtlResult<()> {
        let blocks = [Some(&self.u), Some(&self.v), Some(&self.w), self.aux.as_ref()];
        for block in blocks.into_iter().flatten() {
            if block.len() != m {
                return Err(OptCtlError::DimensionMismatch {
                    expected: m,
                    actual: block.len(),
                });
            }
        }
        Ok(())
    }
}

/// Neighbor data for one local evaluation.
///
/// A missing `left` is the initial time (state row uses `U0`), a missing
/// `right` is the final time (no adjoint inflow). `forcing` is subtracted
/// block by block when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct Neighbors<'a> {
    pub left: Option<&'a TimePoint>,
    pub right: Option<&'a TimePoint>,
    pub forcing: Option<&'a TimePoint>,
}

impl<'a> Neighbors<'a> {
    /// No neighbors, no forcing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_left(mut self, left: &'a TimePoint) -> Self {
        self.left = Some(left);
        self
    }

    pub fn with_right(mut self, right: &'a TimePoint) -> Self {
        self.right = Some(right);
        self
    }

    pub fn with_forcing(mut self, forcing: &'a TimePoint) -> Self {
        self.forcing = Some(forcing);
        self
    }

    pub(crate) fn check_dim(&self, m: usize) -> OptCtlResult<()> {
        for p in [self.left, self.right, self.forcing].into_iter().flatten() {
            p.check_dim(m)?;
        }
        Ok(())
    }
}
