//! Flat transport buffers for time points.
//!
//! Layout: `u, v, w` followed by `aux` for the four-block variant, each of
//! length `m`. Unpacking is the exact inverse of packing.

use super::block::TimePoint;
use crate::error::{OptCtlError, OptCtlResult};
use crate::problem::BlockArity;

/// Number of reals needed for one time point.
#[inline]
pub fn buffer_len(m: usize, arity: BlockArity) -> usize {
    arity.blocks() * m
}

/// Copy `point` into `buf`, returning the number of reals written.
///
/// A four-block layout with no `aux` present writes zeros in its place.
/// Blocks of unequal length are rejected.
pub fn pack(point: &TimePoint, arity: BlockArity, buf: &mut [f64]) -> OptCtlResult<usize> {
    let m = point.m();
    point.check_dim(m)?;
    let len = buffer_len(m, arity);
    if buf.len() < len {
        return Err(OptCtlError::BufferSize {
            expected: len,
            actual: buf.len(),
        });
    }

    if len == 0 {
        return Ok(0);
    }

    let mut chunks = buf[..len].chunks_exact_mut(m);
    for (src, dst) in [&point.u, &point.v, &point.w].into_iter().zip(chunks.by_ref()) {
        dst.copy_from_slice(src);
    }
    if let Some(dst) = chunks.next() {
        match point.aux.as_ref() {
            Some(aux) => dst.copy_from_slice(aux),
            None => dst.fill(0.0),
        }
    }

    Ok(len)
}

/// Rebuild a time point of spatial length `m` from `buf`.
pub fn unpack(buf: &[f64], m: usize, arity: BlockArity) -> OptCtlResult<TimePoint> {
    let len = buffer_len(m, arity);
    if buf.len() < len {
        return Err(OptCtlError::BufferSize {
            expected: len,
            actual: buf.len(),
        });
    }

    let block = |j: usize| buf[j * m..(j + 1) * m].to_vec();
    Ok(TimePoint {
        u: block(0),
        v: block(1),
        w: block(2),
        aux: match arity {
            BlockArity::Three => None,
            BlockArity::Four => Some(block(3)),
        },
    })
}
