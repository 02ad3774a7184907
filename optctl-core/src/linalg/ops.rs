//! Dense slice kernels shared by the local kernel and the global driver.

/// y += alpha * x
#[inline]
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// x *= alpha
#[inline]
pub fn scale(alpha: f64, x: &mut [f64]) {
    for xi in x.iter_mut() {
        *xi *= alpha;
    }
}

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(ai, bi)| ai * bi).sum()
}

#[inline]
pub fn sum_sq(v: &[f64]) -> f64 {
    v.iter().map(|&x| x * x).sum()
}

#[inline]
pub fn norm2(v: &[f64]) -> f64 {
    sum_sq(v).sqrt()
}

/// Max absolute entry; NaN entries propagate.
#[inline]
pub fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc: f64, &x| {
        if x.is_nan() || acc.is_nan() {
            f64::NAN
        } else {
            acc.max(x.abs())
        }
    })
}
