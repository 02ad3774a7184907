//! Pre-allocated history workspace for the block Gauss-Seidel driver.
//!
//! All five arrays are `n × m`, stored as `n` blocks of length `m` so that
//! rayon can hand out one block per time index.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Time histories owned by the global driver.
pub struct History {
    // Problem dimensions
    n: usize, // time steps
    m: usize, // spatial points

    /// State history
    pub u: Vec<Vec<f64>>,
    /// Control history
    pub v: Vec<Vec<f64>>,
    /// Adjoint history
    pub w: Vec<Vec<f64>>,

    /// Per-index residual scratch (state and adjoint rows)
    pub res: Vec<Vec<f64>>,
    /// Per-index residual scratch (control row)
    pub res1: Vec<Vec<f64>>,
}

impl History {
    /// Allocate zeroed histories.
    pub fn new(n: usize, m: usize) -> Self {
        let block = || vec![vec![0.0; m]; n];
        Self {
            n,
            m,
            u: block(),
            v: block(),
            w: block(),
            res: block(),
            res1: block(),
        }
    }

    /// Allocate histories filled with one random vector.
    ///
    /// A single vector, uniform in `[-1, 1)`, is drawn from a ChaCha8 stream
    /// seeded with `seed` and copied into every block of every array.
    pub fn with_random_guess(n: usize, m: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let guess: Vec<f64> = (0..m).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut hist = Self::new(n, m);
        for arr in [
            &mut hist.u,
            &mut hist.v,
            &mut hist.w,
            &mut hist.res,
            &mut hist.res1,
        ] {
            for block in arr.iter_mut() {
                block.copy_from_slice(&guess);
            }
        }
        hist
    }

    /// Number of time steps.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of spatial points.
    #[inline]
    pub fn m(&self) -> usize {
        self.m
    }

    /// Hand the state, control and adjoint histories to the caller.
    pub fn into_fields(self) -> (Vec<Vec<f64>>, Vec<Vec<f64>>, Vec<Vec<f64>>) {
        (self.u, self.v, self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_shape() {
        let hist = History::new(16, 5);
        assert_eq!(hist.n(), 16);
        assert_eq!(hist.m(), 5);
        assert_eq!(hist.u.len(), 16);
        assert!(hist.res1.iter().all(|b| b.len() == 5));
    }

    #[test]
    fn test_random_guess_is_shared_and_seeded() {
        let a = History::with_random_guess(4, 6, 1);
        let b = History::with_random_guess(4, 6, 1);
        let c = History::with_random_guess(4, 6, 2);

        assert_eq!(a.u, b.u);
        assert_ne!(a.u[0], c.u[0]);
        for arr in [&a.u, &a.v, &a.w, &a.res, &a.res1] {
            for block in arr {
                assert_eq!(block, &a.u[0]);
            }
        }
        assert!(a.u[0].iter().all(|&x| (-1.0..1.0).contains(&x)));
    }
}
