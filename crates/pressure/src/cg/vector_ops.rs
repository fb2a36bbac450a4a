//! Parallel vector kernels used by the Krylov loop.
//!
//! Reductions sum fixed-length chunks in parallel and combine the partial
//! sums in chunk order, so results do not depend on the thread count.

use rayon::prelude::*;

use crate::constants::REDUCTION_CHUNK;
use crate::Real;

pub fn dot(a: &[Real], b: &[Real]) -> Real {
    debug_assert_eq!(a.len(), b.len());
    let partials: Vec<Real> = a
        .par_chunks(REDUCTION_CHUNK)
        .zip(b.par_chunks(REDUCTION_CHUNK))
        .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x * y).sum::<Real>())
        .collect();
    partials.into_iter().sum()
}

pub fn norm_l2(a: &[Real]) -> Real {
    dot(a, a).sqrt()
}

pub fn max_abs(a: &[Real]) -> Real {
    a.par_iter().map(|v| v.abs()).reduce(|| 0.0, Real::max)
}

/// `y += alpha * x`
pub fn axpy(y: &mut [Real], alpha: Real, x: &[Real]) {
    y.par_iter_mut().zip(x).for_each(|(y, &x)| *y += alpha * x);
}

/// `y = x + beta * y`
pub fn xpay(y: &mut [Real], beta: Real, x: &[Real]) {
    y.par_iter_mut().zip(x).for_each(|(y, &x)| *y = x + beta * *y);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_and_norms() {
        let a = vec![3.0, -4.0];
        assert_eq!(dot(&a, &a), 25.0);
        assert_eq!(norm_l2(&a), 5.0);
        assert_eq!(max_abs(&a), 4.0);
    }

    #[test]
    fn test_dot_is_repeatable_across_chunks() {
        let a: Vec<Real> = (0..3 * REDUCTION_CHUNK + 17)
            .map(|i| ((i * 7919) % 1000) as Real * 1e-3 - 0.5)
            .collect();
        let first = dot(&a, &a);
        for _ in 0..5 {
            assert_eq!(dot(&a, &a).to_bits(), first.to_bits());
        }
    }

    #[test]
    fn test_axpy_xpay() {
        let mut y = vec![1.0, 2.0];
        axpy(&mut y, 2.0, &[1.0, 1.0]);
        assert_eq!(y, vec![3.0, 4.0]);
        xpay(&mut y, 0.5, &[1.0, 0.0]);
        assert_eq!(y, vec![2.5, 2.0]);
    }
}
