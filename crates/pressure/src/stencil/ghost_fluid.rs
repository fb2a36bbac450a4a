//! Ghost-fluid free-surface weights.
//!
//! `theta` is the fraction of the way from a fluid cell centre to the
//! neighbouring empty cell centre at which the level set crosses zero
//! (negative inside fluid).

use glam::IVec3;
use rayon::prelude::*;

use super::StencilMatrix;
use crate::constants::THETA_DENOMINATOR_LIMIT;
use crate::error::{ProjectionError, ProjectionResult};
use crate::grid::{Axis, FlagGrid};
use crate::Real;

/// Zero-crossing fraction between a fluid value and an empty-side value.
#[inline]
pub fn theta(inside: Real, outside: Real) -> Real {
    let denominator = inside - outside;
    if denominator > THETA_DENOMINATOR_LIMIT {
        return 0.5;
    }
    (inside / denominator).clamp(0.0, 1.0)
}

/// `theta` bounded below by `clamp`.
#[inline]
pub fn clamped_theta(inside: Real, outside: Real, clamp: Real) -> Real {
    theta(inside, outside).max(clamp)
}

#[inline]
pub fn was_clamped(inside: Real, outside: Real, clamp: Real) -> bool {
    theta(inside, outside) < clamp
}

/// Diagonal addition for one empty neighbour at weight `theta` (already clamped).
#[inline]
pub fn diagonal_correction(theta: Real) -> Real {
    -(1.0 - 1.0 / theta)
}

/// Modify the diagonal of fluid cells next to empty cells.
pub fn apply_ghost_fluid_diagonal(
    matrix: &mut StencilMatrix,
    flags: &FlagGrid,
    phi: &[Real],
    clamp: Real,
) -> ProjectionResult<()> {
    let size = matrix.size();
    ProjectionError::check_len("phi", size.cell_count(), phi.len())?;
    ProjectionError::check_len("flags", size.cell_count(), flags.size().cell_count())?;

    matrix.a0.par_iter_mut().enumerate().for_each(|(idx, a0)| {
        if !flags.is_fluid(idx) {
            return;
        }
        let p = size.position(idx);
        for_each_empty_neighbour(flags, p, |nb| {
            let t = clamped_theta(phi[idx], phi[size.index_of(nb)], clamp);
            *a0 += diagonal_correction(t);
        });
    });
    Ok(())
}

/// Visit the in-domain EMPTY face neighbours of `p`.
pub(crate) fn for_each_empty_neighbour(flags: &FlagGrid, p: IVec3, mut f: impl FnMut(IVec3)) {
    for &axis in Axis::active(flags.size()) {
        let e = axis.unit();
        for nb in [p - e, p + e] {
            if flags.is_empty_at(nb) {
                f(nb);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellFlags, GridSize};
    use crate::stencil::make_laplace_matrix;

    #[test]
    fn test_theta_interpolates_crossing() {
        assert!((theta(-0.25, 0.75) - 0.25).abs() < 1e-12);
        assert!((theta(-1.0, 1.0) - 0.5).abs() < 1e-12);
        // No sign change: half-cell fallback.
        assert_eq!(theta(0.3, 0.3), 0.5);
        assert_eq!(theta(0.5, 0.2), 0.5);
    }

    #[test]
    fn test_theta_is_bounded() {
        // Fluid value on the wrong side of zero.
        assert_eq!(theta(0.1, 0.5), 0.0);
        assert_eq!(theta(0.1, -0.5), 0.5);
        assert_eq!(theta(-1.0, -0.5), 1.0);
        assert!(was_clamped(-1e-6, 1.0, 1e-4));
        assert_eq!(clamped_theta(-1e-6, 1.0, 1e-4), 1e-4);
    }

    #[test]
    fn test_surface_cell_diagonal() {
        let size = GridSize::planar(1, 2);
        let mut flags = FlagGrid::filled_fluid(size);
        flags.set(0, 1, 0, CellFlags::EMPTY);
        let mut m = make_laplace_matrix(&flags, None).unwrap();
        assert_eq!(m.a0[0], 1.0);

        // Crossing half way: 1 - 1/0.5 = -1, so the diagonal grows by one.
        apply_ghost_fluid_diagonal(&mut m, &flags, &[-0.5, 0.5], 1e-4).unwrap();
        assert!((m.a0[0] - 2.0).abs() < 1e-12);
        assert_eq!(m.a0[1], 0.0);
    }
}
