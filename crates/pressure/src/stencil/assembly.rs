//! Laplacian assembly from cell flags, and null-space pinning.

use glam::IVec3;
use rayon::prelude::*;

use super::StencilMatrix;
use crate::error::{ProjectionError, ProjectionResult};
use crate::grid::{Axis, FlagGrid, MacGrid};
use crate::Real;

/// Build the pressure Laplacian.
///
/// Every non-obstacle face of a fluid cell adds its open area (1, or the face
/// fraction) to the diagonal; the link to an upper neighbour is set only when
/// that neighbour is fluid too.
pub fn make_laplace_matrix(
    flags: &FlagGrid,
    fractions: Option<&MacGrid>,
) -> ProjectionResult<StencilMatrix> {
    let size = flags.size();
    if let Some(frac) = fractions {
        for &axis in &Axis::ALL {
            ProjectionError::check_len(
                "fractions",
                MacGrid::component_len(size, axis),
                frac.component(axis).len(),
            )?;
        }
    }

    let mut matrix = StencilMatrix::zeroed(size)?;
    let axes = Axis::active(size);
    let open_area = |axis: Axis, face: IVec3| -> Real {
        fractions.map_or(1.0, |frac| frac.face(axis, face))
    };

    let StencilMatrix { a0, ai, aj, ak, .. } = &mut matrix;
    a0.par_iter_mut()
        .zip(ai.par_iter_mut())
        .zip(aj.par_iter_mut())
        .zip(ak.par_iter_mut())
        .enumerate()
        .for_each(|(idx, (((a0, ai), aj), ak))| {
            if !flags.is_fluid(idx) {
                return;
            }
            let p = size.position(idx);
            for &axis in axes {
                let e = axis.unit();
                let low_area = open_area(axis, p);
                let high_area = open_area(axis, p + e);

                if !flags.is_obstacle_at(p - e) {
                    *a0 += low_area;
                }
                if !flags.is_obstacle_at(p + e) {
                    *a0 += high_area;
                }
                if flags.is_fluid_at(p + e) {
                    let link = match axis {
                        Axis::X => &mut *ai,
                        Axis::Y => &mut *aj,
                        Axis::Z => &mut *ak,
                    };
                    *link = -high_area;
                }
            }
        });

    Ok(matrix)
}

/// Rewrite the equation of `idx` to `p[idx] = value`, moving its coupling to
/// the neighbours' right-hand sides so the matrix stays symmetric.
pub fn fix_pressure(
    matrix: &mut StencilMatrix,
    rhs: &mut [Real],
    idx: usize,
    value: Real,
) -> ProjectionResult<()> {
    let size = matrix.size();
    ProjectionError::check_len("rhs", size.cell_count(), rhs.len())?;
    if idx >= size.cell_count() {
        return Err(ProjectionError::SizeMismatch {
            field: "pinned cell",
            expected: size.cell_count(),
            found: idx,
        });
    }

    let p = size.position(idx);
    for &axis in Axis::active(size) {
        let e = axis.unit();
        if size.contains(p + e) {
            let nb = size.index_of(p + e);
            rhs[nb] -= matrix.link(idx, axis) * value;
            matrix.link_mut(axis)[idx] = 0.0;
        }
        if size.contains(p - e) {
            let nb = size.index_of(p - e);
            rhs[nb] -= matrix.link(nb, axis) * value;
            matrix.link_mut(axis)[nb] = 0.0;
        }
    }
    matrix.a0[idx] = 1.0;
    rhs[idx] = value;
    Ok(())
}

/// Deterministic choice of the cell whose pressure is pinned.
///
/// Prefers the top-centre column (top row, then the two rows below it) and
/// falls back to the first fluid cell in z-y-x scan order.
pub fn find_pinned_cell(flags: &FlagGrid) -> Option<usize> {
    let size = flags.size();
    let cx = (size.nx / 2) as i32;
    let cz = if size.is_3d() { (size.nz / 2) as i32 } else { 0 };
    let top = size.ny as i32 - 1;

    (0..3)
        .map(|down| IVec3::new(cx, top - down, cz))
        .find(|&p| flags.is_fluid_at(p))
        .map(|p| size.index_of(p))
        .or_else(|| (0..size.cell_count()).find(|&idx| flags.is_fluid(idx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellFlags, GridSize};

    #[test]
    fn test_interior_cell_has_six_links() {
        let flags = FlagGrid::filled_fluid(GridSize::new(3, 3, 3));
        let m = make_laplace_matrix(&flags, None).unwrap();
        let c = flags.size().index(1, 1, 1);
        assert_eq!(m.a0[c], 6.0);
        assert_eq!((m.ai[c], m.aj[c], m.ak[c]), (-1.0, -1.0, -1.0));
        // Corner cell: three domain walls count as obstacles.
        assert_eq!(m.a0[0], 3.0);
    }

    #[test]
    fn test_empty_neighbour_adds_diagonal_only() {
        let size = GridSize::planar(3, 1);
        let mut flags = FlagGrid::filled_fluid(size);
        flags.set(2, 0, 0, CellFlags::EMPTY);
        let m = make_laplace_matrix(&flags, None).unwrap();
        assert_eq!(m.a0[1], 2.0);
        assert_eq!(m.ai[1], 0.0);
        assert_eq!(m.a0[2], 0.0);
    }

    #[test]
    fn test_fractions_weight_faces() {
        let size = GridSize::planar(2, 1);
        let flags = FlagGrid::filled_fluid(size);
        let mut frac = MacGrid::filled(size, 1.0);
        frac.set_face(Axis::X, IVec3::new(1, 0, 0), 0.25);
        let m = make_laplace_matrix(&flags, Some(&frac)).unwrap();
        assert_eq!(m.a0[0], 0.25);
        assert_eq!(m.a0[1], 0.25);
        assert_eq!(m.ai[0], -0.25);
    }

    #[test]
    fn test_fractions_shape_is_checked() {
        let flags = FlagGrid::filled_fluid(GridSize::planar(4, 4));
        let frac = MacGrid::filled(GridSize::planar(3, 4), 1.0);
        assert!(matches!(
            make_laplace_matrix(&flags, Some(&frac)),
            Err(ProjectionError::SizeMismatch { field: "fractions", .. })
        ));
    }

    #[test]
    fn test_fix_pressure_moves_coupling_to_rhs() {
        let size = GridSize::planar(3, 3);
        let flags = FlagGrid::filled_fluid(size);
        let mut m = make_laplace_matrix(&flags, None).unwrap();
        let mut rhs = vec![0.0; 9];
        let c = size.index(1, 1, 0);
        fix_pressure(&mut m, &mut rhs, c, 2.0).unwrap();

        assert_eq!(m.a0[c], 1.0);
        assert_eq!(rhs[c], 2.0);
        for nb in [size.index(0, 1, 0), size.index(2, 1, 0), size.index(1, 0, 0), size.index(1, 2, 0)] {
            assert_eq!(m.coefficient(c, nb), 0.0);
            assert_eq!(rhs[nb], 2.0);
        }
    }

    #[test]
    fn test_pinned_cell_prefers_top_centre() {
        let size = GridSize::new(4, 5, 4);
        let mut flags = FlagGrid::filled_fluid(size);
        assert_eq!(find_pinned_cell(&flags), Some(size.index(2, 4, 2)));

        flags.set(2, 4, 2, CellFlags::OBSTACLE);
        flags.set(2, 3, 2, CellFlags::OBSTACLE);
        assert_eq!(find_pinned_cell(&flags), Some(size.index(2, 2, 2)));

        flags.set(2, 2, 2, CellFlags::OBSTACLE);
        assert_eq!(find_pinned_cell(&flags), Some(0));
    }

    #[test]
    fn test_pinned_cell_none_without_fluid() {
        let flags = FlagGrid::new(GridSize::planar(3, 3), CellFlags::OBSTACLE);
        assert_eq!(find_pinned_cell(&flags), None);
    }
}
