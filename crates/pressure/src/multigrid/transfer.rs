//! Inter-level transfer and residual kernels.

use rayon::prelude::*;

use super::level::{box_offsets, coarse_candidates, transfer_weight, LevelView, VertexType};
use crate::grid::GridSize;
use crate::Real;

/// `r = b - A x` on active vertices, zero elsewhere.
pub(crate) fn compute_residual(view: LevelView<'_>, x: &[Real], b: &[Real], r: &mut [Real]) {
    r.par_iter_mut().enumerate().for_each(|(vi, r)| {
        *r = if view.is_active(vi) {
            b[vi] - view.row_product(view.size.position(vi), vi, x)
        } else {
            0.0
        };
    });
}

/// Full-weighting restriction of the fine residual into the coarse rhs.
pub(crate) fn restrict(
    fine_size: GridSize,
    fine_vtype: &[VertexType],
    fine_r: &[Real],
    coarse_size: GridSize,
    coarse_vtype: &[VertexType],
    coarse_b: &mut [Real],
) {
    let offsets = box_offsets(fine_size.is_3d(), true);
    coarse_b.par_iter_mut().enumerate().for_each(|(vi, b)| {
        *b = 0.0;
        if !coarse_vtype[vi].is_active() {
            return;
        }
        let base = coarse_size.position(vi) * 2;
        for &s in &offsets {
            let u = base + s;
            if !fine_size.contains(u) {
                continue;
            }
            let ui = fine_size.index_of(u);
            if fine_vtype[ui].is_active() {
                *b += transfer_weight(s) * fine_r[ui];
            }
        }
    });
}

/// Trilinear interpolation of the coarse unknown onto active fine vertices.
pub(crate) fn interpolate(
    coarse_size: GridSize,
    coarse_vtype: &[VertexType],
    coarse_x: &[Real],
    fine_size: GridSize,
    fine_vtype: &[VertexType],
    fine_out: &mut [Real],
) {
    let is_3d = fine_size.is_3d();
    fine_out.par_iter_mut().enumerate().for_each(|(ui, out)| {
        *out = 0.0;
        if !fine_vtype[ui].is_active() {
            return;
        }
        let u = fine_size.position(ui);
        for c in coarse_candidates(u, is_3d) {
            let ci = coarse_size.index_of(c);
            if coarse_vtype[ci].is_active() {
                *out += transfer_weight(u - c * 2) * coarse_x[ci];
            }
        }
    });
}
