//! Galerkin coarse operators `A_c = R A I` with `R = I^T`.
//!
//! Level 1 is assembled from a precomputed path table over the axis-layout
//! fine stencil. Deeper levels run the same sum as a direct loop.

use glam::IVec3;
use rayon::prelude::*;

use super::level::{box_offsets, coarse_candidates, offset_key, transfer_weight, LevelView, StencilLayout, VertexType};
use crate::grid::GridSize;
use crate::Real;

/// One term `R[V][u] * A[u][w] * I[w][V + n]` of a coarse coefficient, with
/// every fine offset relative to `2V`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CoarseningPath {
    /// Coarse slot `key(n)`
    pub sc: usize,
    /// Coarse neighbour offset
    pub n: IVec3,
    pub u: IVec3,
    pub w: IVec3,
    /// Fine vertex storing `A[u][w]`, and its slot
    pub owner: IVec3,
    pub sf: usize,
    pub rw: Real,
    pub iw: Real,
}

fn axis_stencil(is_3d: bool) -> Vec<IVec3> {
    let mut out = vec![
        IVec3::ZERO,
        IVec3::NEG_X,
        IVec3::X,
        IVec3::NEG_Y,
        IVec3::Y,
    ];
    if is_3d {
        out.extend([IVec3::NEG_Z, IVec3::Z]);
    }
    out
}

fn axis_slot(d: IVec3) -> Option<usize> {
    match (d.x, d.y, d.z) {
        (0, 0, 0) => Some(0),
        (1, 0, 0) => Some(1),
        (0, 1, 0) => Some(2),
        (0, 0, 1) => Some(3),
        _ => None,
    }
}

/// Every admissible path for an axis-layout fine level, sorted by coarse slot.
pub(crate) fn build_coarsening_paths(is_3d: bool) -> Vec<CoarseningPath> {
    let mut paths = Vec::new();
    for s in box_offsets(is_3d, true) {
        for d in axis_stencil(is_3d) {
            let w = s + d;
            let (owner, sf) = match axis_slot(d) {
                Some(slot) => (s, slot),
                None => (w, axis_slot(-d).unwrap_or(0)),
            };
            for n in coarse_candidates_rel(w, is_3d) {
                let key = offset_key(n);
                if key < 0 {
                    continue;
                }
                paths.push(CoarseningPath {
                    sc: key as usize,
                    n,
                    u: s,
                    w,
                    owner,
                    sf,
                    rw: transfer_weight(s),
                    iw: transfer_weight(w - n * 2),
                });
            }
        }
    }
    paths.sort_by(|a, b| {
        (a.sc, a.u.to_array(), a.w.to_array()).cmp(&(b.sc, b.u.to_array(), b.w.to_array()))
    });
    paths
}

/// `coarse_candidates` for offsets that may be negative.
fn coarse_candidates_rel(w: IVec3, is_3d: bool) -> impl Iterator<Item = IVec3> {
    let shift = IVec3::new(2, 2, if is_3d { 2 } else { 0 });
    coarse_candidates(w + shift * 2, is_3d).map(move |c| c - shift)
}

/// Level-1 assembly from the path table.
pub(crate) fn assemble_with_paths(
    paths: &[CoarseningPath],
    fine: LevelView<'_>,
    coarse: GridSize,
    coarse_vtype: &[VertexType],
    coarse_width: usize,
    out: &mut [Real],
) {
    debug_assert_eq!(fine.layout, StencilLayout::Axis);
    let fsize = fine.size;
    let fine_active = |p: IVec3| fsize.contains(p) && fine.is_active(fsize.index_of(p));

    out.par_chunks_mut(coarse_width)
        .enumerate()
        .for_each(|(vi, row)| {
            row.fill(0.0);
            if !coarse_vtype[vi].is_active() {
                return;
            }
            let v = coarse.position(vi);
            let base = v * 2;
            for path in paths {
                let nb = v + path.n;
                if !coarse.contains(nb) || !coarse_vtype[coarse.index_of(nb)].is_active() {
                    continue;
                }
                let u = base + path.u;
                let w = base + path.w;
                if !fine_active(u) || !fine_active(w) {
                    continue;
                }
                let a = fine.stencil[fsize.index_of(base + path.owner) * fine.width + path.sf];
                row[path.sc] += path.rw * a * path.iw;
            }
        });
}

/// Direct assembly of `R A I` for any fine layout.
pub(crate) fn assemble_direct(
    fine: LevelView<'_>,
    coarse: GridSize,
    coarse_vtype: &[VertexType],
    coarse_width: usize,
    out: &mut [Real],
) {
    let fsize = fine.size;
    let is_3d = fsize.is_3d();
    let restriction = box_offsets(is_3d, true);

    out.par_chunks_mut(coarse_width)
        .enumerate()
        .for_each(|(vi, row)| {
            row.fill(0.0);
            if !coarse_vtype[vi].is_active() {
                return;
            }
            let v = coarse.position(vi);
            for &s in &restriction {
                let u = v * 2 + s;
                if !fsize.contains(u) {
                    continue;
                }
                let ui = fsize.index_of(u);
                if !fine.is_active(ui) {
                    continue;
                }
                let rw = transfer_weight(s);
                let centre = std::iter::once(IVec3::ZERO);
                for d in centre.chain(fine.neighbours.iter().copied()) {
                    let w = u + d;
                    if !fsize.contains(w) || !fine.is_active(fsize.index_of(w)) {
                        continue;
                    }
                    let a = fine.coeff(u, d);
                    if a == 0.0 {
                        continue;
                    }
                    for c in coarse_candidates(w, is_3d) {
                        let n = c - v;
                        let key = offset_key(n);
                        if key < 0 || !coarse.contains(c) {
                            continue;
                        }
                        if !coarse_vtype[coarse.index_of(c)].is_active() {
                            continue;
                        }
                        row[key as usize] += rw * a * transfer_weight(w - c * 2);
                    }
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellFlags, FlagGrid};
    use crate::multigrid::{MultigridHierarchy, MultigridSettings};
    use crate::stencil::make_laplace_matrix;

    #[test]
    fn test_path_table_sizes() {
        let paths = build_coarsening_paths(true);
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| p.sc < 14));
        assert!(paths.windows(2).all(|w| w[0].sc <= w[1].sc));
        let planar = build_coarsening_paths(false);
        assert!(planar.iter().all(|p| p.sc < 5 && p.n.z == 0 && p.u.z == 0));
    }

    fn compare_assemblies(flags: &FlagGrid) {
        let matrix = make_laplace_matrix(flags, None).unwrap();
        let mut mg = MultigridHierarchy::new(flags.size(), MultigridSettings::default()).unwrap();
        mg.set_a(&matrix).unwrap();
        assert!(mg.num_levels() > 1);

        let fine = mg.levels[0].view();
        let coarse = &mg.levels[1];
        let mut direct = vec![0.0; coarse.stencil.len()];
        assemble_direct(fine, coarse.size, &coarse.vtype, coarse.width, &mut direct);

        let mut any_nonzero = false;
        for (a, b) in coarse.stencil.iter().zip(&direct) {
            assert!((a - b).abs() <= 1e-12 * a.abs().max(1.0), "{} vs {}", a, b);
            any_nonzero |= *a != 0.0;
        }
        assert!(any_nonzero);
    }

    #[test]
    fn test_path_table_matches_direct_3d() {
        let size = crate::grid::GridSize::new(12, 10, 9);
        let mut flags = FlagGrid::filled_fluid(size);
        for i in 0..size.nx {
            for k in 0..size.nz {
                flags.set(i, size.ny - 1, k, CellFlags::EMPTY);
            }
        }
        flags.set(5, 4, 4, CellFlags::OBSTACLE);
        flags.set(6, 4, 4, CellFlags::OBSTACLE);
        compare_assemblies(&flags);
    }

    #[test]
    fn test_path_table_matches_direct_2d() {
        let size = crate::grid::GridSize::planar(40, 33);
        let mut flags = FlagGrid::filled_fluid(size);
        for i in 0..size.nx {
            flags.set(i, size.ny - 1, 0, CellFlags::EMPTY);
            flags.set(i, 0, 0, CellFlags::OBSTACLE);
        }
        compare_assemblies(&flags);
    }
}
