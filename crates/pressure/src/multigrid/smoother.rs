//! Multi-colour Gauss-Seidel.
//!
//! The level is tiled into 2x2(x2) blocks and a colour is a set of positions
//! inside a block. On the axis-layout finest level the two colours are the
//! red/black parity classes; on box-layout levels every block position is its
//! own colour. Cells of one colour never share a stencil footprint, so each
//! colour updates in parallel.

use glam::IVec3;
use rayon::prelude::*;

use super::level::{LevelView, StencilLayout};
use crate::Real;

const BLOCK_OFFSETS: [IVec3; 8] = [
    IVec3::new(0, 0, 0),
    IVec3::new(1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(1, 1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(1, 0, 1),
    IVec3::new(0, 1, 1),
    IVec3::new(1, 1, 1),
];

/// Colour classes as lists of block offsets.
pub(crate) fn colours(layout: StencilLayout, is_3d: bool) -> Vec<Vec<IVec3>> {
    let pick = |ids: &[usize]| ids.iter().map(|&i| BLOCK_OFFSETS[i]).collect::<Vec<_>>();
    match (layout, is_3d) {
        (StencilLayout::Axis, true) => vec![pick(&[0, 3, 5, 6]), pick(&[1, 2, 4, 7])],
        (StencilLayout::Axis, false) => vec![pick(&[0, 3]), pick(&[1, 2])],
        (StencilLayout::Box, true) => (0..8).map(|i| pick(&[i])).collect(),
        (StencilLayout::Box, false) => (0..4).map(|i| pick(&[i])).collect(),
    }
}

/// One sweep over all colours, in reverse colour order when `reversed`.
pub(crate) fn smooth(view: LevelView<'_>, colours: &[Vec<IVec3>], b: &[Real], x: &mut [Real], reversed: bool) {
    let size = view.size;
    let blocks = IVec3::new(
        (size.nx as i32 + 1) / 2,
        (size.ny as i32 + 1) / 2,
        if size.is_3d() { (size.nz as i32 + 1) / 2 } else { 1 },
    );
    let block_count = (blocks.x * blocks.y * blocks.z) as usize;

    let count = colours.len();
    for c in 0..count {
        let colour = &colours[if reversed { count - 1 - c } else { c }];
        let x_read: &[Real] = &*x;
        let updates: Vec<(usize, Real)> = (0..block_count)
            .into_par_iter()
            .flat_map_iter(|bi| {
                let bi = bi as i32;
                let block = IVec3::new(
                    bi % blocks.x,
                    (bi / blocks.x) % blocks.y,
                    bi / (blocks.x * blocks.y),
                );
                colour.iter().filter_map(move |&a| {
                    let v = block * 2 + a;
                    if !size.contains(v) {
                        return None;
                    }
                    let vi = size.index_of(v);
                    let diag = view.diagonal(vi);
                    if !view.is_active(vi) || diag == 0.0 {
                        return None;
                    }
                    Some((vi, (b[vi] - view.off_diagonal_product(v, x_read)) / diag))
                })
            })
            .collect();

        for (vi, value) in updates {
            x[vi] = value;
        }
    }
}
