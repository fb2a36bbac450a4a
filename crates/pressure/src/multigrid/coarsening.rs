//! Coarse vertex selection.
//!
//! Every active fine vertex needs at least one active coarse vertex among its
//! interpolation candidates, or the interpolation loses rank. Vertices are
//! processed fewest-free-candidates first: the first free candidate of the
//! popped vertex is selected and its other free candidates are removed.

use glam::IVec3;

use super::heap::BucketQueue;
use super::level::{coarse_candidates, LevelView, VertexType};
use crate::grid::GridSize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CoarseState {
    Free,
    Selected,
    Removed,
}

/// Fine vertices whose candidate set contains coarse vertex `c`.
fn fine_footprint(c: IVec3, fine: GridSize) -> impl Iterator<Item = IVec3> {
    let lo = (c * 2 - IVec3::ONE).max(IVec3::ZERO);
    let hi = (c * 2 + IVec3::ONE).min(fine.as_ivec3() - IVec3::ONE);
    (lo.z..=hi.z).flat_map(move |z| {
        (lo.y..=hi.y).flat_map(move |y| (lo.x..=hi.x).map(move |x| IVec3::new(x, y, z)))
    })
}

/// Classify the vertices of the level coarser than `fine`.
pub(crate) fn gen_coarse_grid(fine: LevelView<'_>, coarse: GridSize) -> Vec<VertexType> {
    let fsize = fine.size;
    let is_3d = fsize.is_3d();
    let mut state = vec![CoarseState::Free; coarse.cell_count()];
    let mut queue = BucketQueue::new(fsize.cell_count(), if is_3d { 8 } else { 4 });

    for vi in 0..fsize.cell_count() {
        if fine.is_active(vi) {
            let key = coarse_candidates(fsize.position(vi), is_3d).count();
            queue.insert(vi, key);
        }
    }
    let queued = queue.len();

    let mut changed = Vec::with_capacity(8);
    while let Some((vi, _)) = queue.pop_min() {
        changed.clear();
        let mut selected = false;
        for c in coarse_candidates(fsize.position(vi), is_3d) {
            let ci = coarse.index_of(c);
            if state[ci] != CoarseState::Free {
                continue;
            }
            state[ci] = if selected {
                CoarseState::Removed
            } else {
                selected = true;
                CoarseState::Selected
            };
            changed.push(c);
        }

        for &c in &changed {
            for r in fine_footprint(c, fsize) {
                let ri = fsize.index_of(r);
                match queue.key(ri) {
                    Some(key) if key > 1 => queue.set_key(ri, key - 1),
                    Some(_) => queue.remove(ri),
                    None => {}
                }
            }
        }
    }

    let vtype: Vec<VertexType> = state
        .into_iter()
        .map(|s| match s {
            CoarseState::Selected => VertexType::Active,
            CoarseState::Free | CoarseState::Removed => VertexType::Inactive,
        })
        .collect();
    log::debug!(
        "Multigrid coarsening {} -> {}: {} of {} fine vertices active, {} coarse selected",
        fsize,
        coarse,
        queued,
        fsize.cell_count(),
        vtype.iter().filter(|t| t.is_active()).count()
    );
    vtype
}
