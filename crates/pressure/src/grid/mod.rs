//! Grid collaborators: extent and indexing, cell flags, staggered velocity.
//!
//! Cell (i, j, k) has linear index `i + nx * (j + ny * k)`. A grid with
//! `nz == 1` is planar and every 3-D-only code path is skipped.

mod flags;
mod mac;

pub use flags::{CellFlags, FlagGrid};
pub use mac::{Axis, MacGrid};

use glam::IVec3;
use serde::{Deserialize, Serialize};

use crate::error::{ProjectionError, ProjectionResult};

/// Extent of a regular voxel grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl GridSize {
    /// Create a volumetric extent.
    ///
    /// # Panics
    ///
    /// Panics if any axis is zero. Use [`try_new`](Self::try_new) for extents
    /// that come from user input.
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        match Self::try_new(nx, ny, nz) {
            Ok(size) => size,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_new(nx: usize, ny: usize, nz: usize) -> ProjectionResult<Self> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(ProjectionError::EmptyExtent { nx, ny, nz });
        }
        Ok(Self { nx, ny, nz })
    }

    /// Create a planar extent (nz = 1).
    ///
    /// # Panics
    ///
    /// Panics if `nx` or `ny` is zero.
    pub fn planar(nx: usize, ny: usize) -> Self {
        Self::new(nx, ny, 1)
    }

    #[inline]
    pub fn is_3d(&self) -> bool {
        self.nz > 1
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Largest axis length.
    pub fn max_extent(&self) -> usize {
        self.nx.max(self.ny).max(self.nz)
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.nx * (j + self.ny * k)
    }

    /// Linear index of an in-bounds position.
    #[inline]
    pub fn index_of(&self, p: IVec3) -> usize {
        debug_assert!(self.contains(p), "position {:?} outside {:?}", p, self);
        self.index(p.x as usize, p.y as usize, p.z as usize)
    }

    /// Position of a linear index.
    #[inline]
    pub fn position(&self, idx: usize) -> IVec3 {
        let i = idx % self.nx;
        let j = (idx / self.nx) % self.ny;
        let k = idx / (self.nx * self.ny);
        IVec3::new(i as i32, j as i32, k as i32)
    }

    #[inline]
    pub fn contains(&self, p: IVec3) -> bool {
        p.x >= 0
            && p.y >= 0
            && p.z >= 0
            && (p.x as usize) < self.nx
            && (p.y as usize) < self.ny
            && (p.z as usize) < self.nz
    }

    /// Extent as a signed vector (for clamping positions).
    pub fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.nx as i32, self.ny as i32, self.nz as i32)
    }

    /// Linear offset of a neighbour direction.
    #[inline]
    pub fn offset(&self, d: IVec3) -> isize {
        d.x as isize + self.nx as isize * (d.y as isize + self.ny as isize * d.z as isize)
    }

    /// Extent of the next coarser multigrid level: `ceil((n + 2) / 2)` per axis.
    pub fn coarsened(&self) -> Self {
        let coarsen = |n: usize| (n + 2).div_ceil(2);
        Self {
            nx: coarsen(self.nx),
            ny: coarsen(self.ny),
            nz: if self.is_3d() { coarsen(self.nz) } else { 1 },
        }
    }
}

impl std::fmt::Display for GridSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_3d() {
            write!(f, "{}x{}x{}", self.nx, self.ny, self.nz)
        } else {
            write!(f, "{}x{}", self.nx, self.ny)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_position_roundtrip() {
        let size = GridSize::new(5, 4, 3);
        for idx in 0..size.cell_count() {
            assert_eq!(size.index_of(size.position(idx)), idx);
        }
        assert_eq!(size.index(1, 2, 1), 1 + 5 * (2 + 4));
    }

    #[test]
    fn test_offset_matches_index() {
        let size = GridSize::new(6, 5, 4);
        let p = IVec3::new(2, 2, 2);
        let base = size.index_of(p) as isize;
        for d in [IVec3::X, IVec3::NEG_Y, IVec3::new(1, -1, 1)] {
            assert_eq!(base + size.offset(d), size.index_of(p + d) as isize);
        }
    }

    #[test]
    fn test_coarsened_extent() {
        assert_eq!(GridSize::new(16, 16, 16).coarsened(), GridSize::new(9, 9, 9));
        assert_eq!(GridSize::new(15, 8, 3).coarsened(), GridSize::new(9, 5, 3));
        // Planar grids stay planar.
        assert_eq!(GridSize::planar(32, 20).coarsened(), GridSize::planar(17, 11));
    }

    #[test]
    fn test_try_new_rejects_empty_axis() {
        assert!(matches!(
            GridSize::try_new(4, 0, 2),
            Err(ProjectionError::EmptyExtent { nx: 4, ny: 0, nz: 2 })
        ));
        assert_eq!(GridSize::try_new(4, 3, 1).unwrap(), GridSize::planar(4, 3));
    }

    #[test]
    #[should_panic(expected = "grid extent must be positive")]
    fn test_new_panics_on_empty_axis() {
        GridSize::new(0, 3, 3);
    }

    #[test]
    fn test_contains() {
        let size = GridSize::planar(4, 4);
        assert!(size.contains(IVec3::new(3, 3, 0)));
        assert!(!size.contains(IVec3::new(4, 0, 0)));
        assert!(!size.contains(IVec3::new(0, -1, 0)));
        assert!(!size.contains(IVec3::new(0, 0, 1)));
    }
}
