//! Per-cell classification.

use bitflags::bitflags;
use glam::IVec3;

use super::GridSize;

bitflags! {
    /// Cell type bits. Boundary cells combine bits, e.g. `EMPTY | OUTFLOW`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u8 {
        /// Contains fluid, takes part in the pressure solve
        const FLUID = 1 << 0;
        /// Solid obstacle, Neumann boundary
        const OBSTACLE = 1 << 1;
        /// Air, Dirichlet boundary (p = 0)
        const EMPTY = 1 << 2;
        /// Prescribed inflow
        const INFLOW = 1 << 3;
        /// Outflow boundary, face velocities are left untouched
        const OUTFLOW = 1 << 4;
        /// Open domain boundary
        const OPEN = 1 << 5;
    }
}

/// Cell flags over a grid. Positions outside the grid read as obstacle.
#[derive(Clone, Debug)]
pub struct FlagGrid {
    size: GridSize,
    flags: Vec<CellFlags>,
}

impl FlagGrid {
    /// Create a grid with every cell set to `fill`.
    pub fn new(size: GridSize, fill: CellFlags) -> Self {
        Self {
            size,
            flags: vec![fill; size.cell_count()],
        }
    }

    /// Create an all-fluid grid.
    pub fn filled_fluid(size: GridSize) -> Self {
        Self::new(size, CellFlags::FLUID)
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn is_3d(&self) -> bool {
        self.size.is_3d()
    }

    pub fn as_slice(&self) -> &[CellFlags] {
        &self.flags
    }

    /// Flags at a position; out-of-domain positions are obstacles.
    #[inline]
    pub fn at(&self, p: IVec3) -> CellFlags {
        if self.size.contains(p) {
            self.flags[self.size.index_of(p)]
        } else {
            CellFlags::OBSTACLE
        }
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, flags: CellFlags) {
        let idx = self.size.index(i, j, k);
        self.flags[idx] = flags;
    }

    pub fn set_index(&mut self, idx: usize, flags: CellFlags) {
        self.flags[idx] = flags;
    }

    // ========== Predicates by index ==========

    #[inline]
    pub fn is_fluid(&self, idx: usize) -> bool {
        self.flags[idx].contains(CellFlags::FLUID)
    }

    #[inline]
    pub fn is_obstacle(&self, idx: usize) -> bool {
        self.flags[idx].contains(CellFlags::OBSTACLE)
    }

    #[inline]
    pub fn is_empty(&self, idx: usize) -> bool {
        self.flags[idx].contains(CellFlags::EMPTY)
    }

    #[inline]
    pub fn is_outflow(&self, idx: usize) -> bool {
        self.flags[idx].contains(CellFlags::OUTFLOW)
    }

    // ========== Predicates by position ==========

    #[inline]
    pub fn is_fluid_at(&self, p: IVec3) -> bool {
        self.at(p).contains(CellFlags::FLUID)
    }

    #[inline]
    pub fn is_obstacle_at(&self, p: IVec3) -> bool {
        self.at(p).contains(CellFlags::OBSTACLE)
    }

    #[inline]
    pub fn is_empty_at(&self, p: IVec3) -> bool {
        self.at(p).contains(CellFlags::EMPTY)
    }

    #[inline]
    pub fn is_outflow_at(&self, p: IVec3) -> bool {
        self.at(p).contains(CellFlags::OUTFLOW)
    }

    /// Number of cells carrying the EMPTY bit (pressure anchors).
    pub fn count_empty(&self) -> usize {
        self.flags
            .iter()
            .filter(|f| f.contains(CellFlags::EMPTY))
            .count()
    }

    /// True when some EMPTY or OPEN cell fixes the pressure level.
    pub fn has_pressure_anchor(&self) -> bool {
        self.flags
            .iter()
            .any(|f| f.intersects(CellFlags::EMPTY | CellFlags::OPEN))
    }

    pub fn count_fluid(&self) -> usize {
        self.flags
            .iter()
            .filter(|f| f.contains(CellFlags::FLUID))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_domain_is_obstacle() {
        let flags = FlagGrid::filled_fluid(GridSize::new(3, 3, 3));
        assert!(flags.is_fluid_at(IVec3::new(1, 1, 1)));
        assert!(flags.is_obstacle_at(IVec3::new(-1, 1, 1)));
        assert!(flags.is_obstacle_at(IVec3::new(1, 3, 1)));
        assert!(!flags.is_fluid_at(IVec3::new(1, 1, 3)));
    }

    #[test]
    fn test_combined_flags() {
        let mut flags = FlagGrid::filled_fluid(GridSize::planar(4, 4));
        flags.set(3, 0, 0, CellFlags::EMPTY | CellFlags::OUTFLOW);
        let idx = flags.size().index(3, 0, 0);
        assert!(flags.is_empty(idx));
        assert!(flags.is_outflow(idx));
        assert!(!flags.is_fluid(idx));
        assert_eq!(flags.count_empty(), 1);
        assert!(flags.has_pressure_anchor());
        assert!(!FlagGrid::filled_fluid(GridSize::planar(2, 2)).has_pressure_anchor());
        assert_eq!(flags.count_fluid(), 15);
    }
}
