//! Per-level storage and the read-only view handed to the kernels.
//!
//! Level 0 stores `{centre, +x, +y, +z}` per vertex. Coarser levels store the
//! upper half of the 27-point (9-point in 2-D) stencil at slot
//! `d.x + 3 d.y + 9 d.z`; the coefficient for a lower offset lives at the
//! neighbour under the negated offset.

use glam::IVec3;

use crate::constants::*;
use crate::error::{try_zeroed, ProjectionResult};
use crate::grid::GridSize;
use crate::Real;

/// Participation of a vertex in the level's system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VertexType {
    /// Excluded; never visited by any kernel
    #[default]
    Inactive,
    Active,
    /// Active with no neighbour coupling (`x = b`), diagonal rescaled
    ActiveTrivial,
}

impl VertexType {
    #[inline]
    pub fn is_active(self) -> bool {
        !matches!(self, VertexType::Inactive)
    }
}

/// Coefficient layout of a level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StencilLayout {
    /// Centre plus +x/+y(/+z) links
    Axis,
    /// Upper half of the full box stencil
    Box,
}

/// Linear key of a box offset; non-negative keys are stored at the vertex.
#[inline]
pub(crate) fn offset_key(d: IVec3) -> i32 {
    d.x + 3 * d.y + 9 * d.z
}

/// Transfer weight of offset `s` from a coarse vertex's fine image `2V`.
#[inline]
pub(crate) fn transfer_weight(s: IVec3) -> Real {
    let odd = (s.x != 0) as i32 + (s.y != 0) as i32 + (s.z != 0) as i32;
    1.0 / (1 << odd) as Real
}

/// Coarse vertices whose transfer footprint contains fine vertex `u`.
pub(crate) fn coarse_candidates(u: IVec3, is_3d: bool) -> impl Iterator<Item = IVec3> {
    let axis = |c: i32| -> (i32, i32) {
        if c % 2 == 0 {
            (c / 2, c / 2)
        } else {
            ((c - 1) / 2, (c + 1) / 2)
        }
    };
    let (x0, x1) = axis(u.x);
    let (y0, y1) = axis(u.y);
    let (z0, z1) = if is_3d { axis(u.z) } else { (0, 0) };
    (z0..=z1).flat_map(move |z| (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| IVec3::new(x, y, z))))
}

/// Offsets in `[-1, 1]` per axis (z fixed at 0 when planar), z-y-x order.
pub(crate) fn box_offsets(is_3d: bool, include_centre: bool) -> Vec<IVec3> {
    let zr = if is_3d { -1..=1 } else { 0..=0 };
    let mut out = Vec::with_capacity(27);
    for z in zr {
        for y in -1..=1 {
            for x in -1..=1 {
                let d = IVec3::new(x, y, z);
                if include_centre || d != IVec3::ZERO {
                    out.push(d);
                }
            }
        }
    }
    out
}

fn axis_offsets(is_3d: bool) -> Vec<IVec3> {
    let mut out = vec![IVec3::NEG_X, IVec3::X, IVec3::NEG_Y, IVec3::Y];
    if is_3d {
        out.extend([IVec3::NEG_Z, IVec3::Z]);
    }
    out
}

pub(crate) struct Level {
    pub size: GridSize,
    pub layout: StencilLayout,
    pub width: usize,
    /// Non-centre offsets of the full (both-sided) stencil
    pub neighbours: Vec<IVec3>,
    pub stencil: Vec<Real>,
    pub vtype: Vec<VertexType>,
    pub x: Vec<Real>,
    pub b: Vec<Real>,
    pub r: Vec<Real>,
}

impl Level {
    pub fn new(size: GridSize, layout: StencilLayout) -> ProjectionResult<Self> {
        let n = size.cell_count();
        let is_3d = size.is_3d();
        let (width, neighbours) = match layout {
            StencilLayout::Axis => (
                if is_3d { FINE_STENCIL_3D } else { FINE_STENCIL_2D },
                axis_offsets(is_3d),
            ),
            StencilLayout::Box => (
                if is_3d { COARSE_STENCIL_3D } else { COARSE_STENCIL_2D },
                box_offsets(is_3d, false),
            ),
        };
        Ok(Self {
            size,
            layout,
            width,
            neighbours,
            stencil: try_zeroed("multigrid stencil", n * width)?,
            vtype: try_zeroed("multigrid vertex types", n)?,
            x: try_zeroed("multigrid unknowns", n)?,
            b: try_zeroed("multigrid rhs", n)?,
            r: try_zeroed("multigrid residual", n)?,
        })
    }

    pub fn view(&self) -> LevelView<'_> {
        LevelView {
            size: self.size,
            layout: self.layout,
            width: self.width,
            neighbours: &self.neighbours,
            stencil: &self.stencil,
            vtype: &self.vtype,
        }
    }

    /// Operator view plus mutable `x`, `b`, `r`.
    pub fn parts(&mut self) -> (LevelView<'_>, &mut [Real], &mut [Real], &mut [Real]) {
        let Level {
            size,
            layout,
            width,
            neighbours,
            stencil,
            vtype,
            x,
            b,
            r,
        } = self;
        let view = LevelView {
            size: *size,
            layout: *layout,
            width: *width,
            neighbours: neighbours.as_slice(),
            stencil: stencil.as_slice(),
            vtype: vtype.as_slice(),
        };
        (view, x.as_mut_slice(), b.as_mut_slice(), r.as_mut_slice())
    }
}

/// Read-only view of a level's operator.
#[derive(Clone, Copy)]
pub(crate) struct LevelView<'a> {
    pub size: GridSize,
    pub layout: StencilLayout,
    pub width: usize,
    pub neighbours: &'a [IVec3],
    pub stencil: &'a [Real],
    pub vtype: &'a [VertexType],
}

impl<'a> LevelView<'a> {
    /// Slot of an offset stored at its own vertex, if any.
    #[inline]
    pub fn upper_slot(&self, d: IVec3) -> Option<usize> {
        match self.layout {
            StencilLayout::Axis => match (d.x, d.y, d.z) {
                (0, 0, 0) => Some(0),
                (1, 0, 0) => Some(1),
                (0, 1, 0) => Some(2),
                (0, 0, 1) => Some(3),
                _ => None,
            },
            StencilLayout::Box => {
                let key = offset_key(d);
                (key >= 0).then_some(key as usize)
            }
        }
    }

    /// Vertex and slot holding the coefficient between `v` and `v + d`.
    #[inline]
    pub fn owner(&self, v: IVec3, d: IVec3) -> (IVec3, usize) {
        match self.upper_slot(d) {
            Some(slot) => (v, slot),
            None => {
                let slot = self.upper_slot(-d).unwrap_or(0);
                (v + d, slot)
            }
        }
    }

    /// `A[v][v + d]`; `v + d` must lie inside the level.
    #[inline]
    pub fn coeff(&self, v: IVec3, d: IVec3) -> Real {
        let (owner, slot) = self.owner(v, d);
        self.stencil[self.size.index_of(owner) * self.width + slot]
    }

    #[inline]
    pub fn diagonal(&self, vi: usize) -> Real {
        self.stencil[vi * self.width]
    }

    #[inline]
    pub fn is_active(&self, vi: usize) -> bool {
        self.vtype[vi].is_active()
    }

    /// Sum of `A[v][v + d] * x[v + d]` over active in-bounds neighbours, centre excluded.
    #[inline]
    pub fn off_diagonal_product(&self, v: IVec3, x: &[Real]) -> Real {
        let mut sum = 0.0;
        for &d in self.neighbours {
            let n = v + d;
            if !self.size.contains(n) {
                continue;
            }
            let ni = self.size.index_of(n);
            if self.vtype[ni].is_active() {
                sum += self.coeff(v, d) * x[ni];
            }
        }
        sum
    }

    /// Row `vi` of `A x`.
    #[inline]
    pub fn row_product(&self, v: IVec3, vi: usize, x: &[Real]) -> Real {
        self.diagonal(vi) * x[vi] + self.off_diagonal_product(v, x)
    }

    /// Sum of the row's coefficients over active neighbours.
    pub fn row_sum(&self, v: IVec3, vi: usize) -> Real {
        let mut sum = self.diagonal(vi);
        for &d in self.neighbours {
            let n = v + d;
            if self.size.contains(n) && self.vtype[self.size.index_of(n)].is_active() {
                sum += self.coeff(v, d);
            }
        }
        sum
    }
}
