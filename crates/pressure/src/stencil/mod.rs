//! Symmetric 7-point (5-point in 2-D) Poisson operator stored per cell.
//!
//! Each cell keeps its diagonal `a0` plus the links to its +x, +y and +z
//! neighbours. The link to the -x neighbour is read from that neighbour's
//! `ai`, which is what makes the operator symmetric by construction.

mod assembly;
pub mod ghost_fluid;
mod kernel;

pub use assembly::{find_pinned_cell, fix_pressure, make_laplace_matrix};
pub use ghost_fluid::apply_ghost_fluid_diagonal;
pub use kernel::StencilKernel;

use crate::error::{try_zeroed, ProjectionError, ProjectionResult};
use crate::grid::{Axis, FlagGrid, GridSize};
use crate::Real;

/// Per-cell stencil coefficients of one grid level.
#[derive(Clone, Debug, PartialEq)]
pub struct StencilMatrix {
    size: GridSize,
    pub a0: Vec<Real>,
    pub ai: Vec<Real>,
    pub aj: Vec<Real>,
    pub ak: Vec<Real>,
}

impl StencilMatrix {
    /// All-zero matrix for `size`.
    pub fn zeroed(size: GridSize) -> ProjectionResult<Self> {
        let n = size.cell_count();
        Ok(Self {
            size,
            a0: try_zeroed("stencil a0", n)?,
            ai: try_zeroed("stencil ai", n)?,
            aj: try_zeroed("stencil aj", n)?,
            ak: try_zeroed("stencil ak", n)?,
        })
    }

    /// Wrap caller-provided buffers, rejecting malformed shapes.
    pub fn from_parts(
        size: GridSize,
        a0: Vec<Real>,
        ai: Vec<Real>,
        aj: Vec<Real>,
        ak: Vec<Real>,
    ) -> ProjectionResult<Self> {
        let matrix = Self {
            size,
            a0,
            ai,
            aj,
            ak,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn is_3d(&self) -> bool {
        self.size.is_3d()
    }

    pub fn kernel(&self) -> StencilKernel {
        StencilKernel::for_size(self.size)
    }

    pub fn validate(&self) -> ProjectionResult<()> {
        let n = self.size.cell_count();
        for (buffer, values) in [
            ("a0", &self.a0),
            ("ai", &self.ai),
            ("aj", &self.aj),
            ("ak", &self.ak),
        ] {
            if values.len() != n {
                return Err(ProjectionError::StencilShape {
                    buffer,
                    expected: n,
                    found: values.len(),
                });
            }
        }
        if !self.size.is_3d() {
            if let Some((cell, &value)) = self.ak.iter().enumerate().find(|&(_, &v)| v != 0.0) {
                return Err(ProjectionError::PlanarStencil { cell, value });
            }
        }
        Ok(())
    }

    /// Link from `idx` to its upper neighbour along `axis`.
    #[inline]
    pub fn link(&self, idx: usize, axis: Axis) -> Real {
        match axis {
            Axis::X => self.ai[idx],
            Axis::Y => self.aj[idx],
            Axis::Z => self.ak[idx],
        }
    }

    pub fn link_mut(&mut self, axis: Axis) -> &mut [Real] {
        match axis {
            Axis::X => &mut self.ai,
            Axis::Y => &mut self.aj,
            Axis::Z => &mut self.ak,
        }
    }

    /// Matrix entry `A[row][col]`; zero unless the cells are equal or face neighbours.
    pub fn coefficient(&self, row: usize, col: usize) -> Real {
        if row == col {
            return self.a0[row];
        }
        let (lo, hi) = (row.min(col), row.max(col));
        let p = self.size.position(lo);
        let q = self.size.position(hi);
        for &axis in Axis::active(self.size) {
            if p + axis.unit() == q {
                return self.link(lo, axis);
            }
        }
        0.0
    }

    /// `dst = A * src` over fluid cells (non-fluid rows are zero).
    pub fn apply(&self, flags: &FlagGrid, src: &[Real], dst: &mut [Real]) {
        self.kernel().apply(self, flags, src, dst);
    }
}

/// True when every fluid row of the operator sums to zero, i.e. the system
/// carries the constant null space and nothing anchors the pressure.
pub fn row_sums_vanish(matrix: &StencilMatrix, flags: &FlagGrid) -> bool {
    let size = matrix.size();
    let mut any_row = false;
    for idx in 0..size.cell_count() {
        if !flags.is_fluid(idx) || matrix.a0[idx] == 0.0 {
            continue;
        }
        any_row = true;
        let p = size.position(idx);
        let mut sum = matrix.a0[idx];
        for &axis in Axis::active(size) {
            let e = axis.unit();
            if size.contains(p + e) {
                sum += matrix.link(idx, axis);
            }
            if size.contains(p - e) {
                sum += matrix.link(size.index_of(p - e), axis);
            }
        }
        if sum.abs() > 1e-10 * matrix.a0[idx].abs() {
            return false;
        }
    }
    any_row
}

/// A matrix paired with the flags selecting its rows, ready for the solvers.
#[derive(Clone, Copy, Debug)]
pub struct StencilSystem<'a> {
    pub matrix: &'a StencilMatrix,
    pub flags: &'a FlagGrid,
    kernel: StencilKernel,
}

impl<'a> StencilSystem<'a> {
    pub fn new(matrix: &'a StencilMatrix, flags: &'a FlagGrid) -> ProjectionResult<Self> {
        matrix.validate()?;
        ProjectionError::check_len(
            "flags",
            matrix.size().cell_count(),
            flags.size().cell_count(),
        )?;
        Ok(Self {
            matrix,
            flags,
            kernel: matrix.kernel(),
        })
    }

    pub fn size(&self) -> GridSize {
        self.matrix.size()
    }

    pub fn kernel(&self) -> StencilKernel {
        self.kernel
    }

    #[inline]
    pub fn apply(&self, src: &[Real], dst: &mut [Real]) {
        self.kernel.apply(self.matrix, self.flags, src, dst);
    }

    #[inline]
    pub fn diagonal(&self, idx: usize) -> Real {
        self.kernel.diagonal(self.matrix, idx)
    }

    /// `r = b - A x` over fluid cells, zero elsewhere.
    pub fn residual(&self, x: &[Real], b: &[Real], r: &mut [Real]) {
        self.apply(x, r);
        for (idx, (r, &b)) in r.iter_mut().zip(b).enumerate() {
            *r = if self.flags.is_fluid(idx) { b - *r } else { 0.0 };
        }
    }
}
