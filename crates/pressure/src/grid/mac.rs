//! Staggered (MAC) face storage.
//!
//! Face `(i, j, k)` of axis X sits on the low-x side of cell `(i, j, k)`, so
//! `u` holds `(nx+1)·ny·nz` values and the face between cells `i-1` and `i`
//! is `u[i]`. V and W follow the same convention. Planar grids keep `w` empty.
//!
//! The same type carries velocities and per-face obstacle coverage fractions.

use glam::IVec3;

use super::GridSize;
use crate::Real;

/// Velocity component / face orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Unit step along this axis.
    pub fn unit(self) -> IVec3 {
        match self {
            Axis::X => IVec3::X,
            Axis::Y => IVec3::Y,
            Axis::Z => IVec3::Z,
        }
    }

    /// Axes present for a grid extent (Z only in 3-D).
    pub fn active(size: GridSize) -> &'static [Axis] {
        if size.is_3d() {
            &Self::ALL
        } else {
            &Self::ALL[..2]
        }
    }
}

#[derive(Clone, Debug)]
pub struct MacGrid {
    size: GridSize,
    pub u: Vec<Real>,
    pub v: Vec<Real>,
    pub w: Vec<Real>,
}

impl MacGrid {
    pub fn new(size: GridSize) -> Self {
        Self::filled(size, 0.0)
    }

    /// All faces set to `value` (e.g. 1.0 for fully open fractions).
    pub fn filled(size: GridSize, value: Real) -> Self {
        let w_len = if size.is_3d() {
            size.nx * size.ny * (size.nz + 1)
        } else {
            0
        };
        Self {
            size,
            u: vec![value; (size.nx + 1) * size.ny * size.nz],
            v: vec![value; size.nx * (size.ny + 1) * size.nz],
            w: vec![value; w_len],
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn is_3d(&self) -> bool {
        self.size.is_3d()
    }

    // ========== Face indexing ==========

    #[inline]
    pub fn u_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + (self.size.nx + 1) * (j + self.size.ny * k)
    }

    #[inline]
    pub fn v_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.size.nx * (j + (self.size.ny + 1) * k)
    }

    #[inline]
    pub fn w_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.size.nx * (j + self.size.ny * k)
    }

    /// Index of the low-side face of cell `p` along `axis`. `p` may sit one
    /// past the last cell on that axis (the far boundary face).
    #[inline]
    pub fn face_index(&self, axis: Axis, p: IVec3) -> usize {
        let (i, j, k) = (p.x as usize, p.y as usize, p.z as usize);
        match axis {
            Axis::X => self.u_index(i, j, k),
            Axis::Y => self.v_index(i, j, k),
            Axis::Z => self.w_index(i, j, k),
        }
    }

    pub fn component(&self, axis: Axis) -> &[Real] {
        match axis {
            Axis::X => &self.u,
            Axis::Y => &self.v,
            Axis::Z => &self.w,
        }
    }

    pub fn component_mut(&mut self, axis: Axis) -> &mut [Real] {
        match axis {
            Axis::X => &mut self.u,
            Axis::Y => &mut self.v,
            Axis::Z => &mut self.w,
        }
    }

    /// Expected length of each component for this extent.
    pub fn component_len(size: GridSize, axis: Axis) -> usize {
        match axis {
            Axis::X => (size.nx + 1) * size.ny * size.nz,
            Axis::Y => size.nx * (size.ny + 1) * size.nz,
            Axis::Z if size.is_3d() => size.nx * size.ny * (size.nz + 1),
            Axis::Z => 0,
        }
    }

    /// Inverse of `face_index` for a component of a grid of extent `size`.
    #[inline]
    pub fn face_position(size: GridSize, axis: Axis, fi: usize) -> IVec3 {
        let (fx, fy) = match axis {
            Axis::X => (size.nx + 1, size.ny),
            Axis::Y => (size.nx, size.ny + 1),
            Axis::Z => (size.nx, size.ny),
        };
        IVec3::new((fi % fx) as i32, ((fi / fx) % fy) as i32, (fi / (fx * fy)) as i32)
    }

    #[inline]
    pub fn face(&self, axis: Axis, p: IVec3) -> Real {
        self.component(axis)[self.face_index(axis, p)]
    }

    #[inline]
    pub fn set_face(&mut self, axis: Axis, p: IVec3, value: Real) {
        let idx = self.face_index(axis, p);
        self.component_mut(axis)[idx] = value;
    }

    // ========== Diagnostics ==========

    /// Net outflow of cell `p`: sum over axes of (high face - low face).
    pub fn divergence_at(&self, p: IVec3) -> Real {
        Axis::active(self.size)
            .iter()
            .map(|&axis| self.face(axis, p + axis.unit()) - self.face(axis, p))
            .sum()
    }

    pub fn max_abs(&self) -> Real {
        self.u
            .iter()
            .chain(&self.v)
            .chain(&self.w)
            .fold(0.0, |m: Real, &x| m.max(x.abs()))
    }
}
