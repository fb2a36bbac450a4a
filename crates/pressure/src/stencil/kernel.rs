//! Matrix-vector kernels for the stored stencil layouts.

use rayon::prelude::*;

use super::StencilMatrix;
use crate::grid::{FlagGrid, GridSize};
use crate::Real;

/// Stencil application rule, fixed when a system is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilKernel {
    /// 5-point operator, `ak` unused
    Laplace2d,
    /// 7-point operator
    Laplace3d,
}

impl StencilKernel {
    pub fn for_size(size: GridSize) -> Self {
        if size.is_3d() {
            Self::Laplace3d
        } else {
            Self::Laplace2d
        }
    }

    /// `dst = A * src`. Rows of non-fluid cells are written as zero.
    pub fn apply(self, m: &StencilMatrix, flags: &FlagGrid, src: &[Real], dst: &mut [Real]) {
        let size = m.size();
        let (nx, ny, nz) = (size.nx, size.ny, size.nz);
        let sx = 1;
        let sy = nx;
        let sz = nx * ny;

        dst.par_iter_mut().enumerate().for_each(|(idx, out)| {
            if !flags.is_fluid(idx) {
                *out = 0.0;
                return;
            }
            let i = idx % nx;
            let j = (idx / nx) % ny;

            let mut sum = m.a0[idx] * src[idx];
            if i > 0 {
                sum += m.ai[idx - sx] * src[idx - sx];
            }
            if i + 1 < nx {
                sum += m.ai[idx] * src[idx + sx];
            }
            if j > 0 {
                sum += m.aj[idx - sy] * src[idx - sy];
            }
            if j + 1 < ny {
                sum += m.aj[idx] * src[idx + sy];
            }
            if self == Self::Laplace3d {
                let k = idx / sz;
                if k > 0 {
                    sum += m.ak[idx - sz] * src[idx - sz];
                }
                if k + 1 < nz {
                    sum += m.ak[idx] * src[idx + sz];
                }
            }
            *out = sum;
        });
    }

    #[inline]
    pub fn diagonal(self, m: &StencilMatrix, idx: usize) -> Real {
        m.a0[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellFlags;
    use crate::stencil::make_laplace_matrix;

    #[test]
    fn test_kernel_selection() {
        assert_eq!(StencilKernel::for_size(GridSize::planar(8, 8)), StencilKernel::Laplace2d);
        assert_eq!(StencilKernel::for_size(GridSize::new(8, 8, 2)), StencilKernel::Laplace3d);
    }

    #[test]
    fn test_apply_constant_in_closed_box_is_zero() {
        let flags = FlagGrid::filled_fluid(GridSize::new(5, 4, 3));
        let m = make_laplace_matrix(&flags, None).unwrap();
        let src = vec![2.0; 60];
        let mut dst = vec![1.0; 60];
        m.kernel().apply(&m, &flags, &src, &mut dst);
        assert!(dst.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_apply_zeroes_non_fluid_rows() {
        let size = GridSize::planar(3, 3);
        let mut flags = FlagGrid::filled_fluid(size);
        flags.set(1, 1, 0, CellFlags::OBSTACLE);
        let m = make_laplace_matrix(&flags, None).unwrap();
        let src = vec![1.0; 9];
        let mut dst = vec![7.0; 9];
        m.kernel().apply(&m, &flags, &src, &mut dst);
        assert_eq!(dst[size.index(1, 1, 0)], 0.0);
    }
}
