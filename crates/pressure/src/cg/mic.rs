//! Modified incomplete Cholesky factor, MIC(0).
//!
//! Stored as the inverse pivot per cell plus the three scaled upper links
//! `l = a_link * precon`. Factorisation and substitution are sequential since
//! each cell depends on its lower neighbours.

use crate::constants::{MIC_SAFETY, MIC_TUNING};
use crate::error::{try_zeroed, ProjectionError, ProjectionResult};
use crate::grid::{FlagGrid, GridSize};
use crate::stencil::StencilMatrix;
use crate::Real;

/// Caller-owned preconditioner buffers.
#[derive(Clone, Debug)]
pub struct MicFactor {
    size: GridSize,
    pub precon: Vec<Real>,
    pub lx: Vec<Real>,
    pub ly: Vec<Real>,
    pub lz: Vec<Real>,
}

impl MicFactor {
    pub fn new(size: GridSize) -> ProjectionResult<Self> {
        let n = size.cell_count();
        Ok(Self {
            size,
            precon: try_zeroed("mic precon", n)?,
            lx: try_zeroed("mic lx", n)?,
            ly: try_zeroed("mic ly", n)?,
            lz: try_zeroed("mic lz", n)?,
        })
    }

    /// Allocate and factor in one step.
    pub fn build(matrix: &StencilMatrix, flags: &FlagGrid) -> ProjectionResult<Self> {
        let mut factor = Self::new(matrix.size())?;
        factor.factor(matrix, flags)?;
        Ok(factor)
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    /// Recompute the factor for `matrix`, reusing the buffers.
    pub fn factor(&mut self, matrix: &StencilMatrix, flags: &FlagGrid) -> ProjectionResult<()> {
        let size = matrix.size();
        ProjectionError::check_len("mic factor", size.cell_count(), self.size.cell_count())?;
        ProjectionError::check_len("flags", size.cell_count(), flags.size().cell_count())?;

        let (nx, ny, nz) = (size.nx, size.ny, size.nz);
        let (sy, sz) = (nx, nx * ny);
        let m = matrix;

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let idx = size.index(i, j, k);
                    self.precon[idx] = 0.0;
                    self.lx[idx] = 0.0;
                    self.ly[idx] = 0.0;
                    self.lz[idx] = 0.0;

                    let diag = m.a0[idx];
                    if !flags.is_fluid(idx) || diag <= 0.0 {
                        continue;
                    }

                    let mut e = diag;
                    let mut fill = 0.0;
                    if i > 0 {
                        let n = idx - 1;
                        e -= self.lx[n] * self.lx[n];
                        fill += self.lx[n] * (m.aj[n] + m.ak[n]) * self.precon[n];
                    }
                    if j > 0 {
                        let n = idx - sy;
                        e -= self.ly[n] * self.ly[n];
                        fill += self.ly[n] * (m.ai[n] + m.ak[n]) * self.precon[n];
                    }
                    if k > 0 {
                        let n = idx - sz;
                        e -= self.lz[n] * self.lz[n];
                        fill += self.lz[n] * (m.ai[n] + m.aj[n]) * self.precon[n];
                    }
                    e -= MIC_TUNING * fill;
                    if e < MIC_SAFETY * diag {
                        e = diag;
                    }

                    let precon = 1.0 / e.sqrt();
                    self.precon[idx] = precon;
                    self.lx[idx] = m.ai[idx] * precon;
                    self.ly[idx] = m.aj[idx] * precon;
                    self.lz[idx] = m.ak[idx] * precon;
                }
            }
        }
        Ok(())
    }

    /// `z = (L L^T)^-1 r` by forward then backward substitution.
    pub fn apply(&self, flags: &FlagGrid, r: &[Real], z: &mut [Real]) {
        let size = self.size;
        let (nx, ny, nz) = (size.nx, size.ny, size.nz);
        let (sy, sz) = (nx, nx * ny);

        // Forward: L q = r (q stored in z)
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let idx = size.index(i, j, k);
                    if !flags.is_fluid(idx) {
                        z[idx] = 0.0;
                        continue;
                    }
                    let mut t = r[idx];
                    if i > 0 {
                        t -= self.lx[idx - 1] * z[idx - 1];
                    }
                    if j > 0 {
                        t -= self.ly[idx - sy] * z[idx - sy];
                    }
                    if k > 0 {
                        t -= self.lz[idx - sz] * z[idx - sz];
                    }
                    z[idx] = t * self.precon[idx];
                }
            }
        }

        // Backward: L^T z = q
        for k in (0..nz).rev() {
            for j in (0..ny).rev() {
                for i in (0..nx).rev() {
                    let idx = size.index(i, j, k);
                    if !flags.is_fluid(idx) {
                        continue;
                    }
                    let mut t = z[idx];
                    if i + 1 < nx {
                        t -= self.lx[idx] * z[idx + 1];
                    }
                    if j + 1 < ny {
                        t -= self.ly[idx] * z[idx + sy];
                    }
                    if k + 1 < nz {
                        t -= self.lz[idx] * z[idx + sz];
                    }
                    z[idx] = t * self.precon[idx];
                }
            }
        }
    }
}
