use crate::grid::FlagGrid;
use crate::multigrid::MultigridHierarchy;
use crate::Real;

use super::MicFactor;

/// Preconditioner applied to the CG residual.
pub enum Preconditioner<'a> {
    /// `z = r`
    None,
    ModifiedIncompleteCholesky(&'a MicFactor),
    /// One V-cycle from a zero guess with the residual as right-hand side.
    Multigrid(&'a mut MultigridHierarchy),
}

impl Preconditioner<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Preconditioner::None => "none",
            Preconditioner::ModifiedIncompleteCholesky(_) => "MIC",
            Preconditioner::Multigrid(_) => "multigrid",
        }
    }

    pub fn apply(&mut self, flags: &FlagGrid, r: &[Real], z: &mut [Real]) {
        match self {
            Preconditioner::None => {
                for (idx, (z, &r)) in z.iter_mut().zip(r).enumerate() {
                    *z = if flags.is_fluid(idx) { r } else { 0.0 };
                }
            }
            Preconditioner::ModifiedIncompleteCholesky(mic) => mic.apply(flags, r, z),
            Preconditioner::Multigrid(mg) => {
                mg.load_rhs(r);
                mg.vcycle(z, None);
            }
        }
    }
}
