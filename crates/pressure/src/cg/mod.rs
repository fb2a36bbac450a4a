//! Preconditioned Conjugate Gradient on a [`StencilSystem`].
//!
//! ```text
//! first call:  r = b - Ax, z = M^-1 r, p = z, sigma = r.z
//! each step:   alpha = sigma / p.Ap
//!              x += alpha p, r -= alpha Ap
//!              z = M^-1 r, beta = r.z / sigma, p = z + beta p
//! ```

mod mic;
mod preconditioner;
pub mod vector_ops;

pub use mic::MicFactor;
pub use preconditioner::Preconditioner;

use crate::constants::DEFAULT_ACCURACY;
use crate::error::{try_zeroed, ProjectionError, ProjectionResult};
use crate::stencil::StencilSystem;
use crate::Real;

use vector_ops::{axpy, dot, max_abs, norm_l2, xpay};

pub struct ConjugateGradient<'a> {
    system: StencilSystem<'a>,
    rhs: &'a [Real],
    x: &'a mut [Real],
    preconditioner: Preconditioner<'a>,

    r: Vec<Real>,
    z: Vec<Real>,
    p: Vec<Real>,
    ap: Vec<Real>,

    sigma: Real,
    residual_norm: Real,
    initial_residual_norm: Real,
    accuracy: Real,
    use_l2_norm: bool,
    iterations: usize,
    initialized: bool,
    converged: bool,
}

impl<'a> ConjugateGradient<'a> {
    /// `x` is both the initial guess and the output.
    pub fn new(
        system: StencilSystem<'a>,
        rhs: &'a [Real],
        x: &'a mut [Real],
        preconditioner: Preconditioner<'a>,
    ) -> ProjectionResult<Self> {
        let n = system.size().cell_count();
        ProjectionError::check_len("rhs", n, rhs.len())?;
        ProjectionError::check_len("solution", n, x.len())?;
        match &preconditioner {
            Preconditioner::ModifiedIncompleteCholesky(mic) => {
                ProjectionError::check_len("mic factor", n, mic.size().cell_count())?;
            }
            Preconditioner::Multigrid(mg) => {
                if !mg.is_a_set() {
                    return Err(ProjectionError::OperatorNotSet);
                }
                ProjectionError::check_len("multigrid level 0", n, mg.level_size(0).cell_count())?;
            }
            Preconditioner::None => {}
        }

        Ok(Self {
            system,
            rhs,
            x,
            preconditioner,
            r: try_zeroed("cg residual", n)?,
            z: try_zeroed("cg preconditioned residual", n)?,
            p: try_zeroed("cg search direction", n)?,
            ap: try_zeroed("cg A*p", n)?,
            sigma: 0.0,
            residual_norm: 0.0,
            initial_residual_norm: 0.0,
            accuracy: DEFAULT_ACCURACY,
            use_l2_norm: true,
            iterations: 0,
            initialized: false,
            converged: false,
        })
    }

    // ========== Configuration ==========

    pub fn set_accuracy(&mut self, accuracy: Real) {
        self.accuracy = accuracy;
    }

    pub fn set_use_l2_norm(&mut self, use_l2: bool) {
        self.use_l2_norm = use_l2;
    }

    /// Restart from the current `x` on the next `iterate()`.
    pub fn force_reinit(&mut self) {
        self.initialized = false;
        self.converged = false;
        self.iterations = 0;
    }

    // ========== Accessors ==========

    pub fn residual_norm(&self) -> Real {
        self.residual_norm
    }

    pub fn initial_residual_norm(&self) -> Real {
        self.initial_residual_norm
    }

    pub fn sigma(&self) -> Real {
        self.sigma
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    pub fn accuracy(&self) -> Real {
        self.accuracy
    }

    pub fn preconditioner_name(&self) -> &'static str {
        self.preconditioner.name()
    }

    // ========== Iteration ==========

    fn norm(&self, v: &[Real]) -> Real {
        if self.use_l2_norm {
            norm_l2(v)
        } else {
            max_abs(v)
        }
    }

    fn reached_target(&self) -> bool {
        self.residual_norm <= self.accuracy * self.initial_residual_norm
    }

    fn initialize(&mut self) {
        self.system.residual(&*self.x, self.rhs, &mut self.r);
        let flags = self.system.flags;
        self.preconditioner.apply(flags, &self.r, &mut self.z);
        self.p.copy_from_slice(&self.z);
        self.sigma = dot(&self.r, &self.z);

        self.initial_residual_norm = self.norm(&self.r);
        self.residual_norm = self.initial_residual_norm;
        self.iterations = 0;
        self.initialized = true;
        self.converged = self.initial_residual_norm == 0.0;
    }

    /// One CG step. Returns false once converged or on breakdown.
    pub fn iterate(&mut self) -> bool {
        if !self.initialized {
            self.initialize();
        }
        if self.converged {
            return false;
        }

        self.system.apply(&self.p, &mut self.ap);
        let p_ap = dot(&self.p, &self.ap);
        if p_ap == 0.0 || !p_ap.is_finite() {
            log::debug!(
                "CG breakdown after {} iterations (p.Ap = {})",
                self.iterations,
                p_ap
            );
            return false;
        }

        let alpha = self.sigma / p_ap;
        axpy(&mut *self.x, alpha, &self.p);
        axpy(&mut self.r, -alpha, &self.ap);
        self.iterations += 1;

        self.residual_norm = self.norm(&self.r);
        log::debug!(
            "CG iteration {}: residual {:.3e}",
            self.iterations,
            self.residual_norm
        );
        if self.reached_target() {
            self.converged = true;
            return false;
        }

        let flags = self.system.flags;
        self.preconditioner.apply(flags, &self.r, &mut self.z);
        let sigma_new = dot(&self.r, &self.z);
        let beta = sigma_new / self.sigma;
        xpay(&mut self.p, beta, &self.z);
        self.sigma = sigma_new;
        true
    }

    /// Iterate until convergence, breakdown, or `max_iterations` steps.
    pub fn solve(&mut self, max_iterations: usize) -> bool {
        while self.iterations < max_iterations {
            if !self.iterate() {
                break;
            }
        }
        if !self.initialized {
            self.initialize();
        }
        self.converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellFlags, FlagGrid, GridSize};
    use crate::stencil::make_laplace_matrix;

    fn surface_box(size: GridSize) -> FlagGrid {
        let mut flags = FlagGrid::filled_fluid(size);
        for i in 0..size.nx {
            for k in 0..size.nz {
                flags.set(i, size.ny - 1, k, CellFlags::EMPTY);
            }
        }
        flags
    }

    #[test]
    fn test_zero_rhs_converges_immediately() {
        let flags = surface_box(GridSize::new(4, 4, 4));
        let m = make_laplace_matrix(&flags, None).unwrap();
        let system = StencilSystem::new(&m, &flags).unwrap();
        let rhs = vec![0.0; 64];
        let mut x = vec![0.0; 64];
        let mut cg = ConjugateGradient::new(system, &rhs, &mut x, Preconditioner::None).unwrap();
        assert!(!cg.iterate());
        assert!(cg.is_converged());
        assert_eq!(cg.iterations(), 0);
    }

    #[test]
    fn test_unpreconditioned_and_mic_agree() {
        let size = GridSize::new(6, 6, 6);
        let flags = surface_box(size);
        let m = make_laplace_matrix(&flags, None).unwrap();
        let system = StencilSystem::new(&m, &flags).unwrap();
        let rhs: Vec<Real> = (0..size.cell_count())
            .map(|i| if flags.is_fluid(i) { ((i % 7) as Real) - 3.0 } else { 0.0 })
            .collect();

        let mut plain = vec![0.0; size.cell_count()];
        {
            let mut cg =
                ConjugateGradient::new(system, &rhs, &mut plain, Preconditioner::None).unwrap();
            cg.set_accuracy(1e-10);
            assert!(cg.solve(500));
            assert!(cg.residual_norm() < cg.initial_residual_norm());
        }

        let mic = MicFactor::build(&m, &flags).unwrap();
        let mut pre = vec![0.0; size.cell_count()];
        let iterations = {
            let mut cg = ConjugateGradient::new(
                system,
                &rhs,
                &mut pre,
                Preconditioner::ModifiedIncompleteCholesky(&mic),
            )
            .unwrap();
            cg.set_accuracy(1e-10);
            assert!(cg.solve(500));
            cg.iterations()
        };
        assert!(iterations > 0);

        for (a, b) in plain.iter().zip(&pre) {
            assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_force_reinit_restarts_from_current_guess() {
        let size = GridSize::planar(8, 8);
        let flags = surface_box(size);
        let m = make_laplace_matrix(&flags, None).unwrap();
        let system = StencilSystem::new(&m, &flags).unwrap();
        let rhs: Vec<Real> = (0..64).map(|i| if flags.is_fluid(i) { 1.0 } else { 0.0 }).collect();
        let mut x = vec![0.0; 64];
        let mut cg = ConjugateGradient::new(system, &rhs, &mut x, Preconditioner::None).unwrap();
        cg.set_accuracy(1e-8);
        assert!(cg.solve(1000));

        cg.force_reinit();
        cg.set_use_l2_norm(false);
        // Already solved: the restart residual is tiny compared to the first one.
        cg.iterate();
        assert!(cg.initial_residual_norm() < 1e-6);
    }

    #[test]
    fn test_sigma_tracks_squared_residual_without_preconditioner() {
        let size = GridSize::planar(8, 8);
        let flags = surface_box(size);
        let m = make_laplace_matrix(&flags, None).unwrap();
        let system = StencilSystem::new(&m, &flags).unwrap();
        let rhs: Vec<Real> = (0..64)
            .map(|i| if flags.is_fluid(i) { (i % 5) as Real - 2.0 } else { 0.0 })
            .collect();
        let mut x = vec![0.0; 64];
        let mut cg = ConjugateGradient::new(system, &rhs, &mut x, Preconditioner::None).unwrap();
        cg.set_use_l2_norm(true);
        cg.set_accuracy(1e-10);

        let mut steps = 0;
        while cg.iterate() {
            // z = r, so r.z is the squared l2 residual.
            let expected = cg.residual_norm() * cg.residual_norm();
            assert!((cg.sigma() - expected).abs() <= 1e-9 * expected.max(1e-300));
            steps += 1;
        }
        assert!(steps > 0);
        assert!(cg.is_converged());
    }

    #[test]
    fn test_mismatched_rhs_is_rejected() {
        let flags = FlagGrid::filled_fluid(GridSize::planar(4, 4));
        let m = make_laplace_matrix(&flags, None).unwrap();
        let system = StencilSystem::new(&m, &flags).unwrap();
        let rhs = vec![0.0; 15];
        let mut x = vec![0.0; 16];
        assert!(ConjugateGradient::new(system, &rhs, &mut x, Preconditioner::None).is_err());
    }
}
