//! Pressure solve configuration.
//!
//! Every option has a default, so a partial JSON file only overrides what it
//! names.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{ProjectionError, ProjectionResult};
use crate::Real;

/// Preconditioner used by the CG solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreconditionerKind {
    None,
    #[default]
    ModifiedIncompleteCholesky,
    /// Hierarchy rebuilt on every solve.
    MultigridDynamic,
    /// Hierarchy kept in a caller-owned [`crate::pipeline::MultigridCache`].
    MultigridStatic,
}

impl PreconditionerKind {
    pub fn is_multigrid(self) -> bool {
        matches!(self, Self::MultigridDynamic | Self::MultigridStatic)
    }
}

/// Which solver drives the pressure solve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverMethod {
    #[default]
    ConjugateGradient,
    /// V-cycles until the relative L2 residual meets `accuracy`.
    MultigridVCycle,
}

/// Residual norm used by the stopping test.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoppingNorm {
    Max,
    #[default]
    L2,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    /// Relative residual target
    pub accuracy: Real,
    /// Iteration cap = factor × largest extent (×4 on planar grids)
    pub max_iter_factor: Real,
    pub preconditioner: PreconditionerKind,
    pub solver: SolverMethod,
    pub norm: StoppingNorm,
    /// Pin one pressure value when the system has no EMPTY cell
    pub zero_pressure_fixing: bool,
    /// Smallest ghost-fluid zero-crossing fraction
    pub gf_clamp: Real,
    /// Multigrid diagonal/rhs scale for trivial equations
    pub trivial_equation_scale: Real,
    pub mg_pre_smooth: usize,
    pub mg_post_smooth: usize,
    pub mg_coarsest_accuracy: f64,
    /// Subtract the mean rhs over fluid cells before solving
    pub enforce_compatibility: bool,
    /// Copy neighbour velocities into faces whose ghost-fluid weight was clamped
    pub replace_clamped_ghost_velocities: bool,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            accuracy: DEFAULT_ACCURACY,
            max_iter_factor: DEFAULT_MAX_ITER_FACTOR,
            preconditioner: PreconditionerKind::default(),
            solver: SolverMethod::default(),
            norm: StoppingNorm::default(),
            zero_pressure_fixing: false,
            gf_clamp: DEFAULT_GF_CLAMP,
            trivial_equation_scale: DEFAULT_TRIVIAL_EQUATION_SCALE,
            mg_pre_smooth: 1,
            mg_post_smooth: 1,
            mg_coarsest_accuracy: DEFAULT_COARSEST_ACCURACY,
            enforce_compatibility: false,
            replace_clamped_ghost_velocities: true,
        }
    }
}

impl PressureConfig {
    pub fn with_accuracy(mut self, accuracy: Real) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_max_iter_factor(mut self, factor: Real) -> Self {
        self.max_iter_factor = factor;
        self
    }

    pub fn with_preconditioner(mut self, preconditioner: PreconditionerKind) -> Self {
        self.preconditioner = preconditioner;
        self
    }

    pub fn with_solver(mut self, solver: SolverMethod) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_norm(mut self, norm: StoppingNorm) -> Self {
        self.norm = norm;
        self
    }

    pub fn with_zero_pressure_fixing(mut self, enabled: bool) -> Self {
        self.zero_pressure_fixing = enabled;
        self
    }

    pub fn with_gf_clamp(mut self, clamp: Real) -> Self {
        self.gf_clamp = clamp;
        self
    }

    pub fn with_smoothing(mut self, pre: usize, post: usize) -> Self {
        self.mg_pre_smooth = pre;
        self.mg_post_smooth = post;
        self
    }

    pub fn with_enforce_compatibility(mut self, enabled: bool) -> Self {
        self.enforce_compatibility = enabled;
        self
    }

    /// Whether the pipeline should pin one pressure value for this request.
    pub fn wants_pinning(&self) -> bool {
        self.zero_pressure_fixing || self.accuracy < AUTO_PIN_ACCURACY
    }

    /// Iteration cap for a grid whose largest extent is `max_extent`.
    pub fn max_iterations(&self, max_extent: usize, is_3d: bool) -> usize {
        let base = (self.max_iter_factor * max_extent as Real).ceil().max(1.0) as usize;
        if is_3d {
            base
        } else {
            base * PLANAR_ITERATION_BOOST
        }
    }

    pub fn validate(&self) -> ProjectionResult<()> {
        let positive = |name: &str, value: Real| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ProjectionError::InvalidConfig(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )))
            }
        };
        positive("accuracy", self.accuracy)?;
        positive("max_iter_factor", self.max_iter_factor)?;
        positive("trivial_equation_scale", self.trivial_equation_scale)?;
        positive("mg_coarsest_accuracy", self.mg_coarsest_accuracy)?;
        if !(self.gf_clamp > 0.0 && self.gf_clamp <= 1.0) {
            return Err(ProjectionError::InvalidConfig(format!(
                "gf_clamp must lie in (0, 1], got {}",
                self.gf_clamp
            )));
        }
        if self.mg_pre_smooth + self.mg_post_smooth == 0 {
            return Err(ProjectionError::InvalidConfig(
                "multigrid needs at least one smoothing sweep".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &Path) -> ProjectionResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json(path: &Path) -> ProjectionResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}
