//! Pressure projection: right-hand side, solve, velocity correction.
//!
//! The three stages are separately callable so a caller can inspect or
//! modify the rhs between them. [`project`] runs them in order.

mod cache;
mod correct;
mod rhs;
mod solve;

pub use cache::MultigridCache;
pub use correct::correct_velocity;
pub use rhs::compute_rhs;
pub use solve::solve_system;

use crate::config::{PressureConfig, PreconditionerKind, SolverMethod};
use crate::error::{try_zeroed, ProjectionError, ProjectionResult};
use crate::grid::{Axis, FlagGrid, GridSize, MacGrid};
use crate::Real;

/// Per-step inputs shared by all stages. Only `flags` is required.
#[derive(Clone, Copy)]
pub struct ProjectionInputs<'a> {
    pub flags: &'a FlagGrid,
    /// Per-face open fraction (1 = unobstructed)
    pub fractions: Option<&'a MacGrid>,
    /// Free-surface level set, negative inside the liquid
    pub phi: Option<&'a [Real]>,
    pub curvature: Option<&'a [Real]>,
    pub surface_tension: Option<Real>,
    /// Added to the rhs of every fluid cell
    pub divergence_correction: Option<&'a [Real]>,
    pub obstacle_velocity: Option<&'a MacGrid>,
}

impl<'a> ProjectionInputs<'a> {
    pub fn new(flags: &'a FlagGrid) -> Self {
        Self {
            flags,
            fractions: None,
            phi: None,
            curvature: None,
            surface_tension: None,
            divergence_correction: None,
            obstacle_velocity: None,
        }
    }

    pub fn with_fractions(mut self, fractions: &'a MacGrid) -> Self {
        self.fractions = Some(fractions);
        self
    }

    pub fn with_phi(mut self, phi: &'a [Real]) -> Self {
        self.phi = Some(phi);
        self
    }

    pub fn with_surface_tension(mut self, curvature: &'a [Real], sigma: Real) -> Self {
        self.curvature = Some(curvature);
        self.surface_tension = Some(sigma);
        self
    }

    pub fn with_divergence_correction(mut self, correction: &'a [Real]) -> Self {
        self.divergence_correction = Some(correction);
        self
    }

    pub fn with_obstacle_velocity(mut self, obstacle_velocity: &'a MacGrid) -> Self {
        self.obstacle_velocity = Some(obstacle_velocity);
        self
    }

    pub fn size(&self) -> GridSize {
        self.flags.size()
    }

    /// Surface tension is active only with curvature, coefficient and phi.
    pub(crate) fn surface_tension_terms(&self) -> Option<(&'a [Real], &'a [Real], Real)> {
        match (self.phi, self.curvature, self.surface_tension) {
            (Some(phi), Some(curvature), Some(sigma)) if sigma != 0.0 => Some((phi, curvature, sigma)),
            _ => None,
        }
    }

    /// Check field shapes and feature dependencies.
    pub fn validate(&self) -> ProjectionResult<()> {
        let size = self.size();
        let n = size.cell_count();

        if self.phi.is_none() && (self.curvature.is_some() || self.surface_tension.is_some()) {
            return Err(ProjectionError::MissingField {
                feature: "surface tension",
                field: "phi",
            });
        }
        if self.surface_tension.is_some() && self.curvature.is_none() {
            return Err(ProjectionError::MissingField {
                feature: "surface tension",
                field: "curvature",
            });
        }

        if let Some(phi) = self.phi {
            ProjectionError::check_len("phi", n, phi.len())?;
        }
        if let Some(curvature) = self.curvature {
            ProjectionError::check_len("curvature", n, curvature.len())?;
        }
        if let Some(correction) = self.divergence_correction {
            ProjectionError::check_len("divergence correction", n, correction.len())?;
        }
        if let Some(fractions) = self.fractions {
            check_mac("fractions", size, fractions)?;
        }
        if let Some(obvel) = self.obstacle_velocity {
            check_mac("obstacle velocity", size, obvel)?;
        }
        Ok(())
    }
}

pub(crate) fn check_mac(field: &'static str, size: GridSize, mac: &MacGrid) -> ProjectionResult<()> {
    for axis in Axis::ALL {
        ProjectionError::check_len(field, MacGrid::component_len(size, axis), mac.component(axis).len())?;
    }
    Ok(())
}

/// Diagnostics of one pressure solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveReport {
    /// CG iterations or V-cycles
    pub iterations: usize,
    pub residual_norm: Real,
    pub initial_residual_norm: Real,
    pub converged: bool,
    pub pinned_cell: Option<usize>,
    pub preconditioner: PreconditionerKind,
    pub solver: SolverMethod,
}

/// Full projection: rhs from `vel`, solve into `pressure`, correct `vel`.
///
/// `pressure` is the initial guess and receives the solution.
pub fn project(
    inputs: &ProjectionInputs<'_>,
    vel: &mut MacGrid,
    pressure: &mut [Real],
    config: &PressureConfig,
    cache: &mut MultigridCache,
) -> ProjectionResult<SolveReport> {
    let mut rhs = try_zeroed("pressure rhs", inputs.size().cell_count())?;
    compute_rhs(inputs, vel, &mut rhs, config)?;
    let report = solve_system(inputs, &mut rhs, pressure, config, cache)?;
    correct_velocity(inputs, vel, pressure, config)?;
    Ok(report)
}
