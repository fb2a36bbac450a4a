//! Geometric multigrid with Galerkin coarse operators.
//!
//! Usage:
//!   1. `MultigridHierarchy::new(size, settings)` lays out the levels
//!   2. `set_a(&matrix)` classifies vertices and builds every coarse operator
//!   3. `set_rhs(&rhs)` then `do_vcycle(dst, src)` or `solve(...)`
//!
//! As a CG preconditioner one V-cycle from a zero guess is applied to the
//! residual.

mod coarse_solve;
mod coarsening;
mod galerkin;
mod heap;
mod level;
mod smoother;
mod transfer;

pub use level::VertexType;

use glam::IVec3;

use crate::cg::vector_ops::norm_l2;
use crate::config::PressureConfig;
use crate::constants::*;
use crate::error::{ProjectionError, ProjectionResult};
use crate::grid::GridSize;
use crate::stencil::StencilMatrix;
use crate::Real;

use galerkin::CoarseningPath;
use level::{Level, StencilLayout};

/// Tunables of the hierarchy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MultigridSettings {
    pub pre_smooth: usize,
    pub post_smooth: usize,
    pub coarsest_accuracy: f64,
    pub trivial_equation_scale: Real,
}

impl Default for MultigridSettings {
    fn default() -> Self {
        Self {
            pre_smooth: 1,
            post_smooth: 1,
            coarsest_accuracy: DEFAULT_COARSEST_ACCURACY,
            trivial_equation_scale: DEFAULT_TRIVIAL_EQUATION_SCALE,
        }
    }
}

impl From<&PressureConfig> for MultigridSettings {
    fn from(config: &PressureConfig) -> Self {
        Self {
            pre_smooth: config.mg_pre_smooth,
            post_smooth: config.mg_post_smooth,
            coarsest_accuracy: config.mg_coarsest_accuracy,
            trivial_equation_scale: config.trivial_equation_scale,
        }
    }
}

/// Outcome of a standalone V-cycle solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VCycleSolve {
    pub cycles: usize,
    pub residual_norm: Real,
    pub initial_residual_norm: Real,
    pub converged: bool,
}

pub struct MultigridHierarchy {
    settings: MultigridSettings,
    pub(crate) levels: Vec<Level>,
    colours: Vec<Vec<Vec<IVec3>>>,
    paths: Vec<CoarseningPath>,
    a_set: bool,
    trivial_equations: usize,
}

/// Extents of every level, finest first.
fn level_sizes(size: GridSize) -> Vec<GridSize> {
    let small = |s: &GridSize| {
        s.nx <= COARSEST_MAX_EXTENT
            && s.ny <= COARSEST_MAX_EXTENT
            && s.nz <= COARSEST_MAX_EXTENT
            && s.cell_count() <= COARSEST_MAX_CELLS
    };
    let mut sizes = vec![size];
    while sizes.len() < MAX_LEVELS {
        let last = sizes[sizes.len() - 1];
        if small(&last) {
            break;
        }
        sizes.push(last.coarsened());
    }
    sizes
}

impl MultigridHierarchy {
    pub fn new(size: GridSize, settings: MultigridSettings) -> ProjectionResult<Self> {
        let sizes = level_sizes(size);
        let mut levels = Vec::with_capacity(sizes.len());
        for (l, &s) in sizes.iter().enumerate() {
            let layout = if l == 0 {
                StencilLayout::Axis
            } else {
                StencilLayout::Box
            };
            levels.push(Level::new(s, layout)?);
        }
        let colours = levels
            .iter()
            .map(|level| smoother::colours(level.layout, level.size.is_3d()))
            .collect();

        log::info!(
            "Multigrid: Created {} levels: {}",
            levels.len(),
            sizes
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" → ")
        );

        Ok(Self {
            settings,
            levels,
            colours,
            paths: galerkin::build_coarsening_paths(size.is_3d()),
            a_set: false,
            trivial_equations: 0,
        })
    }

    // ========== Accessors ==========

    pub fn settings(&self) -> &MultigridSettings {
        &self.settings
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level_size(&self, level: usize) -> GridSize {
        self.levels[level].size
    }

    pub fn vertex_type(&self, level: usize, idx: usize) -> VertexType {
        self.levels[level].vtype[idx]
    }

    pub fn is_a_set(&self) -> bool {
        self.a_set
    }

    /// Trivial equations found by the last `set_a`.
    pub fn trivial_equations(&self) -> usize {
        self.trivial_equations
    }

    /// Operator entry `A_l[idx][idx + d]` (zero when `idx + d` is outside the level).
    pub fn coefficient(&self, level: usize, idx: usize, d: IVec3) -> Real {
        let view = self.levels[level].view();
        let v = view.size.position(idx);
        if !view.size.contains(v + d) || view.upper_slot(d).or(view.upper_slot(-d)).is_none() {
            return 0.0;
        }
        view.coeff(v, d)
    }

    // ========== Operator setup ==========

    /// Load the finest operator and build the hierarchy below it.
    pub fn set_a(&mut self, matrix: &StencilMatrix) -> ProjectionResult<()> {
        matrix.validate()?;
        let size = self.levels[0].size;
        if matrix.size() != size {
            return Err(ProjectionError::SizeMismatch {
                field: "multigrid operator",
                expected: size.cell_count(),
                found: matrix.size().cell_count(),
            });
        }
        self.a_set = false;
        self.load_finest(matrix);

        for l in 1..self.levels.len() {
            let (finer, coarser) = self.levels.split_at_mut(l);
            let fine = &finer[l - 1];
            let coarse = &mut coarser[0];

            coarse.vtype = coarsening::gen_coarse_grid(fine.view(), coarse.size);
            if l == 1 {
                galerkin::assemble_with_paths(
                    &self.paths,
                    fine.view(),
                    coarse.size,
                    &coarse.vtype,
                    coarse.width,
                    &mut coarse.stencil,
                );
            } else {
                galerkin::assemble_direct(
                    fine.view(),
                    coarse.size,
                    &coarse.vtype,
                    coarse.width,
                    &mut coarse.stencil,
                );
            }
        }

        self.a_set = true;
        Ok(())
    }

    fn load_finest(&mut self, matrix: &StencilMatrix) {
        let is_3d = matrix.is_3d();
        let level = &mut self.levels[0];
        let width = level.width;
        for vi in 0..level.size.cell_count() {
            let row = &mut level.stencil[vi * width..(vi + 1) * width];
            row[0] = matrix.a0[vi];
            row[1] = matrix.ai[vi];
            row[2] = matrix.aj[vi];
            if is_3d {
                row[3] = matrix.ak[vi];
            }
            level.vtype[vi] = if matrix.a0[vi] != 0.0 {
                VertexType::Active
            } else {
                VertexType::Inactive
            };
        }

        // Rows without neighbour coupling; their rhs is scaled in load_rhs.
        let size = level.size;
        let trivial: Vec<usize> = (0..size.cell_count())
            .filter(|&vi| {
                let view = level.view();
                view.is_active(vi) && {
                    let v = size.position(vi);
                    view.neighbours.iter().all(|&d| {
                        !size.contains(v + d) || view.coeff(v, d) == 0.0
                    })
                }
            })
            .collect();
        for &vi in &trivial {
            level.vtype[vi] = VertexType::ActiveTrivial;
            level.stencil[vi * width] *= self.settings.trivial_equation_scale;
        }
        self.trivial_equations = trivial.len();
        if !trivial.is_empty() {
            log::warn!(
                "Multigrid: {} trivial equations scaled by {:e}",
                trivial.len(),
                self.settings.trivial_equation_scale
            );
        }

        let view = level.view();
        let mut any_active = false;
        let all_vanish = (0..size.cell_count())
            .filter(|&vi| view.is_active(vi))
            .all(|vi| {
                any_active = true;
                let sum = view.row_sum(size.position(vi), vi);
                sum.abs() <= 1e-10 * view.diagonal(vi).abs()
            });
        if any_active && all_vanish {
            log::warn!("Multigrid: all row sums vanish, the system is singular (pin a pressure value)");
        }
    }

    /// Set the finest right-hand side.
    pub fn set_rhs(&mut self, rhs: &[Real]) -> ProjectionResult<()> {
        ProjectionError::check_len("rhs", self.levels[0].size.cell_count(), rhs.len())?;
        if !self.a_set {
            return Err(ProjectionError::OperatorNotSet);
        }
        self.load_rhs(rhs);
        Ok(())
    }

    pub(crate) fn load_rhs(&mut self, rhs: &[Real]) {
        let scale = self.settings.trivial_equation_scale;
        let level = &mut self.levels[0];
        for (vi, (b, &value)) in level.b.iter_mut().zip(rhs).enumerate() {
            *b = match level.vtype[vi] {
                VertexType::Inactive => 0.0,
                VertexType::Active => value,
                VertexType::ActiveTrivial => value * scale,
            };
        }
    }

    // ========== Cycling ==========

    /// One V-cycle from `src` (or zero) on the current rhs. Writes the result
    /// to `dst` and returns the finest L2 residual.
    pub fn do_vcycle(&mut self, dst: &mut [Real], src: Option<&[Real]>) -> ProjectionResult<Real> {
        let n = self.levels[0].size.cell_count();
        ProjectionError::check_len("dst", n, dst.len())?;
        if let Some(src) = src {
            ProjectionError::check_len("src", n, src.len())?;
        }
        if !self.a_set {
            return Err(ProjectionError::OperatorNotSet);
        }
        Ok(self.vcycle(dst, src))
    }

    pub(crate) fn vcycle(&mut self, dst: &mut [Real], src: Option<&[Real]>) -> Real {
        {
            let level = &mut self.levels[0];
            match src {
                Some(src) => {
                    for (vi, x) in level.x.iter_mut().enumerate() {
                        *x = if level.vtype[vi].is_active() { src[vi] } else { 0.0 };
                    }
                }
                None => level.x.fill(0.0),
            }
        }
        let residual = self.vcycle_in_place();
        dst.copy_from_slice(&self.levels[0].x);
        residual
    }

    fn vcycle_in_place(&mut self) -> Real {
        let last = self.levels.len() - 1;
        let settings = self.settings;

        for l in 0..last {
            {
                let (view, x, b, r) = self.levels[l].parts();
                for _ in 0..settings.pre_smooth {
                    smoother::smooth(view, &self.colours[l], b, x, false);
                }
                transfer::compute_residual(view, x, b, r);
            }
            let (finer, coarser) = self.levels.split_at_mut(l + 1);
            let fine = &finer[l];
            let coarse = &mut coarser[0];
            transfer::restrict(
                fine.size,
                &fine.vtype,
                &fine.r,
                coarse.size,
                &coarse.vtype,
                &mut coarse.b,
            );
            coarse.x.fill(0.0);
        }

        {
            let (view, x, b, _) = self.levels[last].parts();
            let (iterations, relative) = coarse_solve::solve_coarsest(
                view,
                b,
                x,
                settings.coarsest_accuracy,
                COARSEST_MAX_ITERATIONS,
            );
            log::trace!(
                "Multigrid: coarsest solve {} iterations, relative residual {:.3e}",
                iterations,
                relative
            );
        }

        for l in (0..last).rev() {
            let (finer, coarser) = self.levels.split_at_mut(l + 1);
            let coarse = &coarser[0];
            let fine = &mut finer[l];
            transfer::interpolate(
                coarse.size,
                &coarse.vtype,
                &coarse.x,
                fine.size,
                &fine.vtype,
                &mut fine.r,
            );
            let (view, x, b, r) = fine.parts();
            for (x, &c) in x.iter_mut().zip(r.iter()) {
                *x += c;
            }
            for _ in 0..settings.post_smooth {
                smoother::smooth(view, &self.colours[l], b, x, true);
            }
        }

        let (view, x, b, r) = self.levels[0].parts();
        transfer::compute_residual(view, x, b, r);
        let residual = norm_l2(r);
        log::trace!("Multigrid: V-cycle residual {:.3e}", residual);
        residual
    }

    /// Standalone solve: V-cycles from `dst` until the relative L2 residual
    /// drops to `accuracy` or `max_cycles` is reached.
    pub fn solve(
        &mut self,
        dst: &mut [Real],
        max_cycles: usize,
        accuracy: Real,
    ) -> ProjectionResult<VCycleSolve> {
        let n = self.levels[0].size.cell_count();
        ProjectionError::check_len("dst", n, dst.len())?;
        if !self.a_set {
            return Err(ProjectionError::OperatorNotSet);
        }

        let initial = {
            let level = &mut self.levels[0];
            for (vi, x) in level.x.iter_mut().enumerate() {
                *x = if level.vtype[vi].is_active() { dst[vi] } else { 0.0 };
            }
            let view = level.view();
            let mut r = vec![0.0; n];
            transfer::compute_residual(view, &level.x, &level.b, &mut r);
            norm_l2(&r)
        };

        let mut outcome = VCycleSolve {
            cycles: 0,
            residual_norm: initial,
            initial_residual_norm: initial,
            converged: initial == 0.0,
        };
        while !outcome.converged && outcome.cycles < max_cycles {
            outcome.residual_norm = self.vcycle_in_place();
            outcome.cycles += 1;
            log::debug!(
                "Multigrid cycle {}: residual {:.3e}",
                outcome.cycles,
                outcome.residual_norm
            );
            outcome.converged = outcome.residual_norm <= accuracy * initial;
        }
        dst.copy_from_slice(&self.levels[0].x);
        Ok(outcome)
    }
}
