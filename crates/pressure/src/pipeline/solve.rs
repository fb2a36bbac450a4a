//! Assemble and solve the pressure system.

use super::{MultigridCache, ProjectionInputs, SolveReport};
use crate::cg::{ConjugateGradient, MicFactor, Preconditioner};
use crate::config::{PreconditionerKind, PressureConfig, SolverMethod, StoppingNorm};
use crate::error::{ProjectionError, ProjectionResult};
use crate::multigrid::{MultigridHierarchy, MultigridSettings};
use crate::stencil::{
    apply_ghost_fluid_diagonal, find_pinned_cell, fix_pressure, make_laplace_matrix, row_sums_vanish,
    StencilMatrix, StencilSystem,
};
use crate::Real;

/// Solve `A p = rhs` for `pressure`.
///
/// `rhs` is modified when a cell is pinned. `pressure` is the initial guess;
/// its non-fluid entries are zeroed. In static multigrid mode the cached
/// hierarchy is released if any step fails.
pub fn solve_system(
    inputs: &ProjectionInputs<'_>,
    rhs: &mut [Real],
    pressure: &mut [Real],
    config: &PressureConfig,
    cache: &mut MultigridCache,
) -> ProjectionResult<SolveReport> {
    let result = solve_inner(inputs, rhs, pressure, config, cache);
    if result.is_err() && config.preconditioner == PreconditionerKind::MultigridStatic {
        cache.release();
    }
    result
}

fn solve_inner(
    inputs: &ProjectionInputs<'_>,
    rhs: &mut [Real],
    pressure: &mut [Real],
    config: &PressureConfig,
    cache: &mut MultigridCache,
) -> ProjectionResult<SolveReport> {
    config.validate()?;
    inputs.validate()?;
    let flags = inputs.flags;
    let size = flags.size();
    ProjectionError::check_len("rhs", size.cell_count(), rhs.len())?;
    ProjectionError::check_len("pressure", size.cell_count(), pressure.len())?;

    let mut matrix = make_laplace_matrix(flags, inputs.fractions)?;
    if let Some(phi) = inputs.phi {
        apply_ghost_fluid_diagonal(&mut matrix, flags, phi, config.gf_clamp)?;
    }

    let pinned_cell = if config.wants_pinning() && !flags.has_pressure_anchor() {
        find_pinned_cell(flags)
    } else {
        None
    };
    if let Some(idx) = pinned_cell {
        fix_pressure(&mut matrix, rhs, idx, 0.0)?;
        if cache.first_pinning() {
            log::debug!("Pressure: pinning cell {} ({:?}) to zero", idx, size.position(idx));
        }
    }

    for (idx, p) in pressure.iter_mut().enumerate() {
        if !flags.is_fluid(idx) {
            *p = 0.0;
        }
    }

    let max_iterations = config.max_iterations(size.max_extent(), size.is_3d());
    let report = match config.solver {
        SolverMethod::ConjugateGradient => {
            run_cg(inputs, &matrix, rhs, pressure, config, cache, max_iterations, pinned_cell)?
        }
        SolverMethod::MultigridVCycle => {
            run_vcycles(inputs, &matrix, rhs, pressure, config, cache, max_iterations, pinned_cell)?
        }
    };

    log::info!(
        "Pressure: {} {} after {} iterations, residual {:.3e} (initial {:.3e})",
        solver_label(config),
        if report.converged { "converged" } else { "stopped" },
        report.iterations,
        report.residual_norm,
        report.initial_residual_norm
    );
    Ok(report)
}

fn solver_label(config: &PressureConfig) -> &'static str {
    match (config.solver, config.preconditioner) {
        (SolverMethod::MultigridVCycle, _) => "MG",
        (_, PreconditionerKind::None) => "CG",
        (_, PreconditionerKind::ModifiedIncompleteCholesky) => "MIC-PCG",
        (_, PreconditionerKind::MultigridDynamic | PreconditionerKind::MultigridStatic) => "MG-PCG",
    }
}

/// Hierarchy for this solve: the cached one in static mode, else a fresh one.
///
/// A cached hierarchy keeps its old operator unless `current_operator` is set.
/// The V-cycle solver needs the current one; PCG only uses it as a preconditioner.
fn hierarchy<'c>(
    matrix: &StencilMatrix,
    config: &PressureConfig,
    cache: &'c mut MultigridCache,
    local: &'c mut Option<MultigridHierarchy>,
    current_operator: bool,
) -> ProjectionResult<&'c mut MultigridHierarchy> {
    let settings = MultigridSettings::from(config);
    if config.preconditioner == PreconditionerKind::MultigridStatic {
        return cache.prepare(matrix.size(), settings, matrix, current_operator);
    }
    let mut mg = MultigridHierarchy::new(matrix.size(), settings)?;
    mg.set_a(matrix)?;
    Ok(local.insert(mg))
}

#[allow(clippy::too_many_arguments)]
fn run_cg(
    inputs: &ProjectionInputs<'_>,
    matrix: &StencilMatrix,
    rhs: &[Real],
    pressure: &mut [Real],
    config: &PressureConfig,
    cache: &mut MultigridCache,
    max_iterations: usize,
    pinned_cell: Option<usize>,
) -> ProjectionResult<SolveReport> {
    let flags = inputs.flags;
    if !config.preconditioner.is_multigrid() && pinned_cell.is_none() && row_sums_vanish(matrix, flags) {
        log::warn!("Pressure: all row sums vanish, the system is singular (enable zero_pressure_fixing)");
    }

    let mic;
    let mut local = None;
    let preconditioner = match config.preconditioner {
        PreconditionerKind::None => Preconditioner::None,
        PreconditionerKind::ModifiedIncompleteCholesky => {
            mic = MicFactor::build(matrix, flags)?;
            Preconditioner::ModifiedIncompleteCholesky(&mic)
        }
        PreconditionerKind::MultigridDynamic | PreconditionerKind::MultigridStatic => {
            Preconditioner::Multigrid(hierarchy(matrix, config, cache, &mut local, false)?)
        }
    };

    let system = StencilSystem::new(matrix, flags)?;
    let mut cg = ConjugateGradient::new(system, rhs, pressure, preconditioner)?;
    cg.set_accuracy(config.accuracy);
    cg.set_use_l2_norm(config.norm == StoppingNorm::L2);
    let converged = cg.solve(max_iterations);

    Ok(SolveReport {
        iterations: cg.iterations(),
        residual_norm: cg.residual_norm(),
        initial_residual_norm: cg.initial_residual_norm(),
        converged,
        pinned_cell,
        preconditioner: config.preconditioner,
        solver: SolverMethod::ConjugateGradient,
    })
}

#[allow(clippy::too_many_arguments)]
fn run_vcycles(
    inputs: &ProjectionInputs<'_>,
    matrix: &StencilMatrix,
    rhs: &[Real],
    pressure: &mut [Real],
    config: &PressureConfig,
    cache: &mut MultigridCache,
    max_iterations: usize,
    pinned_cell: Option<usize>,
) -> ProjectionResult<SolveReport> {
    ProjectionError::check_len("flags", matrix.size().cell_count(), inputs.flags.size().cell_count())?;
    let mut local = None;
    let mg = hierarchy(matrix, config, cache, &mut local, true)?;
    mg.set_rhs(rhs)?;
    let outcome = mg.solve(pressure, max_iterations, config.accuracy)?;

    Ok(SolveReport {
        iterations: outcome.cycles,
        residual_norm: outcome.residual_norm,
        initial_residual_norm: outcome.initial_residual_norm,
        converged: outcome.converged,
        pinned_cell,
        preconditioner: config.preconditioner,
        solver: SolverMethod::MultigridVCycle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Axis, CellFlags, FlagGrid, GridSize, MacGrid};
    use crate::pipeline::compute_rhs;
    use glam::IVec3;

    fn closed_box(size: GridSize) -> (FlagGrid, Vec<Real>) {
        let flags = FlagGrid::filled_fluid(size);
        let mut vel = MacGrid::new(size);
        // Source and sink so the rhs has zero sum.
        vel.set_face(Axis::X, IVec3::new(2, 2, 0), 1.0);
        vel.set_face(Axis::X, IVec3::new(6, 5, 0), 1.0);
        let mut rhs = vec![0.0; size.cell_count()];
        compute_rhs(
            &ProjectionInputs::new(&flags),
            &vel,
            &mut rhs,
            &PressureConfig::default(),
        )
        .unwrap();
        (flags, rhs)
    }

    #[test]
    fn test_closed_box_is_pinned_when_requested() {
        let size = GridSize::planar(8, 8);
        let (flags, mut rhs) = closed_box(size);
        let mut pressure = vec![0.0; size.cell_count()];
        let config = PressureConfig::default()
            .with_accuracy(1e-8)
            .with_zero_pressure_fixing(true);
        let report = solve_system(
            &ProjectionInputs::new(&flags),
            &mut rhs,
            &mut pressure,
            &config,
            &mut MultigridCache::new(),
        )
        .unwrap();

        let pinned = report.pinned_cell.unwrap();
        assert_eq!(pinned, size.index(4, 7, 0));
        assert!(report.converged);
        assert_eq!(pressure[pinned], 0.0);
    }

    #[test]
    fn test_surface_prevents_pinning() {
        let size = GridSize::planar(8, 8);
        let mut flags = FlagGrid::filled_fluid(size);
        flags.set(0, 7, 0, CellFlags::EMPTY);
        let mut rhs = vec![1.0; size.cell_count()];
        let mut pressure = vec![0.0; size.cell_count()];
        let config = PressureConfig::default().with_zero_pressure_fixing(true);
        let report = solve_system(
            &ProjectionInputs::new(&flags),
            &mut rhs,
            &mut pressure,
            &config,
            &mut MultigridCache::new(),
        )
        .unwrap();
        assert_eq!(report.pinned_cell, None);
    }

    #[test]
    fn test_every_method_converges() {
        let size = GridSize::planar(16, 16);
        let (flags, rhs) = closed_box(size);
        let inputs = ProjectionInputs::new(&flags);

        let configs = [
            PressureConfig::default().with_preconditioner(PreconditionerKind::None),
            PressureConfig::default(),
            PressureConfig::default().with_preconditioner(PreconditionerKind::MultigridDynamic),
            PressureConfig::default().with_preconditioner(PreconditionerKind::MultigridStatic),
            PressureConfig::default()
                .with_preconditioner(PreconditionerKind::MultigridDynamic)
                .with_solver(SolverMethod::MultigridVCycle),
        ];
        let mut cache = MultigridCache::new();
        for config in configs {
            let config = config.with_accuracy(1e-8).with_max_iter_factor(10.0);
            let mut rhs = rhs.clone();
            let mut pressure = vec![0.0; size.cell_count()];
            let report = solve_system(&inputs, &mut rhs, &mut pressure, &config, &mut cache).unwrap();
            assert!(report.converged, "{:?} {:?}", config.solver, config.preconditioner);
            assert!(report.pinned_cell.is_some());
            assert!(report.residual_norm <= 1e-8 * report.initial_residual_norm);
        }
        assert!(cache.is_built());
        assert!(!cache.first_pinning());
    }

    #[test]
    fn test_error_releases_static_cache() {
        let size = GridSize::planar(8, 8);
        let mut flags = FlagGrid::filled_fluid(size);
        flags.set(0, 7, 0, CellFlags::EMPTY);
        let config = PressureConfig::default().with_preconditioner(PreconditionerKind::MultigridStatic);
        let mut cache = MultigridCache::new();
        let mut rhs = vec![0.0; size.cell_count()];
        let mut pressure = vec![0.0; size.cell_count()];
        solve_system(&ProjectionInputs::new(&flags), &mut rhs, &mut pressure, &config, &mut cache).unwrap();
        assert!(cache.is_built());

        let mut short = vec![0.0; 3];
        let result = solve_system(&ProjectionInputs::new(&flags), &mut rhs, &mut short, &config, &mut cache);
        assert!(result.is_err());
        assert!(!cache.is_built());
    }
}
