//! Project a sluice-like channel with every solver and compare them.
//!
//! Run with: RUST_LOG=info cargo run -p pressure --example box_projection [config.json]

use std::path::Path;
use std::time::Instant;

use glam::IVec3;
use pressure::{
    project, Axis, CellFlags, FlagGrid, GridSize, MacGrid, MultigridCache, PreconditionerKind,
    PressureConfig, ProjectionInputs, SolverMethod,
};

const NX: usize = 48;
const NY: usize = 20;
const NZ: usize = 12;
const WATER_LEVEL: usize = 12;
const RIFFLE_SPACING: usize = 8;

/// Channel with riffles on the floor, water below `WATER_LEVEL`, air above.
fn build_channel() -> FlagGrid {
    let size = GridSize::new(NX, NY, NZ);
    let mut flags = FlagGrid::new(size, CellFlags::EMPTY);
    for k in 0..NZ {
        for j in 0..WATER_LEVEL {
            for i in 0..NX {
                flags.set(i, j, k, CellFlags::FLUID);
            }
        }
        for i in (RIFFLE_SPACING..NX).step_by(RIFFLE_SPACING) {
            flags.set(i, 0, k, CellFlags::OBSTACLE);
            flags.set(i, 1, k, CellFlags::OBSTACLE);
        }
    }
    flags
}

/// Inflow through the x = 0 wall plus gravity-like downward motion.
fn initial_velocity(size: GridSize) -> MacGrid {
    let mut vel = MacGrid::new(size);
    for k in 0..size.nz {
        for j in 2..WATER_LEVEL {
            vel.set_face(Axis::X, IVec3::new(0, j as i32, k as i32), 1.5);
        }
    }
    vel.v.iter_mut().for_each(|v| *v = -0.1);
    vel
}

fn max_divergence(flags: &FlagGrid, vel: &MacGrid) -> f64 {
    let size = flags.size();
    (0..size.cell_count())
        .filter(|&idx| flags.is_fluid(idx))
        .map(|idx| vel.divergence_at(size.position(idx)).abs())
        .fold(0.0, f64::max)
}

fn main() {
    env_logger::init();

    let base = match std::env::args().nth(1) {
        Some(path) => match PressureConfig::load_json(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => PressureConfig::default().with_accuracy(1e-6),
    };

    let flags = build_channel();
    let size = flags.size();
    println!("=== PRESSURE PROJECTION: {} grid, {} fluid cells ===\n", size, flags.count_fluid());

    let runs = [
        ("CG", PreconditionerKind::None, SolverMethod::ConjugateGradient),
        ("MIC-PCG", PreconditionerKind::ModifiedIncompleteCholesky, SolverMethod::ConjugateGradient),
        ("MG-PCG (dynamic)", PreconditionerKind::MultigridDynamic, SolverMethod::ConjugateGradient),
        ("MG-PCG (static)", PreconditionerKind::MultigridStatic, SolverMethod::ConjugateGradient),
        ("MG V-cycles", PreconditionerKind::MultigridDynamic, SolverMethod::MultigridVCycle),
    ];

    let mut cache = MultigridCache::new();
    let inputs = ProjectionInputs::new(&flags);
    for (label, preconditioner, solver) in runs {
        let config = base
            .clone()
            .with_preconditioner(preconditioner)
            .with_solver(solver);
        let mut vel = initial_velocity(size);
        let before = max_divergence(&flags, &vel);
        let mut pressure = vec![0.0; size.cell_count()];

        let start = Instant::now();
        match project(&inputs, &mut vel, &mut pressure, &config, &mut cache) {
            Ok(report) => {
                let elapsed = start.elapsed();
                println!(
                    "{:18} iters={:4} residual={:10.3e} converged={:5} max_div {:8.4} -> {:10.3e} ({:.1} ms)",
                    label,
                    report.iterations,
                    report.residual_norm,
                    report.converged,
                    before,
                    max_divergence(&flags, &vel),
                    elapsed.as_secs_f64() * 1000.0
                );
            }
            Err(e) => println!("{:18} failed: {}", label, e),
        }
    }

    // Second static solve reuses the cached hierarchy.
    let config = base.with_preconditioner(PreconditionerKind::MultigridStatic);
    let mut vel = initial_velocity(size);
    let mut pressure = vec![0.0; size.cell_count()];
    let start = Instant::now();
    if let Ok(report) = project(&inputs, &mut vel, &mut pressure, &config, &mut cache) {
        println!(
            "\nCached MG-PCG: {} iterations in {:.1} ms",
            report.iterations,
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
    cache.release();
}
