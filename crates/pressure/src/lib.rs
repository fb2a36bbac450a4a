//! Pressure projection for MAC-grid fluids
//!
//! Builds the cell-centred pressure Poisson system from cell flags, solves it
//! with preconditioned Conjugate Gradient (MIC or Galerkin multigrid) or with
//! standalone multigrid V-cycles, and subtracts the pressure gradient from the
//! face velocities. Free surfaces use either a plain zero-pressure boundary or
//! ghost-fluid extrapolation from a level set.
//!
//! # Example
//!
//! ```
//! use pressure::{
//!     project, Axis, CellFlags, FlagGrid, GridSize, MacGrid, MultigridCache, PressureConfig,
//!     ProjectionInputs,
//! };
//! use glam::IVec3;
//!
//! let size = GridSize::new(8, 8, 8);
//! let mut flags = FlagGrid::filled_fluid(size);
//! for i in 0..8 {
//!     for k in 0..8 {
//!         flags.set(i, 7, k, CellFlags::EMPTY);
//!     }
//! }
//!
//! let mut vel = MacGrid::new(size);
//! vel.set_face(Axis::X, IVec3::new(4, 3, 4), 1.0);
//!
//! let mut pressure = vec![0.0; size.cell_count()];
//! let mut cache = MultigridCache::new();
//! let report = project(
//!     &ProjectionInputs::new(&flags),
//!     &mut vel,
//!     &mut pressure,
//!     &PressureConfig::default(),
//!     &mut cache,
//! )
//! .unwrap();
//! assert!(report.residual_norm < report.initial_residual_norm);
//! ```

/// Scalar type of every solver buffer.
pub type Real = f64;

pub mod cg;
pub mod config;
pub mod constants;
pub mod error;
pub mod grid;
pub mod multigrid;
pub mod pipeline;
pub mod stencil;

pub use cg::{ConjugateGradient, MicFactor, Preconditioner};
pub use config::{PreconditionerKind, PressureConfig, SolverMethod, StoppingNorm};
pub use error::{ProjectionError, ProjectionResult};
pub use grid::{Axis, CellFlags, FlagGrid, GridSize, MacGrid};
pub use multigrid::{MultigridHierarchy, MultigridSettings, VCycleSolve, VertexType};
pub use pipeline::{
    compute_rhs, correct_velocity, project, solve_system, MultigridCache, ProjectionInputs,
    SolveReport,
};
pub use stencil::{StencilKernel, StencilMatrix, StencilSystem};
