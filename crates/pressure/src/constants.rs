//! Default tuning constants for the pressure solve.
//!
//! The trivial-equation scale and the ghost-fluid clamp are empirical. Values
//! much closer to the floating-point limit start to destabilise the Galerkin
//! coarsening, so treat them as knobs rather than contracts.

use crate::Real;

// =============================================================================
// CONJUGATE GRADIENT
// =============================================================================

/// Relative residual target of the outer solve.
pub const DEFAULT_ACCURACY: Real = 1e-3;

/// Iteration cap multiplier, applied to the largest grid extent.
pub const DEFAULT_MAX_ITER_FACTOR: Real = 1.5;

/// Planar grids get this many times the 3-D iteration budget.
pub const PLANAR_ITERATION_BOOST: usize = 4;

/// Requested accuracies tighter than this pin one pressure value automatically.
pub const AUTO_PIN_ACCURACY: Real = 1e-7;

/// Modified incomplete Cholesky: fraction of the dropped fill added back to the pivot.
pub const MIC_TUNING: Real = 0.97;

/// Modified incomplete Cholesky: pivots below this fraction of A0 fall back to A0.
pub const MIC_SAFETY: Real = 0.25;

// =============================================================================
// GHOST FLUID
// =============================================================================

/// Smallest admissible zero-crossing fraction.
pub const DEFAULT_GF_CLAMP: Real = 1e-4;

/// Denominators above this (the level set barely changes sign) fall back to a half-cell crossing.
pub const THETA_DENOMINATOR_LIMIT: Real = -1e-4;

// =============================================================================
// MULTIGRID
// =============================================================================

/// Scale applied to the diagonal and rhs of trivial equations before coarsening.
pub const DEFAULT_TRIVIAL_EQUATION_SCALE: Real = 1e-6;

/// Relative residual target of the coarsest-level solve.
pub const DEFAULT_COARSEST_ACCURACY: f64 = 1e-8;

/// Hard cap on coarsest-level CG iterations.
pub const COARSEST_MAX_ITERATIONS: usize = 10_000;

/// Coarsening stops once every axis is at most this long...
pub const COARSEST_MAX_EXTENT: usize = 5;

/// ...and the level holds at most this many cells.
pub const COARSEST_MAX_CELLS: usize = 1000;

/// Upper bound on hierarchy depth.
pub const MAX_LEVELS: usize = 100;

/// Coefficients per vertex on the finest level (centre and +x/+y/+z links).
pub const FINE_STENCIL_3D: usize = 4;
pub const FINE_STENCIL_2D: usize = 3;

/// Coefficients per vertex on coarse levels (upper half of the 27/9-point stencil).
pub const COARSE_STENCIL_3D: usize = 14;
pub const COARSE_STENCIL_2D: usize = 5;

// =============================================================================
// PARALLEL REDUCTIONS
// =============================================================================

/// Fixed chunk length for deterministic parallel reductions.
pub const REDUCTION_CHUNK: usize = 4096;
