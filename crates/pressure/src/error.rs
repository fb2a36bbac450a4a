//! Error types for the pressure projection crate.
//!
//! Structural problems (shape mismatches, missing fields for a requested
//! feature, failed allocations) surface as [`ProjectionError`]. Slow
//! convergence and degenerate rows are not errors; they are reported through
//! [`crate::pipeline::SolveReport`] and the log.

use std::collections::TryReserveError;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Errors raised by stencil assembly, the solvers and the pipeline.
#[derive(Error, Debug)]
pub enum ProjectionError {
    /// A coefficient buffer does not match the grid extent.
    #[error("stencil buffer `{buffer}` has {found} coefficients, expected {expected}")]
    StencilShape {
        buffer: &'static str,
        expected: usize,
        found: usize,
    },

    /// A planar system was handed non-zero coefficients in the z link buffer.
    #[error("stencil buffer `ak` must be zero for a planar grid (cell {cell} = {value})")]
    PlanarStencil { cell: usize, value: f64 },

    /// A field does not match the grid extent.
    #[error("field `{field}` has {found} entries, expected {expected}")]
    SizeMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    /// A feature was requested without the field it depends on.
    #[error("`{feature}` requires the `{field}` field")]
    MissingField {
        feature: &'static str,
        field: &'static str,
    },

    /// A grid extent has a zero-length axis.
    #[error("grid extent must be positive, got {nx}x{ny}x{nz}")]
    EmptyExtent { nx: usize, ny: usize, nz: usize },

    /// A multigrid operation ran before `set_a`.
    #[error("multigrid hierarchy has no operator, call set_a first")]
    OperatorNotSet,

    /// Level storage could not be reserved.
    #[error("failed to allocate {count} values for {what}")]
    Allocation {
        what: &'static str,
        count: usize,
        #[source]
        source: TryReserveError,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ProjectionError {
    /// Check a field length against the expected cell or face count.
    pub fn check_len(field: &'static str, expected: usize, found: usize) -> ProjectionResult<()> {
        if expected == found {
            Ok(())
        } else {
            Err(ProjectionError::SizeMismatch {
                field,
                expected,
                found,
            })
        }
    }
}

/// Allocate a zero-filled buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_zeroed<T: Clone + Default>(
    what: &'static str,
    count: usize,
) -> ProjectionResult<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(count)
        .map_err(|source| ProjectionError::Allocation { what, count, source })?;
    buffer.resize(count, T::default());
    Ok(buffer)
}
