//! Caller-owned multigrid hierarchy for the static preconditioner mode.

use crate::error::{ProjectionError, ProjectionResult};
use crate::grid::GridSize;
use crate::multigrid::{MultigridHierarchy, MultigridSettings};
use crate::stencil::StencilMatrix;

/// Keeps one hierarchy alive across solves.
///
/// The operator is built on first use and reused while the grid extent and
/// settings stay the same. Call [`release`](Self::release) when the geometry
/// changes so the next solve rebuilds it.
///
/// Also remembers whether pinning has been logged for this owner.
#[derive(Default)]
pub struct MultigridCache {
    hierarchy: Option<MultigridHierarchy>,
    pinning_reported: bool,
}

impl MultigridCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_built(&self) -> bool {
        self.hierarchy.is_some()
    }

    pub fn hierarchy(&self) -> Option<&MultigridHierarchy> {
        self.hierarchy.as_ref()
    }

    /// True the first time it is called for this cache.
    pub(crate) fn first_pinning(&mut self) -> bool {
        !std::mem::replace(&mut self.pinning_reported, true)
    }

    pub fn release(&mut self) {
        if self.hierarchy.take().is_some() {
            log::debug!("Multigrid: released cached hierarchy");
        }
    }

    /// Cached hierarchy for `size`, building and setting `matrix` when missing
    /// or stale. With `refresh_operator` a reused hierarchy is also re-set to
    /// `matrix`. Nothing is cached if building fails.
    pub(crate) fn prepare(
        &mut self,
        size: GridSize,
        settings: MultigridSettings,
        matrix: &StencilMatrix,
        refresh_operator: bool,
    ) -> ProjectionResult<&mut MultigridHierarchy> {
        let reusable = matches!(
            &self.hierarchy,
            Some(mg) if mg.is_a_set() && mg.level_size(0) == size && *mg.settings() == settings
        );
        if reusable && refresh_operator {
            if let Some(mg) = self.hierarchy.as_mut() {
                if let Err(e) = mg.set_a(matrix) {
                    self.hierarchy = None;
                    return Err(e);
                }
                log::trace!("Multigrid: refreshed cached operator for {}", size);
            }
        } else if !reusable {
            self.hierarchy = None;
            let mut mg = MultigridHierarchy::new(size, settings)?;
            mg.set_a(matrix)?;
            log::info!("Multigrid: cached static hierarchy for {}", size);
            self.hierarchy = Some(mg);
        }
        self.hierarchy.as_mut().ok_or(ProjectionError::OperatorNotSet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellFlags, FlagGrid};
    use crate::stencil::make_laplace_matrix;

    #[test]
    fn test_prepare_rebuilds_for_new_extent() {
        let size = GridSize::planar(12, 12);
        let mut flags = FlagGrid::filled_fluid(size);
        flags.set(0, 11, 0, CellFlags::EMPTY);
        let matrix = make_laplace_matrix(&flags, None).unwrap();

        let mut cache = MultigridCache::new();
        assert!(!cache.is_built());
        let levels = cache
            .prepare(size, MultigridSettings::default(), &matrix, false)
            .unwrap()
            .num_levels();
        assert!(levels > 1);
        assert!(cache.is_built());

        let small = GridSize::planar(8, 8);
        let mut small_flags = FlagGrid::filled_fluid(small);
        small_flags.set(0, 7, 0, CellFlags::EMPTY);
        let small_matrix = make_laplace_matrix(&small_flags, None).unwrap();
        cache.prepare(small, MultigridSettings::default(), &small_matrix, false).unwrap();
        assert_eq!(cache.hierarchy().map(|mg| mg.level_size(0)), Some(small));

        cache.release();
        assert!(!cache.is_built());
    }

    #[test]
    fn test_refresh_replaces_cached_operator() {
        let size = GridSize::planar(12, 12);
        let mut flags = FlagGrid::filled_fluid(size);
        flags.set(0, 11, 0, CellFlags::EMPTY);
        let first = make_laplace_matrix(&flags, None).unwrap();
        for j in 6..size.ny {
            for i in 0..size.nx {
                flags.set(i, j, 0, CellFlags::EMPTY);
            }
        }
        let second = make_laplace_matrix(&flags, None).unwrap();
        let top = size.index(3, 8, 0);

        let mut cache = MultigridCache::new();
        let settings = MultigridSettings::default();
        cache.prepare(size, settings, &first, false).unwrap();
        assert!(cache.hierarchy().unwrap().vertex_type(0, top).is_active());

        cache.prepare(size, settings, &second, false).unwrap();
        assert!(cache.hierarchy().unwrap().vertex_type(0, top).is_active());

        cache.prepare(size, settings, &second, true).unwrap();
        assert!(!cache.hierarchy().unwrap().vertex_type(0, top).is_active());
    }

    #[test]
    fn test_first_pinning_survives_release() {
        let mut cache = MultigridCache::new();
        assert!(cache.first_pinning());
        assert!(!cache.first_pinning());
        cache.release();
        assert!(!cache.first_pinning());
        assert!(MultigridCache::new().first_pinning());
    }

    #[test]
    fn test_failed_build_leaves_cache_empty() {
        let size = GridSize::planar(12, 12);
        let flags = FlagGrid::filled_fluid(GridSize::planar(6, 6));
        let wrong = make_laplace_matrix(&flags, None).unwrap();

        let mut cache = MultigridCache::new();
        assert!(cache.prepare(size, MultigridSettings::default(), &wrong, false).is_err());
        assert!(!cache.is_built());
    }
}
