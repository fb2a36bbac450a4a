//! Subtract the pressure gradient from the face velocities.

use glam::IVec3;
use rayon::prelude::*;

use super::{check_mac, ProjectionInputs};
use crate::config::PressureConfig;
use crate::error::{ProjectionError, ProjectionResult};
use crate::grid::{Axis, FlagGrid, MacGrid};
use crate::stencil::ghost_fluid::{clamped_theta, was_clamped};
use crate::Real;

/// Free-surface data for the ghost-fluid face terms.
struct GhostFluid<'a> {
    phi: &'a [Real],
    tension: Option<(&'a [Real], Real)>,
    clamp: Real,
}

impl GhostFluid<'_> {
    /// `sigma * kappa` at the zero crossing between a fluid and an empty cell.
    fn interface_pressure(&self, fluid: usize, empty: usize, theta: Real) -> Real {
        self.tension.map_or(0.0, |(curvature, sigma)| {
            sigma * (curvature[fluid] + theta * (curvature[empty] - curvature[fluid]))
        })
    }
}

/// Apply `u -= grad p` on every face.
///
/// Faces between two fluid cells take the full difference; empty cells
/// count as zero pressure, or as the ghost-fluid extrapolation when `phi` is
/// given. Faces of outflow cells are left alone and faces between an empty
/// and a non-fluid cell are zeroed.
pub fn correct_velocity(
    inputs: &ProjectionInputs<'_>,
    vel: &mut MacGrid,
    pressure: &[Real],
    config: &PressureConfig,
) -> ProjectionResult<()> {
    inputs.validate()?;
    let flags = inputs.flags;
    let size = flags.size();
    check_mac("velocity", size, vel)?;
    ProjectionError::check_len("pressure", size.cell_count(), pressure.len())?;

    let ghost = inputs.phi.map(|phi| GhostFluid {
        phi,
        tension: inputs
            .surface_tension_terms()
            .map(|(_, curvature, sigma)| (curvature, sigma)),
        clamp: config.gf_clamp,
    });

    for &axis in Axis::active(size) {
        let e = axis.unit();
        vel.component_mut(axis)
            .par_iter_mut()
            .enumerate()
            .for_each(|(fi, u)| {
                let r = MacGrid::face_position(size, axis, fi);
                *u = corrected_face(flags, pressure, ghost.as_ref(), *u, r - e, r);
            });
    }

    if let Some(gf) = &ghost {
        if config.replace_clamped_ghost_velocities {
            replace_clamped_faces(flags, vel, gf);
        }
    }
    Ok(())
}

/// New value of the face between cells `l` and `r = l + e`.
fn corrected_face(
    flags: &FlagGrid,
    pressure: &[Real],
    ghost: Option<&GhostFluid<'_>>,
    mut u: Real,
    l: IVec3,
    r: IVec3,
) -> Real {
    let size = flags.size();
    if flags.is_fluid_at(r) {
        let ri = size.index_of(r);
        if flags.is_fluid_at(l) {
            u -= pressure[ri] - pressure[size.index_of(l)];
        } else if flags.is_empty_at(l) {
            u -= pressure[ri];
            if let Some(gf) = ghost {
                let li = size.index_of(l);
                let t = clamped_theta(gf.phi[ri], gf.phi[li], gf.clamp);
                u += pressure[ri] * (1.0 - 1.0 / t) + gf.interface_pressure(ri, li, t) / t;
            }
        }
    } else if flags.is_empty_at(r) && !flags.is_outflow_at(r) {
        if flags.is_fluid_at(l) {
            let li = size.index_of(l);
            u += pressure[li];
            if let Some(gf) = ghost {
                let ri = size.index_of(r);
                let t = clamped_theta(gf.phi[li], gf.phi[ri], gf.clamp);
                u -= pressure[li] * (1.0 - 1.0 / t) + gf.interface_pressure(li, ri, t) / t;
            }
        } else {
            u = 0.0;
        }
    }
    u
}

/// Faces whose ghost-fluid weight hit the clamp copy the velocity of the
/// fluid cell's opposite face.
fn replace_clamped_faces(flags: &FlagGrid, vel: &mut MacGrid, gf: &GhostFluid<'_>) {
    let size = flags.size();
    let mut replaced = 0usize;
    for &axis in Axis::active(size) {
        let e = axis.unit();
        let before = vel.component(axis).to_vec();
        for idx in 0..size.cell_count() {
            if !flags.is_empty(idx) || flags.is_outflow(idx) {
                continue;
            }
            let p = size.position(idx);

            let l = p - e;
            if flags.is_fluid_at(l) && was_clamped(gf.phi[size.index_of(l)], gf.phi[idx], gf.clamp) {
                vel.set_face(axis, p, before[vel.face_index(axis, l)]);
                replaced += 1;
            }
            let r = p + e;
            if flags.is_fluid_at(r) && was_clamped(gf.phi[size.index_of(r)], gf.phi[idx], gf.clamp) {
                vel.set_face(axis, r, before[vel.face_index(axis, r + e)]);
                replaced += 1;
            }
        }
    }
    if replaced > 0 {
        log::debug!("Pressure: replaced {} clamped ghost-fluid face velocities", replaced);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellFlags, GridSize};

    fn row(cells: &[CellFlags]) -> FlagGrid {
        let mut flags = FlagGrid::filled_fluid(GridSize::planar(cells.len(), 1));
        for (i, &f) in cells.iter().enumerate() {
            flags.set(i, 0, 0, f);
        }
        flags
    }

    fn x_face(i: i32) -> IVec3 {
        IVec3::new(i, 0, 0)
    }

    #[test]
    fn test_fluid_faces_take_pressure_difference() {
        let flags = row(&[CellFlags::FLUID, CellFlags::FLUID]);
        let mut vel = MacGrid::new(flags.size());
        vel.u.fill(0.5);
        correct_velocity(&ProjectionInputs::new(&flags), &mut vel, &[1.0, 3.0], &PressureConfig::default()).unwrap();
        // Domain walls are obstacles and keep their velocity.
        assert_eq!(vel.u, vec![0.5, -1.5, 0.5]);
    }

    #[test]
    fn test_empty_faces() {
        let mut flags = row(&[CellFlags::FLUID, CellFlags::EMPTY, CellFlags::EMPTY]);
        let mut vel = MacGrid::new(flags.size());
        vel.u.fill(5.0);
        let config = PressureConfig::default();
        correct_velocity(&ProjectionInputs::new(&flags), &mut vel, &[2.0, 0.0, 0.0], &config).unwrap();
        assert_eq!(vel.u, vec![5.0, 7.0, 0.0, 5.0]);

        flags.set(2, 0, 0, CellFlags::EMPTY | CellFlags::OUTFLOW);
        vel.u.fill(5.0);
        correct_velocity(&ProjectionInputs::new(&flags), &mut vel, &[2.0, 0.0, 0.0], &config).unwrap();
        assert_eq!(vel.face(Axis::X, x_face(2)), 5.0);
    }

    #[test]
    fn test_ghost_fluid_extrapolates_pressure() {
        let flags = row(&[CellFlags::FLUID, CellFlags::EMPTY]);
        let phi = [-0.5, 0.5];
        let mut vel = MacGrid::new(flags.size());
        let inputs = ProjectionInputs::new(&flags).with_phi(&phi);
        correct_velocity(&inputs, &mut vel, &[2.0, 0.0], &PressureConfig::default()).unwrap();
        // theta = 0.5: ghost pressure -2, gradient -4.
        assert!((vel.face(Axis::X, x_face(1)) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_clamped_faces_copy_far_face() {
        let flags = row(&[CellFlags::FLUID, CellFlags::FLUID, CellFlags::EMPTY]);
        let phi = [-1.0, -1e-5, 1.0];
        let pressure = [0.0; 3];
        let inputs = ProjectionInputs::new(&flags).with_phi(&phi);

        let mut vel = MacGrid::new(flags.size());
        vel.set_face(Axis::X, x_face(1), 0.7);
        vel.set_face(Axis::X, x_face(2), 9.0);
        correct_velocity(&inputs, &mut vel, &pressure, &PressureConfig::default()).unwrap();
        assert_eq!(vel.face(Axis::X, x_face(2)), 0.7);

        let mut config = PressureConfig::default();
        config.replace_clamped_ghost_velocities = false;
        let mut vel = MacGrid::new(flags.size());
        vel.set_face(Axis::X, x_face(2), 9.0);
        correct_velocity(&inputs, &mut vel, &pressure, &config).unwrap();
        assert_eq!(vel.face(Axis::X, x_face(2)), 9.0);
    }
}
