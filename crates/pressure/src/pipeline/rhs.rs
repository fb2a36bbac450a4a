//! Right-hand side of the pressure equation: negative face divergence.

use glam::IVec3;
use rayon::prelude::*;

use super::{check_mac, ProjectionInputs};
use crate::config::PressureConfig;
use crate::error::{ProjectionError, ProjectionResult};
use crate::grid::{Axis, MacGrid};
use crate::stencil::ghost_fluid::{clamped_theta, for_each_empty_neighbour};
use crate::Real;

/// Fill `rhs` with `-div(vel)` on fluid cells and zero elsewhere.
///
/// With fractions, each face contributes `frac * u + (1 - frac) * u_obstacle`;
/// without them, faces towards an obstacle take the obstacle velocity when
/// one is given. The divergence correction and ghost-fluid surface tension
/// are added on top, then the fluid mean is removed if requested.
pub fn compute_rhs(
    inputs: &ProjectionInputs<'_>,
    vel: &MacGrid,
    rhs: &mut [Real],
    config: &PressureConfig,
) -> ProjectionResult<()> {
    inputs.validate()?;
    let flags = inputs.flags;
    let size = flags.size();
    check_mac("velocity", size, vel)?;
    ProjectionError::check_len("rhs", size.cell_count(), rhs.len())?;

    let face_flux = |axis: Axis, face: IVec3, neighbour: IVec3| -> Real {
        let u = vel.face(axis, face);
        match (inputs.fractions, inputs.obstacle_velocity) {
            (Some(frac), obvel) => {
                let f = frac.face(axis, face);
                f * u + obvel.map_or(0.0, |ov| (1.0 - f) * ov.face(axis, face))
            }
            (None, Some(ov)) if flags.is_obstacle_at(neighbour) => ov.face(axis, face),
            _ => u,
        }
    };
    let tension = inputs.surface_tension_terms();
    let clamp = config.gf_clamp;

    rhs.par_iter_mut().enumerate().for_each(|(idx, out)| {
        if !flags.is_fluid(idx) {
            *out = 0.0;
            return;
        }
        let p = size.position(idx);
        let mut set = 0.0;
        for &axis in Axis::active(size) {
            let e = axis.unit();
            set += face_flux(axis, p, p - e) - face_flux(axis, p + e, p + e);
        }

        if let Some(correction) = inputs.divergence_correction {
            set += correction[idx];
        }

        if let Some((phi, curvature, sigma)) = tension {
            for_each_empty_neighbour(flags, p, |nb| {
                let ni = size.index_of(nb);
                let t = clamped_theta(phi[idx], phi[ni], clamp);
                let kappa = curvature[idx] + t * (curvature[ni] - curvature[idx]);
                set += sigma * kappa / t;
            });
        }
        *out = set;
    });

    if config.enforce_compatibility {
        let (sum, count) = rhs
            .iter()
            .enumerate()
            .filter(|&(idx, _)| flags.is_fluid(idx))
            .fold((0.0, 0usize), |(s, c), (_, &v)| (s + v, c + 1));
        if count > 0 {
            let mean = sum / count as Real;
            log::debug!("Pressure: removing rhs mean {:.3e} over {} fluid cells", mean, count);
            for (idx, v) in rhs.iter_mut().enumerate() {
                if flags.is_fluid(idx) {
                    *v -= mean;
                }
            }
        }
    }
    Ok(())
}
