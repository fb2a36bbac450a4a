//! Behaviour of the ghost-fluid weight around the clamp threshold
//!
//! One fluid cell next to one empty cell; the level set is chosen so that the
//! zero crossing sits at a prescribed fraction `theta` towards the empty cell.

use glam::IVec3;
use pressure::stencil::ghost_fluid::{clamped_theta, theta, was_clamped};
use pressure::stencil::{apply_ghost_fluid_diagonal, make_laplace_matrix};
use pressure::{correct_velocity, Axis, CellFlags, FlagGrid, GridSize, MacGrid, PressureConfig, ProjectionInputs};

const CLAMP: f64 = 1e-4;

fn surface_row() -> FlagGrid {
    let mut flags = FlagGrid::filled_fluid(GridSize::planar(2, 1));
    flags.set(1, 0, 0, CellFlags::EMPTY);
    flags
}

/// Level set whose crossing between the two cell centres is at `t`.
fn phi_for(t: f64) -> Vec<f64> {
    vec![-t / (1.0 - t), 1.0]
}

fn ghost_diagonal(t: f64) -> f64 {
    let flags = surface_row();
    let mut matrix = make_laplace_matrix(&flags, None).unwrap();
    apply_ghost_fluid_diagonal(&mut matrix, &flags, &phi_for(t), CLAMP).unwrap();
    matrix.a0[0]
}

fn surface_face_velocity(t: f64) -> f64 {
    let flags = surface_row();
    let phi = phi_for(t);
    let mut config = PressureConfig::default().with_gf_clamp(CLAMP);
    config.replace_clamped_ghost_velocities = false;
    let mut vel = MacGrid::new(flags.size());
    correct_velocity(&ProjectionInputs::new(&flags).with_phi(&phi), &mut vel, &[1.0, 0.0], &config).unwrap();
    vel.face(Axis::X, IVec3::new(1, 0, 0))
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs())
}

#[test]
fn test_level_set_places_crossing() {
    for t in [0.3, 0.5, 0.9] {
        let phi = phi_for(t);
        assert!((theta(phi[0], phi[1]) - t).abs() < 1e-12);
    }
}

#[test]
fn test_threshold_matches_below_threshold() {
    let below = CLAMP * 0.1;
    assert!(was_clamped(phi_for(below)[0], 1.0, CLAMP));
    assert_eq!(clamped_theta(phi_for(below)[0], 1.0, CLAMP), CLAMP);

    assert!(close(ghost_diagonal(CLAMP), ghost_diagonal(below)));
    assert!(close(surface_face_velocity(CLAMP), surface_face_velocity(below)));
}

#[test]
fn test_above_threshold_is_smaller() {
    let at = ghost_diagonal(CLAMP);
    let above = ghost_diagonal(0.3);
    // One wall-free face plus 1/theta - 1.
    assert!((above - (1.0 + 1.0 / 0.3 - 1.0)).abs() < 1e-9);
    assert!(above < at / 100.0);

    let face_at = surface_face_velocity(CLAMP);
    let face_above = surface_face_velocity(0.3);
    assert!(face_above.abs() < face_at.abs() / 100.0);
    assert!((face_above - 1.0 / 0.3).abs() < 1e-9);
}
