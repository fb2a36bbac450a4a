//! Coarsest-level solve: sequential Jacobi-preconditioned CG in f64.

use super::level::{LevelView, VertexType};

/// Solve `A x = b` in place from a zero guess. Returns (iterations, relative residual).
pub(crate) fn solve_coarsest(
    view: LevelView<'_>,
    b: &[f64],
    x: &mut [f64],
    accuracy: f64,
    max_iterations: usize,
) -> (usize, f64) {
    let size = view.size;
    let n = size.cell_count();
    let active = |vi: usize| view.vtype[vi] != VertexType::Inactive && view.diagonal(vi) != 0.0;
    let apply = |src: &[f64], dst: &mut [f64]| {
        for vi in 0..n {
            dst[vi] = if active(vi) {
                view.row_product(size.position(vi), vi, src)
            } else {
                0.0
            };
        }
    };
    let dot = |a: &[f64], c: &[f64]| a.iter().zip(c).map(|(a, c)| a * c).sum::<f64>();

    x.fill(0.0);
    let mut r: Vec<f64> = (0..n).map(|vi| if active(vi) { b[vi] } else { 0.0 }).collect();
    let mut z: Vec<f64> = (0..n)
        .map(|vi| if active(vi) { r[vi] / view.diagonal(vi) } else { 0.0 })
        .collect();
    let mut p = z.clone();
    let mut q = vec![0.0; n];
    let mut sigma = dot(&r, &z);

    let initial = dot(&r, &r).sqrt();
    if initial == 0.0 {
        return (0, 0.0);
    }

    let mut relative = 1.0;
    for iteration in 1..=max_iterations {
        apply(&p, &mut q);
        let pq = dot(&p, &q);
        if pq == 0.0 || !pq.is_finite() {
            return (iteration - 1, relative);
        }
        let alpha = sigma / pq;
        for vi in 0..n {
            x[vi] += alpha * p[vi];
            r[vi] -= alpha * q[vi];
        }
        relative = dot(&r, &r).sqrt() / initial;
        if relative <= accuracy {
            return (iteration, relative);
        }
        for vi in 0..n {
            z[vi] = if active(vi) { r[vi] / view.diagonal(vi) } else { 0.0 };
        }
        let sigma_new = dot(&r, &z);
        let beta = sigma_new / sigma;
        for vi in 0..n {
            p[vi] = z[vi] + beta * p[vi];
        }
        sigma = sigma_new;
    }
    (max_iterations, relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridSize;
    use crate::multigrid::level::{Level, StencilLayout};
    use crate::multigrid::transfer::compute_residual;

    #[test]
    fn test_solves_small_system_exactly() {
        let size = GridSize::planar(5, 4);
        let mut level = Level::new(size, StencilLayout::Box).unwrap();
        for vi in 0..size.cell_count() {
            level.vtype[vi] = VertexType::Active;
            let p = size.position(vi);
            level.stencil[vi * level.width] = 4.5;
            if p.x + 1 < 5 {
                level.stencil[vi * level.width + 1] = -1.0;
            }
            if p.y + 1 < 4 {
                level.stencil[vi * level.width + 3] = -1.0;
            }
        }
        let b: Vec<f64> = (0..20).map(|i| (i as f64) - 9.5).collect();
        let mut x = vec![0.0; 20];
        let (iterations, relative) = solve_coarsest(level.view(), &b, &mut x, 1e-10, 1000);
        assert!(iterations > 0);
        assert!(relative <= 1e-10);

        let mut r = vec![0.0; 20];
        compute_residual(level.view(), &x, &b, &mut r);
        assert!(r.iter().all(|v| v.abs() < 1e-8));
    }
}
