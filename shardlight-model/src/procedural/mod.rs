//! Procedurally generated meshes.

mod cap;
mod tube;

pub use cap::generate_cap;
pub use tube::{generate_double_tube, generate_tube, generate_tube3, generate_tube4, CURVED_PART, INNER_SHELL};

use crate::geom::mesh::Mesh;

use na::{Point2, Point3, Vector3};

/// Row-major index into a grid with `cols` columns, offset by `start`.
pub(crate) fn grid_index(start: u32, cols: usize, i: usize, j: usize) -> u32 {
    start + (i * cols + j) as u32
}

/// Two triangles per cell of an `(rows) x (cols)` vertex grid starting at vertex `start`.
pub(crate) fn push_grid_triangles(mesh: &mut Mesh, start: u32, rows: usize, cols: usize) {
    for i in 0..rows.saturating_sub(1) {
        for j in 0..cols.saturating_sub(1) {
            let curr = grid_index(start, cols, i, j);
            let next_a = grid_index(start, cols, i + 1, j);
            let next_b = grid_index(start, cols, i, j + 1);
            let next_ab = grid_index(start, cols, i + 1, j + 1);
            mesh.push_triangle(curr, next_b, next_a);
            mesh.push_triangle(next_a, next_b, next_ab);
        }
    }
}

/// A flat `a x b` cell grid of size `x` by `y`, centred on the origin in the XY plane and facing +Z.
pub fn make_grid(a: usize, b: usize, x: f32, y: f32) -> Mesh {
    let (a, b) = (a.max(1), b.max(1));
    let mut res = Mesh::with_capacity("grid", (a + 1) * (b + 1), 2 * a * b);
    for i in 0..=a {
        let ti = i as f32 / a as f32;
        for j in 0..=b {
            let tj = j as f32 / b as f32;
            res.push_vertex(
                Point3::new((tj - 0.5) * x, (ti - 0.5) * y, 0.),
                Vector3::z(),
                Point2::new(tj, ti),
            );
        }
    }
    push_grid_triangles(&mut res, 0, a + 1, b + 1);
    res.calculate_tangents();
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_counts_and_facing() {
        let g = make_grid(3, 5, 2., 4.);
        assert_eq!(g.vertex_count(), 4 * 6);
        assert_eq!(g.triangle_count(), 2 * 3 * 5);
        assert_eq!(g.validate(), Ok(()));
        for t in 0..g.triangle_count() {
            assert!((g.face_normal(t) - Vector3::z()).norm() < 1e-5);
        }
        for tangent in g.tangents.iter() {
            assert!((tangent - Vector3::x()).norm() < 1e-5);
        }
    }

    #[test]
    fn grid_is_centred() {
        let g = make_grid(2, 2, 2., 2.);
        let (min, max) = g.positions.iter().fold(
            (Point3::new(f32::MAX, f32::MAX, 0.), Point3::new(f32::MIN, f32::MIN, 0.)),
            |(lo, hi), p| (lo.inf(p), hi.sup(p)),
        );
        assert_eq!(min, Point3::new(-1., -1., 0.));
        assert_eq!(max, Point3::new(1., 1., 0.));
    }
}
