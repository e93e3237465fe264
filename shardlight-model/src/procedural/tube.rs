use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use super::push_grid_triangles;
use crate::geom::{mesh::Mesh, ops};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Matrix3, Point2, Point3, Rotation3, Vector3};

/// Fraction of the tube length spent bending. The rest is split evenly between the straight
/// lead-in and lead-out.
pub const CURVED_PART: f32 = 0.6;
/// Radius of the inner wall of a double tube, relative to the outer one.
pub const INNER_SHELL: f32 = 0.85;

/// Position and orientation of one cross-section along the axis.
struct Slice {
    center: Point3<f32>,
    /// Rotation of the cross-section about +Y.
    theta: f32,
}

/// The tube axis: straight lead-in, an arc turning through `bend * PI/4`, straight lead-out.
///
/// The lead-out always lies on +Z ending at `length / 2`, so every bend shares the same exit.
/// The entry sits at `z = -K` with `K = (length - 2 * radius) / 2`, so a thicker tube starts
/// further in and its arc widens to keep the pieces joined.
struct Axis {
    length: f32,
    radius: f32,
    bend: f32,
}

impl Axis {
    fn z(&self, ti: f32) -> f32 {
        (self.length / 2.) * ti + (-self.length / 2.) * (1. - ti)
    }

    fn k(&self) -> f32 {
        (self.length - 2. * self.radius) / 2.
    }

    fn slice(&self, ti: f32) -> Slice {
        if self.bend.abs() < f32::EPSILON {
            return Slice { center: Point3::new(0., 0., self.z(ti)), theta: 0. };
        }
        let first_part = (1. - CURVED_PART) / 2.;
        let total = self.bend * FRAC_PI_4;
        let lead_in = first_part * self.length;
        let arc_end = self.z(1. - first_part);
        // Solved so the entry lands on -K. Signed: a negative bend curves the other way with
        // the same formulas.
        let arc_radius = (arc_end + self.k() - lead_in * total.cos()) / total.sin();
        let on_arc = |theta: f32| {
            Point3::new(arc_radius * (theta.cos() - 1.), 0., arc_end - arc_radius * theta.sin())
        };

        if ti <= first_part {
            let start = on_arc(total);
            let back = lead_in * (1. - ti / first_part);
            let dir = Vector3::new(total.sin(), 0., total.cos());
            Slice { center: start - dir * back, theta: total }
        } else if ti < 1. - first_part {
            let t = ((ti - first_part) / CURVED_PART).clamp(0., 1.);
            let theta = total * (1. - t);
            Slice { center: on_arc(theta), theta }
        } else {
            Slice { center: Point3::new(0., 0., self.z(ti)), theta: 0. }
        }
    }
}

/// Sweeps the half-circle profile along the axis and appends the grid to `res`.
#[allow(clippy::too_many_arguments)]
fn sweep(res: &mut Mesh, length: f32, radius: f32, bend: f32, a: usize, b: usize, uv_offset: f32, inward: bool) {
    let start = res.vertex_count() as u32;
    let axis = Axis { length, radius, bend };
    for i in 0..=a {
        let ti = i as f32 / a as f32;
        let slice = axis.slice(ti);
        let (sin, cos) = slice.theta.sin_cos();
        for j in 0..=b {
            let tj = j as f32 / b as f32;
            let x = (tj * PI).sin() * radius;
            let y = -(tj * PI).cos() * radius;
            // 2x2 rotation of the profile in the XZ plane.
            let offset = Vector3::new(x * cos, y, -x * sin);
            let point = slice.center + offset;
            let n = offset.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::y);
            res.push_vertex(
                point,
                if inward { -n } else { n },
                Point2::new(ti, tj * length / radius + uv_offset),
            );
        }
    }
    push_grid_triangles(res, start, a + 1, b + 1);
}

/// A half-pipe of the given length and radius swept along a (possibly bent) axis.
///
/// Produces an `(a + 1) x (b + 1)` vertex grid, `a` steps along the axis and `b` around the
/// profile, with two triangles per cell. `bend == 0` gives a straight tube along Z.
pub fn generate_tube(length: f32, radius: f32, bend: f32, a: usize, b: usize) -> Mesh {
    let (a, b) = (a.max(1), b.max(1));
    let mut res = Mesh::with_capacity("tube", (a + 1) * (b + 1), 2 * a * b);
    sweep(&mut res, length, radius, bend, a, b, 0., false);
    res.calculate_tangents();
    trace!("Generated tube with {} vertices (bend {}).", res.vertex_count(), bend);
    res
}

/// A double walled tube: the outer shell fused with an inner one at `INNER_SHELL * radius`
/// facing the bore.
pub fn generate_double_tube(length: f32, radius: f32, bend: f32, a: usize, b: usize) -> Mesh {
    let (a, b) = (a.max(1), b.max(1));
    let mut outer = Mesh::with_capacity("tube", (a + 1) * (b + 1), 2 * a * b);
    sweep(&mut outer, length, radius, bend, a, b, 0., false);
    let mut inner = Mesh::with_capacity("tube-inner", (a + 1) * (b + 1), 2 * a * b);
    sweep(&mut inner, length, INNER_SHELL * radius, bend, a, b, 0., true);
    let inner = ops::apply(&inner, &Matrix3::identity(), &Vector3::zeros(), true);
    let mut res = ops::fuse(&outer, &inner);
    res.name = "double-tube".to_owned();
    res.calculate_tangents();
    res
}

/// Four copies of a tube rotated in 90° steps about Z, each continuing the previous one's UVs.
fn quartered(name: &str, length: f32, radius: f32, bend: f32, a: usize, b: usize) -> Mesh {
    let (a, b) = (a.max(1), b.max(1));
    let mut res = Mesh::new(name);
    for k in 0..4 {
        let mut copy = Mesh::with_capacity(name, (a + 1) * (b + 1), 2 * a * b);
        sweep(&mut copy, length, radius, bend, a, b, k as f32 * length / radius, false);
        let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), k as f32 * FRAC_PI_2);
        res = ops::fuse(&res, &ops::apply(&copy, rot.matrix(), &Vector3::zeros(), false));
    }
    res.name = name.to_owned();
    res.calculate_tangents();
    res
}

/// A straight tube with a smoother profile, made of four overlapping half-pipes.
pub fn generate_tube3(length: f32, radius: f32, a: usize, b: usize) -> Mesh {
    quartered("tube3", length, radius, 0., a, b)
}

/// Four bent tubes sharing the same exit, branching out in four directions.
pub fn generate_tube4(length: f32, radius: f32, bend: f32, a: usize, b: usize) -> Mesh {
    quartered("tube4", length, radius, bend, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn straight_tube_counts() {
        let (a, b) = (7, 5);
        let m = generate_tube(4., 0.5, 0., a, b);
        assert_eq!(m.vertex_count(), (a + 1) * (b + 1));
        assert_eq!(m.triangle_count(), 2 * a * b);
        assert_eq!(m.validate(), Ok(()));
        assert_eq!(m.tangents.len(), m.vertex_count());
    }

    #[test]
    fn straight_tube_profile_has_radius() {
        let radius = 0.75;
        let m = generate_tube(3., radius, 0., 6, 9);
        for p in m.positions.iter() {
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert!((r - radius).abs() < EPS, "point {:?} off the profile", p);
            assert!(p.z >= -1.5 - EPS && p.z <= 1.5 + EPS);
        }
        for (p, n) in m.positions.iter().zip(m.normals.iter()) {
            let expected = Vector3::new(p.x, p.y, 0.) / radius;
            assert!((n - expected).norm() < EPS);
        }
    }

    #[test]
    fn straight_tube_uvs() {
        let m = generate_tube(2., 0.5, 0., 2, 2);
        // Last vertex: ti = 1, tj = 1.
        let last = m.uvs[m.vertex_count() - 1];
        assert!((last - Point2::new(1., 4.)).norm() < EPS);
    }

    #[test]
    fn bent_axis_is_continuous() {
        let axis = Axis { length: 4., radius: 0.3, bend: 1. };
        let steps = 400;
        let mut prev = axis.slice(0.).center;
        for s in 1..=steps {
            let c = axis.slice(s as f32 / steps as f32).center;
            // The arc runs a little faster than the straight parts, but never jumps.
            let d = (c - prev).norm();
            assert!(d > 0. && d < 2. * 4. / steps as f32, "jump of {} at step {}", d, s);
            prev = c;
        }
        let end = axis.slice(1.);
        assert!((end.center - Point3::new(0., 0., 2.)).norm() < EPS);
        assert_eq!(end.theta, 0.);
        assert!((axis.slice(0.).theta - FRAC_PI_4).abs() < EPS);
    }

    #[test]
    fn bent_lead_in_starts_at_k() {
        let length = 4.;
        let mut entries = vec![];
        for radius in [0.1, 0.4] {
            let axis = Axis { length, radius, bend: 1. };
            let k = (length - 2. * radius) / 2.;
            let entry = axis.slice(0.).center;
            assert!((entry.z + k).abs() < EPS, "entry {} for K {}", entry.z, k);
            // The lead-in climbs from -K towards the arc.
            let first_part = (1. - CURVED_PART) / 2.;
            let zs: Vec<f32> = (0..=10).map(|s| axis.slice(first_part * s as f32 / 10.).center.z).collect();
            assert!(zs.windows(2).all(|w| w[1] > w[0]));
            assert!(zs.iter().all(|z| *z >= -k - EPS));
            entries.push(entry.z);
        }
        assert!(((entries[0] - entries[1]).abs() - 0.3).abs() < EPS);
        // The swept mesh follows the same axis.
        let thin = generate_tube(length, 0.1, 1., 10, 4);
        let thick = generate_tube(length, 0.4, 1., 10, 4);
        assert!(thin.positions[0].z < thick.positions[0].z);
    }

    #[test]
    fn bent_tube_keeps_radius_about_its_axis() {
        let (a, b) = (20, 8);
        let radius = 0.3;
        let m = generate_tube(4., radius, 1., a, b);
        let axis = Axis { length: 4., radius, bend: 1. };
        for i in 0..=a {
            let center = axis.slice(i as f32 / a as f32).center;
            for j in 0..=b {
                let p = m.positions[i * (b + 1) + j];
                assert!(((p - center).norm() - radius).abs() < EPS);
            }
        }
    }

    #[test]
    fn negative_bend_mirrors() {
        let up = Axis { length: 4., radius: 0.3, bend: 1. };
        let down = Axis { length: 4., radius: 0.3, bend: -1. };
        for s in 0..=20 {
            let ti = s as f32 / 20.;
            let (p, n) = (up.slice(ti), down.slice(ti));
            assert!((p.center.x + n.center.x).abs() < EPS);
            assert!((p.center.z - n.center.z).abs() < EPS);
            assert!((p.theta + n.theta).abs() < EPS);
        }
        let pos = generate_tube(4., 0.3, 1., 10, 4);
        let neg = generate_tube(4., 0.3, -1., 10, 4);
        // Lead-in heads off to opposite sides.
        assert!(pos.positions[0].x < 0.);
        assert!(neg.positions[0].x > 0.);
    }

    #[test]
    fn double_tube_has_two_shells() {
        let (a, b) = (4, 6);
        let m = generate_double_tube(2., 1., 0., a, b);
        let shell = (a + 1) * (b + 1);
        assert_eq!(m.vertex_count(), 2 * shell);
        assert_eq!(m.triangle_count(), 4 * a * b);
        assert_eq!(m.validate(), Ok(()));
        for p in m.positions[shell..].iter() {
            assert!(((p.x * p.x + p.y * p.y).sqrt() - INNER_SHELL).abs() < EPS);
        }
        // Inner normals point at the bore.
        for (p, n) in m.positions[shell..].iter().zip(m.normals[shell..].iter()) {
            assert!(Vector3::new(p.x, p.y, 0.).dot(n) < 0.);
        }
    }

    #[test]
    fn quartered_tubes_have_four_copies() {
        let (a, b) = (3, 4);
        let m = generate_tube3(2., 0.5, a, b);
        assert_eq!(m.vertex_count(), 4 * (a + 1) * (b + 1));
        assert_eq!(m.triangle_count(), 4 * 2 * a * b);
        assert_eq!(m.validate(), Ok(()));

        let branching = generate_tube4(2., 0.5, 1., a, b);
        assert_eq!(branching.vertex_count(), m.vertex_count());
        // The first vertex of each copy is on a different branch.
        let shell = (a + 1) * (b + 1);
        let starts: Vec<_> = (0..4).map(|k| branching.positions[k * shell]).collect();
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert!((starts[i] - starts[j]).norm() > 0.1);
            }
        }
    }

    #[test]
    fn zero_steps_are_clamped() {
        let m = generate_tube(1., 1., 0., 0, 0);
        assert_eq!(m.vertex_count(), 4);
        assert_eq!(m.triangle_count(), 2);
    }
}
