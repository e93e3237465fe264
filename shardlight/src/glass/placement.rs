//! Hit points on host surfaces and the scatter animation of a placed variant.

use crate::{GlassError, GlassPreferences};
use model::Mesh;
use shatter::Shard;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Matrix3, Matrix4, Point2, Point3, Quaternion, Translation3, UnitQuaternion, Vector3, Vector4};
use rand::Rng;

/// A decal anchor: tangent, bitangent, normal and position columns, plus the host UV there.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TangentFrame {
    pub matrix: Matrix4<f32>,
    pub uv_anchor: Point2<f32>,
}

impl TangentFrame {
    /// Frame at vertex `index` of `host` once `transform` places it in the world.
    pub fn at_vertex(host: &Mesh, transform: &Matrix4<f32>, index: usize) -> Result<Self, GlassError> {
        if index >= host.vertex_count() {
            return Err(GlassError::InvalidState("hit point vertex is outside the host mesh"));
        }
        let linear: Matrix3<f32> = transform.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_mat = linear.try_inverse().map(|m| m.transpose()).unwrap_or(linear);

        let pos = transform.transform_point(&host.positions[index]);
        let normal = (normal_mat * host.normals[index])
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::z);
        let tangent = host
            .tangents
            .get(index)
            .map(|t| linear * t)
            .and_then(|t| (t - normal * normal.dot(&t)).try_normalize(f32::EPSILON))
            .unwrap_or_else(|| perpendicular(&normal));
        let bitangent = normal.cross(&tangent);

        Ok(Self {
            matrix: Matrix4::from_columns(&[
                tangent.push(0.),
                bitangent.push(0.),
                normal.push(0.),
                pos.to_homogeneous(),
            ]),
            uv_anchor: host.uvs[index],
        })
    }

    pub fn position(&self) -> Point3<f32> {
        Point3::from(self.matrix.fixed_view::<3, 1>(0, 3).into_owned())
    }

    pub fn normal(&self) -> Vector3<f32> {
        self.matrix.fixed_view::<3, 1>(0, 2).into_owned()
    }
}

/// Some unit vector perpendicular to `n`.
fn perpendicular(n: &Vector3<f32>) -> Vector3<f32> {
    let helper = if n.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    (helper - n * n.dot(&helper)).normalize()
}

/// Vertex index in the middle 60% of a vertex list of length `n`.
pub fn pick_vertex<R: Rng + ?Sized>(rng: &mut R, n: usize) -> usize {
    let lo = n / 5;
    let span = n * 3 / 5;
    let offset = if span > 0 { rng.random_range(0..span) } else { 0 };
    (lo + offset).min(n.saturating_sub(1))
}

/// Where a variant sits and which host vertex anchors it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Placement {
    pub variant: usize,
    pub vertex: usize,
    pub frame: TangentFrame,
}

/// One shard's transform and material at some point of the animation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShardPose {
    pub model: Matrix4<f32>,
    pub local_time: f32,
    pub ambient: f32,
    pub shine: f32,
    pub reflectivity: f32,
}

/// Maps the unit pane into a frame: centred on its origin, `scale` across.
pub fn pane_to_frame(scale: f32) -> Matrix4<f32> {
    Matrix4::new_scaling(scale) * Matrix4::new_translation(&Vector3::new(-0.5, -0.5, 0.))
}

impl ShardPose {
    /// Pose of `shard` at time `t` (seconds) when anchored at `frame`.
    ///
    /// The animation repeats every `period / time_scale` seconds. Within a cycle, a shard waits
    /// `clearance * scatter_delay` before moving, then flies away from the pane centre while
    /// spinning about its own axis and brightening.
    pub fn at(shard: &Shard, frame: &TangentFrame, prefs: &GlassPreferences, t: f32) -> Self {
        let t0 = (t * prefs.time_scale).rem_euclid(prefs.period);
        let local_time = (t0 - shard.clearance * prefs.scatter_delay).max(0.) * (1. + shard.clearance);

        let from_centre = shard.centroid - Point2::new(0.5, 0.5);
        let outward = Vector3::new(from_centre.x, from_centre.y, from_centre.norm())
            * local_time
            * prefs.outward_speed;

        let (s, c) = (prefs.spin_rate * local_time).sin_cos();
        let axis = shard.axis.into_inner() * s;
        let spin = UnitQuaternion::new_normalize(Quaternion::new(c, axis.x, axis.y, axis.z));
        let pivot = Translation3::new(shard.centroid.x, shard.centroid.y, 0.);
        let spin = pivot.to_homogeneous() * spin.to_homogeneous() * pivot.inverse().to_homogeneous();

        let model = frame.matrix * pane_to_frame(prefs.decal_scale) * Matrix4::new_translation(&outward) * spin;
        let flash = (1. + local_time * prefs.flash_rate).min(prefs.flash_cap);
        Self {
            model,
            local_time,
            ambient: prefs.ambient * flash,
            shine: prefs.shine * flash,
            reflectivity: prefs.reflectivity * flash,
        }
    }

    /// Where the shard's centroid ends up.
    pub fn centroid(&self, shard: &Shard) -> Point3<f32> {
        let c = self.model * Vector4::new(shard.centroid.x, shard.centroid.y, 0., 1.);
        Point3::new(c.x, c.y, c.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::procedural::make_grid;
    use na::Unit;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).norm() < 1e-4
    }

    fn shard(centroid: Point2<f32>, clearance: f32) -> Shard {
        Shard {
            mesh: Mesh::new("shard"),
            clearance,
            axis: Unit::new_normalize(Vector3::new(0., 1., 1.)),
            centroid,
        }
    }

    #[test]
    fn frame_is_orthonormal_and_follows_the_transform() {
        let host = make_grid(2, 2, 2., 2.);
        let transform = Matrix4::new_translation(&Vector3::new(1., 2., 3.)) * Matrix4::from_euler_angles(0.3, 0., 0.);
        let frame = TangentFrame::at_vertex(&host, &transform, 4).unwrap();
        let m = frame.matrix.fixed_view::<3, 3>(0, 0).into_owned();
        assert!((m.transpose() * m - Matrix3::identity()).norm() < 1e-4);
        assert!((m.determinant() - 1.).abs() < 1e-4);
        assert!(close(frame.position().coords, transform.transform_point(&host.positions[4]).coords));
        assert!(close(frame.normal(), transform.transform_vector(&Vector3::z())));
        assert_eq!(frame.uv_anchor, host.uvs[4]);
    }

    #[test]
    fn missing_tangents_get_a_perpendicular() {
        let mut host = make_grid(1, 1, 1., 1.);
        host.tangents.clear();
        let frame = TangentFrame::at_vertex(&host, &Matrix4::identity(), 0).unwrap();
        let t = frame.matrix.fixed_view::<3, 1>(0, 0).into_owned();
        assert!(t.dot(&frame.normal()).abs() < 1e-6);
        assert!((t.norm() - 1.).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_vertex_is_refused() {
        let host = make_grid(1, 1, 1., 1.);
        assert!(matches!(
            TangentFrame::at_vertex(&host, &Matrix4::identity(), 4),
            Err(GlassError::InvalidState(_))
        ));
    }

    #[test]
    fn picks_stay_in_the_middle() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            let i = pick_vertex(&mut rng, 100);
            assert!((20..80).contains(&i));
        }
        assert_eq!(pick_vertex(&mut rng, 1), 0);
        assert_eq!(pick_vertex(&mut rng, 2), 0);
    }

    #[test]
    fn nothing_moves_at_time_zero() {
        let prefs = GlassPreferences::default();
        let frame = TangentFrame {
            matrix: Matrix4::new_translation(&Vector3::new(0., 0., 1.)),
            uv_anchor: Point2::origin(),
        };
        let s = shard(Point2::new(0.8, 0.3), 0.2);
        let pose = ShardPose::at(&s, &frame, &prefs, 0.);
        assert_eq!(pose.local_time, 0.);
        assert_eq!(pose.ambient, prefs.ambient);
        let expected = frame.matrix * pane_to_frame(prefs.decal_scale);
        assert!((pose.model - expected).norm() < 1e-6);
        assert!(close(pose.centroid(&s).coords, Vector3::new(0.3, -0.2, 1.)));
    }

    #[test]
    fn shards_fly_outwards_and_flash() {
        let prefs = GlassPreferences::default();
        let frame = TangentFrame {
            matrix: Matrix4::identity(),
            uv_anchor: Point2::origin(),
        };
        let s = shard(Point2::new(0.9, 0.5), 0.05);
        let rest = ShardPose::at(&s, &frame, &prefs, 0.).centroid(&s);
        let pose = ShardPose::at(&s, &frame, &prefs, 0.2);
        assert!(pose.local_time > 0.);
        let moved = pose.centroid(&s) - rest;
        assert!(moved.x > 0. && moved.z > 0.);
        assert!(moved.y.abs() < 1e-5);
        assert!(pose.ambient > prefs.ambient);
        assert!(pose.ambient <= prefs.ambient * prefs.flash_cap);
    }

    #[test]
    fn animation_repeats() {
        let prefs = GlassPreferences::default();
        let frame = TangentFrame {
            matrix: Matrix4::identity(),
            uv_anchor: Point2::origin(),
        };
        let s = shard(Point2::new(0.2, 0.7), 0.1);
        let cycle = prefs.period / prefs.time_scale;
        let a = ShardPose::at(&s, &frame, &prefs, 0.1);
        let b = ShardPose::at(&s, &frame, &prefs, 0.1 + cycle);
        assert!((a.local_time - b.local_time).abs() < 1e-3);
    }

    #[test]
    fn later_for_larger_clearance() {
        let prefs = GlassPreferences::default();
        let frame = TangentFrame {
            matrix: Matrix4::identity(),
            uv_anchor: Point2::origin(),
        };
        let t = 0.05;
        let near_edge = ShardPose::at(&shard(Point2::new(0.5, 0.9), 0.01), &frame, &prefs, t);
        let central = ShardPose::at(&shard(Point2::new(0.5, 0.6), 0.4), &frame, &prefs, t);
        assert!(near_edge.local_time > 0.);
        assert_eq!(central.local_time, 0.);
    }
}
