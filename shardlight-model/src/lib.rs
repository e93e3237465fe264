pub mod camera;
pub mod curve;
pub mod geom;
pub mod procedural;

pub use curve::{ArcCurve, CompositeCurve, CubicCurve, Curve, CurveError};
pub use geom::{mesh::Mesh, MeshError};

use na::{Matrix4, UnitQuaternion, Vector3, Vector4};

/// Translation, orientation and per-axis scaling of an object placed in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineTransform {
    pub pos: Vector3<f32>,
    pub ori: UnitQuaternion<f32>,
    pub scaling: Vector4<f32>,
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            pos: Vector3::zeros(),
            ori: UnitQuaternion::identity(),
            scaling: Vector4::new(1., 1., 1., 1.),
        }
    }

    pub fn translation(pos: Vector3<f32>) -> Self {
        Self {
            pos,
            ..Self::identity()
        }
    }

    pub fn uniform(pos: Vector3<f32>, ori: UnitQuaternion<f32>, scale: f32) -> Self {
        Self {
            pos,
            ori,
            scaling: Vector4::new(scale, scale, scale, 1.),
        }
    }

    /// Rotation first, then scaling, then translation.
    pub fn mat(&self) -> Matrix4<f32> {
        let mut t_mat = Matrix4::from_diagonal(&self.scaling) * self.ori.to_homogeneous();
        t_mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.pos);
        t_mat
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}
