use na::{Matrix4, Point2, Vector3};

/// Orthographic camera looking down -Z at the unit pane `[0, 1]²`.
///
/// The pane is centred on the origin by the view matrix, the projection then squeezes it into
/// one cell of an `n x n` atlas. Depth is `-2z`, so geometry raised towards the viewer wins a
/// `LessEqual` depth test.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OrthoCamera {
    position: Vector3<f32>,
    /// Cell centre in NDC.
    offset: Vector3<f32>,
    /// Half extent of the pane in NDC.
    extent: f32,
    _p_cache: Matrix4<f32>,
    _v_cache: Matrix4<f32>,
}

impl OrthoCamera {
    /// Camera drawing the pane into cell `index` of an `n x n` atlas, row-major with row 0 at the
    /// top, shrunk by `fill` about the cell centre.
    pub fn atlas_cell(n: usize, index: usize, fill: f32) -> Self {
        let n = n.max(1);
        let (col, row) = ((index % n) as f32, (index / n) as f32);
        let cell = 2. / n as f32;
        let mut cam = OrthoCamera {
            position: Vector3::new(0.5, 0.5, 0.),
            offset: Vector3::new(-1. + (col + 0.5) * cell, 1. - (row + 0.5) * cell, 0.),
            extent: cell * fill.clamp(0., 1.),
            _p_cache: Matrix4::zeros(),
            _v_cache: Matrix4::zeros(),
        };
        cam.calc_p_mat();
        cam.calc_v_mat();
        cam
    }

    pub fn v_mat(&self) -> Matrix4<f32> {
        self._v_cache
    }
    pub fn p_mat(&self) -> Matrix4<f32> {
        self._p_cache
    }
    pub fn vp_mat(&self) -> Matrix4<f32> {
        self.p_mat() * self.v_mat()
    }
    fn calc_p_mat(&mut self) {
        self._p_cache.fill_with_identity();
        self._p_cache[(0, 0)] = self.extent;
        self._p_cache[(1, 1)] = self.extent;
        self._p_cache[(2, 2)] = -2.;
        self._p_cache
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&self.offset);
    }
    fn calc_v_mat(&mut self) {
        self._v_cache.fill_with_identity();
        self._v_cache
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&(self.position * -1.0));
    }
    pub fn pos(&self) -> Vector3<f32> {
        self.position
    }
}

impl Default for OrthoCamera {
    /// The whole pane filling the whole target.
    fn default() -> OrthoCamera {
        OrthoCamera::atlas_cell(1, 0, 1.)
    }
}

/// Texture coordinates covered by cell `index` of an `n x n` atlas, as `(min, max)`.
///
/// V grows upwards, so row 0 (the top row) owns the highest V range.
pub fn atlas_cell_uv(n: usize, index: usize) -> (Point2<f32>, Point2<f32>) {
    let n = n.max(1);
    let step = 1. / n as f32;
    let (col, row) = ((index % n) as f32, (index / n) as f32);
    (
        Point2::new(col * step, 1. - (row + 1.) * step),
        Point2::new((col + 1.) * step, 1. - row * step),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::Point3;

    fn project(cam: &OrthoCamera, p: Point3<f32>) -> Point3<f32> {
        cam.vp_mat().transform_point(&p)
    }

    #[test]
    fn default_fills_the_target() {
        let cam = OrthoCamera::default();
        assert!((project(&cam, Point3::new(0., 0., 0.)) - Point3::new(-1., -1., 0.)).norm() < 1e-6);
        assert!((project(&cam, Point3::new(1., 1., 0.)) - Point3::new(1., 1., 0.)).norm() < 1e-6);
    }

    #[test]
    fn cells_are_row_major_from_the_top() {
        // Cell 1 of a 2x2 atlas is the top right quadrant.
        let cam = OrthoCamera::atlas_cell(2, 1, 1.);
        let lo = project(&cam, Point3::new(0., 0., 0.));
        let hi = project(&cam, Point3::new(1., 1., 0.));
        assert!((lo - Point3::new(0., 0., 0.)).norm() < 1e-6);
        assert!((hi - Point3::new(1., 1., 0.)).norm() < 1e-6);

        let (uv_lo, uv_hi) = atlas_cell_uv(2, 1);
        assert_eq!(uv_lo, Point2::new(0.5, 0.5));
        assert_eq!(uv_hi, Point2::new(1., 1.));
    }

    #[test]
    fn fill_shrinks_about_the_centre() {
        let cam = OrthoCamera::atlas_cell(4, 5, 0.5);
        let centre = project(&cam, Point3::new(0.5, 0.5, 0.));
        let corner = project(&cam, Point3::new(1., 1., 0.));
        // Column 1, row 1 of a 4x4 atlas.
        assert!((centre - Point3::new(-0.25, 0.25, 0.)).norm() < 1e-6);
        assert!((corner.x - centre.x - 0.125).abs() < 1e-6);
    }

    #[test]
    fn raised_geometry_is_nearer() {
        let cam = OrthoCamera::default();
        let near = project(&cam, Point3::new(0.5, 0.5, 0.1));
        let far = project(&cam, Point3::new(0.5, 0.5, -0.1));
        assert!(near.z < far.z);
    }
}
