use std::sync::Arc;

use super::push_grid_triangles;
use crate::{
    curve::{Curve, CurveError},
    geom::mesh::Mesh,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Point2, Point3, Vector3};

/// Closed circle of the given radius in the XY plane, built from four quarter arcs.
fn circle(radius: f32) -> Result<Curve, CurveError> {
    let c = Point3::origin();
    let pts = [
        Point3::new(radius, 0., 0.),
        Point3::new(0., radius, 0.),
        Point3::new(-radius, 0., 0.),
        Point3::new(0., -radius, 0.),
    ];
    let parts = (0..4)
        .map(|k| Curve::arc(pts[k], pts[(k + 1) % 4], c).map(Arc::new))
        .collect::<Result<Vec<_>, _>>()?;
    Curve::composite(parts)
}

/// Hemispherical end cap of the given radius, bulging towards +Z from the origin.
///
/// The circular profile is swept along a linear axis of length `radius`, shrinking by
/// `cos(asin(t))` so every vertex lands on the sphere. Resolution of both the profile and the
/// axis follows `quality` in `[0, 1]`.
pub fn generate_cap(radius: f32, quality: f32) -> Result<Mesh, CurveError> {
    let profile = circle(radius)?;
    let axis = Curve::linear(Point3::origin(), Point3::new(0., 0., radius));
    let rows = axis.get_k(quality);
    let cols = profile.get_k(quality);

    let mut res = Mesh::with_capacity("cap", rows * cols, 2 * (rows - 1) * (cols - 1));
    for i in 0..rows {
        let ta = i as f32 / (rows - 1) as f32;
        let lift = axis.eval(i, quality).coords;
        let shrink = ta.asin().cos();
        for j in 0..cols {
            let p = profile.eval(j, quality);
            let point = Point3::from(p.coords * shrink + lift);
            let norm = point.coords.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);
            res.push_vertex(point, norm, Point2::new(ta, j as f32 / (cols - 1) as f32));
        }
    }
    push_grid_triangles(&mut res, 0, rows, cols);
    res.calculate_tangents();
    trace!("Generated cap with {} x {} vertices.", rows, cols);
    Ok(res)
}
