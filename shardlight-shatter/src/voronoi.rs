//! Planar Voronoi diagram restricted to the unit pane.
//!
//! Every cell starts as the pane itself and is clipped by the perpendicular bisector of its site
//! and every other site. Cells of a convex domain are convex, so a single-plane polygon clip per
//! neighbour is enough. All of it runs in `f64`.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Point2, Vector2};

/// Vertices closer than this are merged after a clip.
const MERGE_EPS: f64 = 1e-12;

/// A Voronoi cell: the site and its counter-clockwise outline.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub site: Point2<f64>,
    pub polygon: Vec<Point2<f64>>,
}

/// Half plane `{ x : (x - point) . normal <= 0 }`.
#[derive(Debug, Copy, Clone)]
struct HalfPlane {
    point: Point2<f64>,
    normal: Vector2<f64>,
}

impl HalfPlane {
    /// Points at least as close to `site` as to `other`.
    fn bisector(site: Point2<f64>, other: Point2<f64>) -> Self {
        Self {
            point: na::center(&site, &other),
            normal: other - site,
        }
    }

    fn signed_distance(&self, p: &Point2<f64>) -> f64 {
        (p - self.point).dot(&self.normal)
    }
}

fn unit_square() -> Vec<Point2<f64>> {
    vec![
        Point2::new(0., 0.),
        Point2::new(1., 0.),
        Point2::new(1., 1.),
        Point2::new(0., 1.),
    ]
}

/// Sutherland-Hodgman against one half plane. Keeps the winding of `poly`.
fn clip_with_plane(poly: &[Point2<f64>], plane: &HalfPlane) -> Vec<Point2<f64>> {
    let n = poly.len();
    let mut out = Vec::with_capacity(n + 1);
    for i in 0..n {
        let (cur, next) = (poly[i], poly[(i + 1) % n]);
        let (d_cur, d_next) = (plane.signed_distance(&cur), plane.signed_distance(&next));
        if d_cur <= 0. {
            out.push(cur);
        }
        if (d_cur <= 0.) != (d_next <= 0.) {
            let t = d_cur / (d_cur - d_next);
            out.push(cur + (next - cur) * t);
        }
    }
    out.dedup_by(|a, b| (*a - *b).norm() < MERGE_EPS);
    if out.len() > 1 && (out[0] - out[out.len() - 1]).norm() < MERGE_EPS {
        out.pop();
    }
    out
}

/// The cell of `sites[idx]`, or `None` if it clipped away to nothing.
pub fn cell(sites: &[Point2<f64>], idx: usize) -> Option<Cell> {
    let site = sites[idx];
    let mut polygon = unit_square();
    for (j, other) in sites.iter().enumerate() {
        if j == idx || *other == site {
            continue;
        }
        polygon = clip_with_plane(&polygon, &HalfPlane::bisector(site, *other));
        if polygon.len() < 3 {
            trace!("Cell of site {:?} clipped away.", site);
            return None;
        }
    }
    Some(Cell { site, polygon })
}

/// Voronoi cells of all sites, in site order. Sites with an empty cell are left out.
pub fn diagram(sites: &[Point2<f64>]) -> Vec<Cell> {
    (0..sites.len()).filter_map(|i| cell(sites, i)).collect()
}

/// Shoelace area, positive for counter-clockwise outlines.
pub fn signed_area(poly: &[Point2<f64>]) -> f64 {
    let n = poly.len();
    (0..n)
        .map(|i| {
            let (a, b) = (poly[i], poly[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.
}

/// Area centroid. Falls back to the vertex average for zero-area outlines.
pub fn centroid(poly: &[Point2<f64>]) -> Point2<f64> {
    let area = signed_area(poly);
    let n = poly.len();
    if area.abs() < MERGE_EPS {
        let sum = poly.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords);
        return Point2::from(sum / n.max(1) as f64);
    }
    let mut c = Vector2::zeros();
    for i in 0..n {
        let (a, b) = (poly[i], poly[(i + 1) % n]);
        let cross = a.x * b.y - b.x * a.y;
        c += (a.coords + b.coords) * cross;
    }
    Point2::from(c / (6. * area))
}
