use crate::{
    sites::scatter_sites,
    voronoi::{self, Cell},
    FractureParams, Shard, ShatterError,
};
use model::Mesh;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Point2, Point3, Unit, Vector3};
use rand::Rng;

/// How far the back rim of a side wall samples in from the outline, towards the centroid.
const WALL_UV_INSET: f32 = 0.05;

/// Distance from `p` to the nearest edge of the unit pane.
pub fn pane_distance(p: &Point2<f32>) -> f32 {
    p.x.min(1. - p.x).min(p.y).min(1. - p.y)
}

fn random_axis<R: Rng + ?Sized>(rng: &mut R) -> Unit<Vector3<f32>> {
    loop {
        let v = Vector3::new(
            rng.random_range(-1f32..1.),
            rng.random_range(-1f32..1.),
            rng.random_range(-1f32..1.),
        );
        if let Some(axis) = Unit::try_new(v, 1e-3) {
            return axis;
        }
    }
}

/// Appends one flat shaded triangle, falling back to `fallback` for the normal of a sliver.
fn push_face(mesh: &mut Mesh, corners: [(Point3<f32>, Point2<f32>); 3], fallback: Vector3<f32>) {
    let [(a, _), (b, _), (c, _)] = corners;
    let norm = (b - a)
        .cross(&(c - a))
        .try_normalize(f32::EPSILON)
        .unwrap_or(fallback);
    let [i0, i1, i2] = corners.map(|(p, uv)| mesh.push_vertex(p, norm, uv));
    mesh.push_triangle(i0, i1, i2);
}

/// Extrudes a counter-clockwise cell outline into a two-sided prism.
///
/// Every point of the front face sits `depth_factor * pane_distance` above the pane and every
/// point of the back face as far below it, so the prism thins out towards the pane edge. Returns
/// `None` for cells within `sliver_threshold` of the edge.
///
/// Every texture coordinate stays inside the cell, walls included: the front rim of a wall maps
/// to the outline and the back rim to the outline pulled slightly towards the centroid.
pub fn extrude_cell(cell: &Cell, params: &FractureParams, axis: Unit<Vector3<f32>>) -> Option<Shard> {
    let outline: Vec<Point2<f32>> = cell.polygon.iter().map(|p| p.cast::<f32>()).collect();
    let clearance = outline.iter().map(pane_distance).fold(f32::INFINITY, f32::min);
    if outline.len() < 3 || clearance < params.sliver_threshold {
        trace!("Skipping cell of {:?} with clearance {}.", cell.site, clearance);
        return None;
    }
    let centroid = voronoi::centroid(&cell.polygon).cast::<f32>();

    let depth = |p: &Point2<f32>| params.depth_factor * pane_distance(p);
    let front = |p: &Point2<f32>| Point3::new(p.x, p.y, depth(p));
    let back = |p: &Point2<f32>| Point3::new(p.x, p.y, -depth(p));

    let n = outline.len();
    let mut mesh = Mesh::with_capacity("shard", 10 * n, 4 * n);
    let inset = |p: &Point2<f32>| p + (centroid - p) * WALL_UV_INSET;
    for i in 0..n {
        let (v0, v1) = (outline[i], outline[(i + 1) % n]);
        push_face(
            &mut mesh,
            [(front(&centroid), centroid), (front(&v0), v0), (front(&v1), v1)],
            Vector3::z(),
        );
        push_face(
            &mut mesh,
            [(back(&centroid), centroid), (back(&v1), v1), (back(&v0), v0)],
            -Vector3::z(),
        );

        let edge = v1 - v0;
        let outward = Vector3::new(edge.y, -edge.x, 0.)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::x);
        let quad = [
            mesh.push_vertex(back(&v0), outward, inset(&v0)),
            mesh.push_vertex(back(&v1), outward, inset(&v1)),
            mesh.push_vertex(front(&v1), outward, v1),
            mesh.push_vertex(front(&v0), outward, v0),
        ];
        mesh.push_triangle(quad[0], quad[1], quad[2]);
        mesh.push_triangle(quad[0], quad[2], quad[3]);
    }
    mesh.calculate_tangents();

    Some(Shard {
        mesh,
        clearance,
        axis,
        centroid,
    })
}

/// One independent fracture pattern of the unit pane.
pub fn generate_broken_glass<R: Rng + ?Sized>(
    rng: &mut R,
    params: &FractureParams,
) -> Result<Vec<Shard>, ShatterError> {
    params.validate()?;
    let sites = scatter_sites(rng, params);
    let cells = voronoi::diagram(&sites);
    let mut shards = Vec::with_capacity(cells.len());
    for cell in cells.iter() {
        let axis = random_axis(rng);
        if let Some(shard) = extrude_cell(cell, params, axis) {
            shard.mesh.validate()?;
            shards.push(shard);
        }
    }
    debug!(
        "Fractured pane into {} shards ({} cells, {} slivers skipped).",
        shards.len(),
        cells.len(),
        cells.len() - shards.len()
    );
    Ok(shards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn square(lo: f64, hi: f64) -> Cell {
        Cell {
            site: Point2::new((lo + hi) / 2., (lo + hi) / 2.),
            polygon: vec![
                Point2::new(lo, lo),
                Point2::new(hi, lo),
                Point2::new(hi, hi),
                Point2::new(lo, hi),
            ],
        }
    }

    #[test]
    fn prism_layout() {
        let shard = extrude_cell(&square(0.25, 0.75), &FractureParams::default(), Vector3::z_axis()).unwrap();
        let m = &shard.mesh;
        assert_eq!(m.vertex_count(), 40);
        assert_eq!(m.triangle_count(), 16);
        assert_eq!(m.validate(), Ok(()));
        assert!((shard.clearance - 0.25).abs() < 1e-6);
        assert!((shard.centroid - Point2::new(0.5, 0.5)).norm() < 1e-6);

        // Front face of the first edge: centroid raised by 0.3 * 0.5.
        assert!((m.positions[0] - Point3::new(0.5, 0.5, 0.15)).norm() < 1e-6);
        assert!(m.normals[0].z > 0.);
        // Back face mirrors it.
        assert!((m.positions[3] - Point3::new(0.5, 0.5, -0.15)).norm() < 1e-6);
        assert!(m.normals[3].z < 0.);
    }

    #[test]
    fn faces_point_outward() {
        let shard = extrude_cell(&square(0.2, 0.6), &FractureParams::default(), Vector3::z_axis()).unwrap();
        let m = &shard.mesh;
        let centre = Vector3::new(0.4, 0.4, 0.);
        for t in 0..m.triangle_count() {
            let [a, b, c] = m.indices[t].map(|i| m.positions[i as usize].coords);
            let n = m.face_normal(t);
            assert!(n.dot(&((a + b + c) / 3. - centre)) > 0., "triangle {} faces inward", t);
        }
    }

    #[test]
    fn uvs_stay_inside_the_cell() {
        let cell = Cell {
            site: Point2::new(0.45, 0.4),
            polygon: vec![
                Point2::new(0.3, 0.2),
                Point2::new(0.6, 0.25),
                Point2::new(0.7, 0.5),
                Point2::new(0.45, 0.7),
                Point2::new(0.25, 0.45),
            ],
        };
        let shard = extrude_cell(&cell, &FractureParams::default(), Vector3::z_axis()).unwrap();
        let outline: Vec<Point2<f32>> = cell.polygon.iter().map(|p| p.cast::<f32>()).collect();
        for uv in shard.mesh.uvs.iter() {
            for i in 0..outline.len() {
                let (a, b) = (outline[i], outline[(i + 1) % outline.len()]);
                let (e, d) = (b - a, uv - a);
                assert!(e.x * d.y - e.y * d.x >= -1e-6, "uv {:?} leaves the cell", uv);
            }
        }
        // Walls keep usable tangents.
        assert!(shard.mesh.tangents.iter().all(|t| t.norm() > 0.5));
    }

    #[test]
    fn slivers_are_skipped() {
        let params = FractureParams::default();
        assert!(extrude_cell(&square(0., 0.5), &params, Vector3::z_axis()).is_none());
        assert!(extrude_cell(&square(0.0005, 0.5), &params, Vector3::z_axis()).is_none());
        assert!(extrude_cell(&square(0.002, 0.5), &params, Vector3::z_axis()).is_some());
    }

    #[test]
    fn broken_glass_is_tagged() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let shards = generate_broken_glass(&mut rng, &FractureParams::default()).unwrap();
        assert!(!shards.is_empty());
        for s in shards.iter() {
            assert!(s.clearance >= 0.001);
            assert!((s.axis.norm() - 1.).abs() < 1e-5);
            assert!(pane_distance(&s.centroid) >= s.clearance - 1e-6);
            assert_eq!(s.mesh.tangents.len(), s.mesh.vertex_count());
            for p in s.mesh.positions.iter() {
                assert!(p.z.abs() <= 0.3 * 0.5 + 1e-6);
            }
        }
    }

    #[test]
    fn fracture_is_reproducible() {
        let params = FractureParams::default();
        let a = generate_broken_glass(&mut ChaCha8Rng::seed_from_u64(9), &params).unwrap();
        let b = generate_broken_glass(&mut ChaCha8Rng::seed_from_u64(9), &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let params = FractureParams {
            cluster_sigma: 0.,
            ..FractureParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            generate_broken_glass(&mut rng, &params),
            Err(ShatterError::InvalidParams { name: "cluster_sigma", .. })
        ));
    }
}
