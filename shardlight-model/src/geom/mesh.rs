use super::{Face, MeshError, Vertex};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Point2, Point3, Vector2, Vector3};

/// UV determinants below this are treated as degenerate when computing tangents.
const DEGENERATE_UV_EPS: f32 = 1e-12;

/// An indexed triangle mesh stored as parallel per-vertex arrays.
///
/// `positions`, `normals` and `uvs` always have the same length. `tangents` is either empty
/// (absent) or the same length as well, and is recomputed with [`Mesh::calculate_tangents`]
/// whenever positions or UVs change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub tangents: Vec<Vector3<f32>>,
    pub uvs: Vec<Point2<f32>>,
    pub indices: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_capacity(name: impl Into<String>, vertices: usize, triangles: usize) -> Self {
        Self {
            name: name.into(),
            positions: Vec::with_capacity(vertices),
            normals: Vec::with_capacity(vertices),
            tangents: Vec::new(),
            uvs: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(triangles),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn has_tangents(&self) -> bool {
        !self.tangents.is_empty()
    }

    /// Appends a vertex and returns its index. Tangents are left for `calculate_tangents`.
    pub fn push_vertex(&mut self, pos: Point3<f32>, norm: Vector3<f32>, uv: Point2<f32>) -> u32 {
        let idx = self.positions.len() as u32;
        self.positions.push(pos);
        self.normals.push(norm);
        self.uvs.push(uv);
        idx
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.push([a, b, c]);
    }

    /// Checks the parallel-array and index invariants.
    pub fn validate(&self) -> Result<(), MeshError> {
        let expected = self.positions.len();
        let lens = [
            ("normals", self.normals.len()),
            ("uvs", self.uvs.len()),
        ];
        for (attribute, len) in lens {
            if len != expected {
                return Err(MeshError::AttributeLength { attribute, len, expected });
            }
        }
        if !self.tangents.is_empty() && self.tangents.len() != expected {
            return Err(MeshError::AttributeLength {
                attribute: "tangents",
                len: self.tangents.len(),
                expected,
            });
        }
        for (triangle, tri) in self.indices.iter().enumerate() {
            if let Some(&index) = tri.iter().find(|&&i| i as usize >= expected) {
                return Err(MeshError::IndexOutOfRange { triangle, index, len: expected });
            }
        }
        Ok(())
    }

    /// Recomputes per-vertex tangents from positions and UVs.
    ///
    /// Every triangle writes the tangent of each of its three corners, so the last triangle
    /// touching a vertex wins; nothing is averaged. Triangles whose UVs are degenerate write
    /// nothing.
    pub fn calculate_tangents(&mut self) {
        let mut tangents = vec![Vector3::zeros(); self.positions.len()];
        let mut degenerate = 0usize;
        for tri in self.indices.iter() {
            let [a, b, c] = tri.map(|i| i as usize);
            let corners = [(a, b, c), (b, c, a), (c, a, b)];
            for (i0, i1, i2) in corners {
                match corner_tangent(
                    [self.positions[i0], self.positions[i1], self.positions[i2]],
                    [self.uvs[i0], self.uvs[i1], self.uvs[i2]],
                ) {
                    Some(t) => tangents[i0] = t,
                    None => degenerate += 1,
                }
            }
        }
        if degenerate > 0 {
            warn!(
                "Mesh {:?} has {} triangle corners with degenerate UVs, left their tangents untouched.",
                self.name, degenerate
            );
        }
        self.tangents = tangents;
    }

    pub fn to_vertices(&self) -> Vec<Vertex> {
        (0..self.positions.len())
            .map(|i| Vertex {
                pos: self.positions[i].coords.into(),
                norm: self.normals[i].into(),
                tangent: self.tangents.get(i).copied().unwrap_or_else(Vector3::zeros).into(),
                uv: self.uvs[i].coords.into(),
            })
            .collect()
    }

    pub fn to_faces(&self) -> Vec<Face> {
        self.indices.iter().map(|&indices| Face { indices }).collect()
    }

    /// Per-triangle unit normal from the winding, zero for degenerate triangles.
    pub fn face_normal(&self, tri: usize) -> Vector3<f32> {
        let [a, b, c] = self.indices[tri].map(|i| self.positions[i as usize]);
        (b - a).cross(&(c - a)).try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros)
    }
}

fn corner_tangent(p: [Point3<f32>; 3], uv: [Point2<f32>; 3]) -> Option<Vector3<f32>> {
    let delta_pos1 = p[1] - p[0];
    let delta_pos2 = p[2] - p[0];
    let delta_uv1: Vector2<f32> = uv[1] - uv[0];
    let delta_uv2: Vector2<f32> = uv[2] - uv[0];

    let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
    if det.abs() < DEGENERATE_UV_EPS {
        return None;
    }
    let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) / det;
    tangent.try_normalize(f32::EPSILON)
}
