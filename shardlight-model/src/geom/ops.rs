//! Mesh algebra. Every function here is pure: inputs are borrowed, a new mesh is returned.

use super::mesh::Mesh;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Matrix3, Point3, Vector3};

/// Applies `rotation` then `translation` to positions, and `rotation` to normals and tangents.
///
/// `flip_normals` reverses the winding of every triangle (swapping the second and third index)
/// instead of negating the normals, which keeps lighting and culling consistent for mirrored or
/// inward-facing copies.
pub fn apply(input: &Mesh, rotation: &Matrix3<f32>, translation: &Vector3<f32>, flip_normals: bool) -> Mesh {
    let rotate_dir = |v: &Vector3<f32>| {
        let r = rotation * v;
        r.try_normalize(f32::EPSILON).unwrap_or(r)
    };
    Mesh {
        name: input.name.clone(),
        positions: input
            .positions
            .iter()
            .map(|p| Point3::from(rotation * p.coords + translation))
            .collect(),
        normals: input.normals.iter().map(rotate_dir).collect(),
        tangents: input.tangents.iter().map(rotate_dir).collect(),
        uvs: input.uvs.clone(),
        indices: if flip_normals {
            input.indices.iter().map(|&[a, b, c]| [a, c, b]).collect()
        } else {
            input.indices.clone()
        },
    }
}

/// Concatenates `b` after `a`, shifting `b`'s indices by the number of vertices in `a`.
pub fn fuse(a: &Mesh, b: &Mesh) -> Mesh {
    let shift = a.positions.len() as u32;
    let mut res = a.clone();
    res.positions.extend_from_slice(&b.positions);
    res.normals.extend_from_slice(&b.normals);
    res.uvs.extend_from_slice(&b.uvs);
    // A tangent array is only kept if both sides have one.
    if a.has_tangents() && b.has_tangents() {
        res.tangents.extend_from_slice(&b.tangents);
    } else {
        res.tangents.clear();
    }
    res.indices
        .extend(b.indices.iter().map(|tri| tri.map(|i| i + shift)));
    res
}

/// Keeps the vertices whose position satisfies `pred`.
///
/// A triangle survives only if all three of its vertices survive. Every surviving vertex of a
/// dropped triangle is reported once, in first-discovery order and in the output's index space,
/// so the cut can be stitched later.
pub fn filter<F>(input: &Mesh, pred: F) -> (Mesh, Vec<u32>)
where
    F: Fn(&Point3<f32>) -> bool,
{
    let mut remap: Vec<Option<u32>> = Vec::with_capacity(input.positions.len());
    let mut res = Mesh::with_capacity(input.name.clone(), input.positions.len(), input.indices.len());
    let keep_tangents = input.has_tangents();
    for (i, p) in input.positions.iter().enumerate() {
        if pred(p) {
            remap.push(Some(res.push_vertex(*p, input.normals[i], input.uvs[i])));
            if keep_tangents {
                res.tangents.push(input.tangents[i]);
            }
        } else {
            remap.push(None);
        }
    }

    let mut seen = vec![false; res.positions.len()];
    let mut boundary = Vec::new();
    for tri in input.indices.iter() {
        let mapped = tri.map(|i| remap[i as usize]);
        match mapped {
            [Some(a), Some(b), Some(c)] => res.push_triangle(a, b, c),
            _ => {
                for idx in mapped.into_iter().flatten() {
                    if !seen[idx as usize] {
                        seen[idx as usize] = true;
                        boundary.push(idx);
                    }
                }
            }
        }
    }
    trace!(
        "Filtered {:?}: {} -> {} vertices, {} boundary vertices.",
        input.name,
        input.positions.len(),
        res.positions.len(),
        boundary.len()
    );
    (res, boundary)
}

/// Brute force nearest vertex to vertex `i` among `subset`. `i` itself is a candidate if it's in
/// the subset. Returns `None` for an empty subset.
pub fn nearest(mesh: &Mesh, subset: &[u32], i: u32) -> Option<u32> {
    let origin = mesh.positions[i as usize];
    subset
        .iter()
        .copied()
        .map(|j| (j, (mesh.positions[j as usize] - origin).norm_squared()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(j, _)| j)
}
