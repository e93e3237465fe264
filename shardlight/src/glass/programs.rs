//! Shader programs used to bake and draw the glass decals.

use std::sync::Arc;

use model::geom::Vertex;
use render::{Color, Fragment, ShaderInfo, ShaderLibrary, ShaderProgram, Uniforms, Varyings};

use na::{Matrix3, Point2, Point3, Vector2, Vector3, Vector4};

pub const SILHOUETTE: &str = "glass-silhouette";
pub const FALLOFF: &str = "glass-falloff";
pub const LIGHTING: &str = "glass-lighting";
pub const BLUR: &str = "glass-blur";
pub const SCATTER: &str = "glass-scatter";
pub const HOST_DECAL: &str = "glass-host-decal";

/// Registers every glass program with `library`.
pub fn register_all(library: &mut ShaderLibrary) {
    library.register(Arc::new(Silhouette));
    library.register(Arc::new(Falloff));
    library.register(Arc::new(Lighting));
    library.register(Arc::new(Blur));
    library.register(Arc::new(Scatter));
    library.register(Arc::new(HostDecal));
}

fn transform(uniforms: &Uniforms, vertex: &Vertex) -> (Vector4<f32>, Varyings) {
    let model = uniforms.mat4("model");
    let world = model * Point3::from(vertex.pos).to_homogeneous();
    let normal_mat = model.fixed_view::<3, 3>(0, 0).into_owned();
    let normal_mat = normal_mat.try_inverse().map(|m| m.transpose()).unwrap_or(normal_mat);
    let varyings = Varyings {
        world: Point3::from_homogeneous(world).unwrap_or_else(|| Point3::from(vertex.pos)),
        normal: normal_mat * Vector3::from(vertex.norm),
        tangent: model.fixed_view::<3, 3>(0, 0) * Vector3::from(vertex.tangent),
        uv: Point2::from(vertex.uv),
    };
    (uniforms.mat4("view_projection") * world, varyings)
}

fn rgb(c: Color) -> Vector3<f32> {
    Vector3::new(c[0], c[1], c[2])
}

fn luminance(c: Color) -> f32 {
    0.299 * c[0] + 0.587 * c[1] + 0.114 * c[2]
}

/// Flat white shards, shrunk about their centroid so the cracks between them stay empty.
#[derive(Debug, Default)]
pub struct Silhouette;

impl ShaderProgram for Silhouette {
    fn info(&self) -> ShaderInfo {
        ShaderInfo {
            name: SILHOUETTE,
            uniforms: &["view_projection", "model", "centroid", "shrink"],
        }
    }

    fn vertex(&self, uniforms: &Uniforms, vertex: &Vertex) -> (Vector4<f32>, Varyings) {
        let c = uniforms.vec2("centroid");
        let shrink = uniforms.float("shrink");
        let mut shrunk = *vertex;
        shrunk.pos[0] = c.x + (vertex.pos[0] - c.x) * shrink;
        shrunk.pos[1] = c.y + (vertex.pos[1] - c.y) * shrink;
        transform(uniforms, &shrunk)
    }

    fn fragment(&self, _: &Fragment, _: &Varyings) -> Option<Color> {
        Some([1.; 4])
    }
}

/// Radial brightness falloff about an impact point.
///
/// Every variant gets its own impact point, spread on a small circle around the pane centre
/// according to `variant / variants`.
#[derive(Debug, Default)]
pub struct Falloff;

impl Falloff {
    pub const SPREAD: f32 = 0.1;
    pub const FLOOR: f32 = 0.35;

    pub fn impact_point(variant: i32, variants: i32) -> Point2<f32> {
        if variants <= 1 {
            return Point2::new(0.5, 0.5);
        }
        let a = variant as f32 / variants as f32 * std::f32::consts::TAU;
        Point2::new(0.5 + Self::SPREAD * a.cos(), 0.5 + Self::SPREAD * a.sin())
    }
}

impl ShaderProgram for Falloff {
    fn info(&self) -> ShaderInfo {
        ShaderInfo {
            name: FALLOFF,
            uniforms: &["view_projection", "model", "variants", "variant"],
        }
    }

    fn vertex(&self, uniforms: &Uniforms, vertex: &Vertex) -> (Vector4<f32>, Varyings) {
        transform(uniforms, vertex)
    }

    fn fragment(&self, frag: &Fragment, v: &Varyings) -> Option<Color> {
        let impact = Self::impact_point(frag.uniforms.int("variant"), frag.uniforms.int("variants"));
        let d = (Point2::new(v.uv.x, v.uv.y) - impact).norm() / std::f32::consts::FRAC_1_SQRT_2;
        let b = Self::FLOOR + (1. - Self::FLOOR) * (1. - d).clamp(0., 1.);
        Some([b, b, b, 1.])
    }
}

/// Lambert lighting of the base texture, with normals bent by the texture's luminance gradient.
#[derive(Debug, Default)]
pub struct Lighting;

impl Lighting {
    pub const BUMP: f32 = 2.;
}

impl ShaderProgram for Lighting {
    fn info(&self) -> ShaderInfo {
        ShaderInfo {
            name: LIGHTING,
            uniforms: &["view_projection", "model", "light_direction", "ambient"],
        }
    }

    fn vertex(&self, uniforms: &Uniforms, vertex: &Vertex) -> (Vector4<f32>, Varyings) {
        transform(uniforms, vertex)
    }

    fn fragment(&self, frag: &Fragment, v: &Varyings) -> Option<Color> {
        let base = frag.samplers.sample(0, &v.uv);
        let (w, h) = frag.samplers.size(0).unwrap_or((1, 1));
        let (du, dv) = (1. / w as f32, 1. / h as f32);
        let gx = luminance(frag.samplers.sample(0, &(v.uv + Vector2::new(du, 0.))))
            - luminance(frag.samplers.sample(0, &(v.uv - Vector2::new(du, 0.))));
        let gy = luminance(frag.samplers.sample(0, &(v.uv + Vector2::new(0., dv))))
            - luminance(frag.samplers.sample(0, &(v.uv - Vector2::new(0., dv))));

        let n = v.normal.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);
        let t = (v.tangent - n * n.dot(&v.tangent))
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::x);
        let tbn = Matrix3::from_columns(&[t, n.cross(&t), n]);
        let bumped = (tbn * Vector3::new(-gx * Self::BUMP, -gy * Self::BUMP, 1.)).normalize();

        let l = frag
            .uniforms
            .vec3("light_direction")
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::z);
        let ambient = frag.uniforms.float("ambient");
        let lit = rgb(base) * (ambient + (1. - ambient) * bumped.dot(&l).max(0.));
        Some([lit.x, lit.y, lit.z, 1.])
    }
}

/// One direction of a separable 9-tap Gaussian blur over slot 0.
#[derive(Debug, Default)]
pub struct Blur;

impl Blur {
    pub const WEIGHTS: [f32; 5] = [0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216];
}

impl ShaderProgram for Blur {
    fn info(&self) -> ShaderInfo {
        ShaderInfo {
            name: BLUR,
            uniforms: &["imageWidth", "imageHeight", "horizontal"],
        }
    }

    fn vertex(&self, _: &Uniforms, vertex: &Vertex) -> (Vector4<f32>, Varyings) {
        (Point3::from(vertex.pos).to_homogeneous(), Varyings::from_vertex(vertex))
    }

    fn fragment(&self, frag: &Fragment, _: &Varyings) -> Option<Color> {
        let (x, y) = (frag.frag_coord.x as i64, frag.frag_coord.y as i64);
        let (dx, dy) = if frag.uniforms.int("horizontal") != 0 { (1, 0) } else { (0, 1) };
        let mut sum = frag.samplers.fetch(0, x, y).map(|c| c * Self::WEIGHTS[0]);
        for (i, w) in Self::WEIGHTS.iter().enumerate().skip(1) {
            let i = i as i64;
            let a = frag.samplers.fetch(0, x + dx * i, y + dy * i);
            let b = frag.samplers.fetch(0, x - dx * i, y - dy * i);
            for c in 0..4 {
                sum[c] += (a[c] + b[c]) * w;
            }
        }
        Some(sum)
    }
}

/// Shards flying off a host surface, textured from their cell of the diffuse atlas.
#[derive(Debug, Default)]
pub struct Scatter;

impl ShaderProgram for Scatter {
    fn info(&self) -> ShaderInfo {
        ShaderInfo {
            name: SCATTER,
            uniforms: &[
                "model",
                "view_projection",
                "ambient",
                "shine",
                "reflectivity",
                "uv_anchor",
                "cell",
            ],
        }
    }

    fn vertex(&self, uniforms: &Uniforms, vertex: &Vertex) -> (Vector4<f32>, Varyings) {
        let (pos, mut v) = transform(uniforms, vertex);
        let cell = uniforms.vec4("cell");
        v.uv = Point2::new(
            cell.x + (cell.z - cell.x) * vertex.uv[0],
            cell.y + (cell.w - cell.y) * vertex.uv[1],
        );
        (pos, v)
    }

    fn fragment(&self, frag: &Fragment, v: &Varyings) -> Option<Color> {
        let texel = frag.samplers.sample(0, &v.uv);
        if texel[3] <= 0. {
            return None;
        }
        let n = v.normal.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);
        let facing = n.z.abs();
        let u = frag.uniforms;
        let lit = rgb(texel) * (u.float("ambient") + u.float("reflectivity") * facing)
            + Vector3::repeat(u.float("shine") * facing.powi(8));
        Some([lit.x, lit.y, lit.z, texel[3]])
    }
}

/// A host surface carrying the outline decal around `uv_anchor`.
///
/// Slot 0 is the host texture, slot 1 the outline atlas. `cell` is the placed variant's atlas
/// rectangle and `decal_size` the decal's extent in host UV units.
#[derive(Debug, Default)]
pub struct HostDecal;

impl HostDecal {
    pub const CRACK_DARKNESS: f32 = 0.8;
}

impl ShaderProgram for HostDecal {
    fn info(&self) -> ShaderInfo {
        ShaderInfo {
            name: HOST_DECAL,
            uniforms: &["model", "view_projection", "uv_anchor", "decal_size", "cell"],
        }
    }

    fn vertex(&self, uniforms: &Uniforms, vertex: &Vertex) -> (Vector4<f32>, Varyings) {
        transform(uniforms, vertex)
    }

    fn fragment(&self, frag: &Fragment, v: &Varyings) -> Option<Color> {
        let u = frag.uniforms;
        let mut color = match frag.samplers.size(0) {
            Some(_) => frag.samplers.sample(0, &v.uv),
            None => [0.8, 0.8, 0.8, 1.],
        };
        let size = u.float("decal_size");
        if size > 0. {
            let local = (v.uv - Point2::from(u.vec2("uv_anchor"))) / size + Vector2::repeat(0.5);
            if (0. ..=1.).contains(&local.x) && (0. ..=1.).contains(&local.y) {
                let cell = u.vec4("cell");
                let atlas_uv = Point2::new(
                    cell.x + (cell.z - cell.x) * local.x,
                    cell.y + (cell.w - cell.y) * local.y,
                );
                let crack = frag.samplers.sample(1, &atlas_uv)[3];
                for c in color.iter_mut().take(3) {
                    *c *= 1. - Self::CRACK_DARKNESS * crack;
                }
            }
        }
        color[3] = 1.;
        Some(color)
    }
}
