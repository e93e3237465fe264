//! Triangle scan conversion.
//!
//! Pixel centres sit at `+0.5`, coverage uses edge functions with a top-left fill rule so
//! triangles sharing an edge never both touch a pixel on it. No culling, no clipping: triangles
//! with a vertex behind the eye are dropped whole.

use crate::shaders::Varyings;

use na::{Point2, Vector4};

/// A vertex after the vertex program.
#[derive(Debug, Copy, Clone)]
pub struct ClipVertex {
    pub pos: Vector4<f32>,
    pub varyings: Varyings,
}

/// A covered pixel.
#[derive(Debug, Copy, Clone)]
pub struct Covered {
    pub x: u32,
    pub y: u32,
    /// Window depth in `[0, 1]`.
    pub depth: f32,
    pub varyings: Varyings,
}

struct Screen {
    xy: Point2<f32>,
    depth: f32,
}

fn to_screen(v: &ClipVertex, width: u32, height: u32) -> Option<Screen> {
    if v.pos.w <= f32::EPSILON {
        return None;
    }
    let ndc = v.pos.xyz() / v.pos.w;
    Some(Screen {
        xy: Point2::new(
            (ndc.x + 1.) * 0.5 * width as f32,
            (1. - ndc.y) * 0.5 * height as f32,
        ),
        depth: (ndc.z + 1.) * 0.5,
    })
}

fn edge(a: &Point2<f32>, b: &Point2<f32>, p: &Point2<f32>) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Exactly one of an edge and its reverse is owned.
fn owns_edge(a: &Point2<f32>, b: &Point2<f32>) -> bool {
    let d = b - a;
    d.y > 0. || (d.y == 0. && d.x < 0.)
}

/// Calls `shade` for every pixel of a `width x height` target covered by the triangle.
pub fn rasterize<F: FnMut(Covered)>(tri: &[ClipVertex; 3], width: u32, height: u32, mut shade: F) {
    let screen = match [
        to_screen(&tri[0], width, height),
        to_screen(&tri[1], width, height),
        to_screen(&tri[2], width, height),
    ] {
        [Some(a), Some(b), Some(c)] => [a, b, c],
        _ => return,
    };
    let mut order = [0usize, 1, 2];
    let mut area = edge(&screen[0].xy, &screen[1].xy, &screen[2].xy);
    if area == 0. || !area.is_finite() {
        return;
    }
    if area < 0. {
        order.swap(1, 2);
        area = -area;
    }
    let [i0, i1, i2] = order;
    let (p0, p1, p2) = (screen[i0].xy, screen[i1].xy, screen[i2].xy);
    let varyings = [tri[i0].varyings, tri[i1].varyings, tri[i2].varyings];
    let depths = [screen[i0].depth, screen[i1].depth, screen[i2].depth];
    let owned = [owns_edge(&p1, &p2), owns_edge(&p2, &p0), owns_edge(&p0, &p1)];

    let min_x = p0.x.min(p1.x).min(p2.x).floor().max(0.) as u32;
    let min_y = p0.y.min(p1.y).min(p2.y).floor().max(0.) as u32;
    let max_x = (p0.x.max(p1.x).max(p2.x).ceil().max(0.) as u32).min(width);
    let max_y = (p0.y.max(p1.y).max(p2.y).ceil().max(0.) as u32).min(height);

    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w = [edge(&p1, &p2, &p), edge(&p2, &p0, &p), edge(&p0, &p1, &p)];
            let inside = w
                .iter()
                .zip(owned.iter())
                .all(|(w, owned)| *w > 0. || (*w == 0. && *owned));
            if !inside {
                continue;
            }
            let l = [w[0] / area, w[1] / area, w[2] / area];
            shade(Covered {
                x,
                y,
                depth: depths[0] * l[0] + depths[1] * l[1] + depths[2] * l[2],
                varyings: Varyings::blend(&varyings, l),
            });
        }
    }
}
