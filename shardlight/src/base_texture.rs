//! The window frame texture the glass sits in.

use std::path::Path;

use crate::GlassError;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use img::{Rgba, RgbaImage};

const GLASS: [u8; 3] = [18, 138, 183];
const FRAME: Rgba<u8> = Rgba([149, 141, 131, 255]);
const BOLT: Rgba<u8> = Rgba([119, 111, 101, 255]);

fn glass(alpha: u8) -> Rgba<u8> {
    Rgba([GLASS[0], GLASS[1], GLASS[2], alpha])
}

/// Fills the inclusive rectangle between two corners.
fn fill_rect(tex: &mut RgbaImage, (x0, y0): (i64, i64), (x1, y1): (i64, i64), c: Rgba<u8>) {
    let (w, h) = (tex.width() as i64, tex.height() as i64);
    for y in y0.min(y1).max(0)..=y0.max(y1).min(h - 1) {
        for x in x0.min(x1).max(0)..=x0.max(x1).min(w - 1) {
            tex.put_pixel(x as u32, y as u32, c);
        }
    }
}

fn fill_circle(tex: &mut RgbaImage, (cx, cy): (i64, i64), r: i64, c: Rgba<u8>) {
    fill_where(tex, (cx - r, cy - r), (cx + r, cy + r), c, |x, y| {
        (x - cx as f32).powi(2) + (y - cy as f32).powi(2) <= (r * r) as f32
    });
}

/// Hexagon with a vertex pointing along +x.
fn fill_hex(tex: &mut RgbaImage, (cx, cy): (f32, f32), r: f32, c: Rgba<u8>) {
    let corners: Vec<(f32, f32)> = (0..6)
        .map(|i| {
            let a = i as f32 / 6. * std::f32::consts::TAU;
            ((cx + a.cos() * r).trunc(), (cy + a.sin() * r).trunc())
        })
        .collect();
    let lo = ((cx - r).floor() as i64, (cy - r).floor() as i64);
    let hi = ((cx + r).ceil() as i64, (cy + r).ceil() as i64);
    fill_where(tex, lo, hi, c, |x, y| {
        (0..6).all(|i| {
            let (ax, ay) = corners[i];
            let (bx, by) = corners[(i + 1) % 6];
            (bx - ax) * (y - ay) - (by - ay) * (x - ax) >= 0.
        })
    });
}

fn fill_where<F: Fn(f32, f32) -> bool>(tex: &mut RgbaImage, lo: (i64, i64), hi: (i64, i64), c: Rgba<u8>, inside: F) {
    let (w, h) = (tex.width() as i64, tex.height() as i64);
    for y in lo.1.max(0)..=hi.1.min(h - 1) {
        for x in lo.0.max(0)..=hi.0.min(w - 1) {
            if inside(x as f32, y as f32) {
                tex.put_pixel(x as u32, y as u32, c);
            }
        }
    }
}

/// Procedural window: a translucent pane split in two by a bar, in a bolted frame.
///
/// `size` is the edge length in texels. The layout is designed at 1024 texels and scaled.
pub fn generate_base_texture(size: u32) -> RgbaImage {
    let w = size.max(16) as i64;
    let d = (w / 128).max(1);
    let mut tex = RgbaImage::from_pixel(w as u32, w as u32, glass(127));

    // Clear panes with rounded inner corners.
    for (y0, y1, cy) in [(0, w / 2 - 7 * d, w / 2 - 7 * d), (w / 2 + 7 * d, w, w / 2 + 7 * d)] {
        fill_rect(&mut tex, (10 * d, y0), (w - 10 * d, y1), glass(0));
        let inset = if y0 == 0 { (0, w / 2 - 5 * d) } else { (w / 2 + 5 * d, w) };
        fill_rect(&mut tex, (12 * d, inset.0), (w - 12 * d, inset.1), glass(0));
        fill_circle(&mut tex, (12 * d, cy), 2 * d, glass(0));
        fill_circle(&mut tex, (w - 12 * d, cy), 2 * d, glass(0));
    }

    // Frame and the middle bar.
    fill_rect(&mut tex, (0, 0), (7 * d, w), FRAME);
    fill_rect(&mut tex, (w, 0), (w - 7 * d, w), FRAME);
    fill_rect(&mut tex, (0, w / 2 - 2 * d), (w, w / 2 + 2 * d), FRAME);

    // Two staggered columns of bolts down each side.
    let step = (3 * d + 4) as usize;
    let r = 1.5 * d as f32;
    let shift = 1.5 * d as f32 + 2.;
    let df = d as f32;
    let wf = w as f32;
    for i in (3 * d..w / 2 - 2 * d).step_by(step) {
        let i = i as f32;
        fill_hex(&mut tex, (2. * df, i), r, BOLT);
        fill_hex(&mut tex, (5. * df, i + shift), r, BOLT);
        fill_hex(&mut tex, (wf - 2. * df, i), r, BOLT);
        fill_hex(&mut tex, (wf - 5. * df, i + shift), r, BOLT);
    }
    for i in (w / 2 + 3 * d..w - 3 * d).step_by(step) {
        let i = i as f32;
        fill_hex(&mut tex, (2. * df, i + shift), r, BOLT);
        fill_hex(&mut tex, (5. * df, i), r, BOLT);
        fill_hex(&mut tex, (wf - 2. * df, i + shift), r, BOLT);
        fill_hex(&mut tex, (wf - 5. * df, i), r, BOLT);
    }
    debug!("Generated a {}x{} base texture.", w, w);
    tex
}

/// Loads a base texture from disk. A missing or unreadable file is fatal.
pub fn load_base_texture<P: AsRef<Path>>(path: P) -> Result<RgbaImage, GlassError> {
    let path = path.as_ref();
    match img::open(path) {
        Ok(image) => Ok(image.to_rgba8()),
        Err(e) => {
            error!("Couldn't load the base texture {:?}: {}", path, e);
            Err(e.into())
        }
    }
}
