use crate::RenderError;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::Point2;

/// RGBA color with components in `[0, 1]`.
pub type Color = [f32; 4];

/// A texture living in the renderer. Row 0 is the top row, V grows upwards when sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    pub name: String,
    image: img::Rgba32FImage,
}

impl LoadedImage {
    pub fn blank(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            image: img::Rgba32FImage::new(width, height),
        }
    }

    /// Builds a texture from raw pixel rows.
    ///
    /// Accepts 1, 3 or 4 channels at 8 bits per channel and single channel 16 bit data in native
    /// byte order. Missing channels are filled in: gray is copied to RGB, alpha is opaque.
    pub fn from_raw(
        name: impl Into<String>,
        raw: &[u8],
        channels: u32,
        bpc: u32,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let name = name.into();
        let texels = width as usize * height as usize;
        let expected = texels * channels as usize * (bpc as usize / 8);
        let values: Vec<f32> = match (channels, bpc) {
            (1 | 3 | 4, 8) => {
                if raw.len() != expected {
                    return Err(RenderError::DataLength { expected, got: raw.len() });
                }
                raw.iter().map(|&b| b as f32 / 255.).collect()
            }
            (1, 16) => {
                if raw.len() != expected {
                    return Err(RenderError::DataLength { expected, got: raw.len() });
                }
                bytemuck::pod_collect_to_vec::<u8, u16>(raw)
                    .into_iter()
                    .map(|v| v as f32 / 65535.)
                    .collect()
            }
            _ => {
                error!("Texture {:?} uses an unsupported format.", name);
                return Err(RenderError::UnsupportedFormat { channels, bpc });
            }
        };
        let mut image = img::Rgba32FImage::new(width, height);
        let channels = channels as usize;
        for (i, px) in image.pixels_mut().enumerate() {
            let src = &values[i * channels..(i + 1) * channels];
            px.0 = match src {
                [v] => [*v, *v, *v, 1.],
                [r, g, b] => [*r, *g, *b, 1.],
                [r, g, b, a] => [*r, *g, *b, *a],
                _ => [0., 0., 0., 1.],
            };
        }
        trace!("Uploaded texture {:?} ({}x{}, {} channels, {} bpc).", name, width, height, channels, bpc);
        Ok(Self { name, image })
    }

    pub fn from_rgba8(name: impl Into<String>, image: &img::RgbaImage) -> Self {
        let mut out = img::Rgba32FImage::new(image.width(), image.height());
        for (dst, src) in out.pixels_mut().zip(image.pixels()) {
            dst.0 = src.0.map(|c| c as f32 / 255.);
        }
        Self {
            name: name.into(),
            image: out,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn fill(&mut self, color: Color) {
        for px in self.image.pixels_mut() {
            px.0 = color;
        }
    }

    /// Texel at `(x, y)`, clamped to the edge.
    pub fn fetch(&self, x: i64, y: i64) -> Color {
        if self.width() == 0 || self.height() == 0 {
            return [0.; 4];
        }
        let x = x.clamp(0, self.width() as i64 - 1) as u32;
        let y = y.clamp(0, self.height() as i64 - 1) as u32;
        self.image.get_pixel(x, y).0
    }

    pub(crate) fn texel_mut(&mut self, x: u32, y: u32) -> &mut Color {
        &mut self.image.get_pixel_mut(x, y).0
    }

    /// Bilinear, clamp-to-edge sampling at `uv`.
    pub fn sample(&self, uv: &Point2<f32>) -> Color {
        let x = uv.x * self.width() as f32 - 0.5;
        let y = (1. - uv.y) * self.height() as f32 - 0.5;
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);
        let [c00, c10, c01, c11] = [
            self.fetch(x0, y0),
            self.fetch(x0 + 1, y0),
            self.fetch(x0, y0 + 1),
            self.fetch(x0 + 1, y0 + 1),
        ];
        let mut out = [0.; 4];
        for i in 0..4 {
            let top = c00[i] + (c10[i] - c00[i]) * fx;
            let bottom = c01[i] + (c11[i] - c01[i]) * fx;
            out[i] = top + (bottom - top) * fy;
        }
        out
    }

    /// Quantized copy, clamping every channel to `[0, 1]`.
    pub fn to_rgba8(&self) -> img::RgbaImage {
        let mut out = img::RgbaImage::new(self.width(), self.height());
        for (dst, src) in out.pixels_mut().zip(self.image.pixels()) {
            dst.0 = src.0.map(|c| (c.clamp(0., 1.) * 255.).round() as u8);
        }
        out
    }
}

/// Depth attachment, cleared to the far plane.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    width: u32,
    values: Vec<f32>,
}

impl DepthImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            values: vec![1.; width as usize * height as usize],
        }
    }

    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 1.);
    }

    pub(crate) fn at_mut(&mut self, x: u32, y: u32) -> &mut f32 {
        &mut self.values[y as usize * self.width as usize + x as usize]
    }
}
