
mod buffers;
pub mod raster;
mod registry;
pub mod render_pass;
mod shaders;
mod texture;

use std::{path::Path, sync::Arc};

pub use buffers::LoadedBuffer;
pub use render_pass::{DrawCall, Draws, PassList, RenderPass};
pub use shaders::{
    Fragment, Samplers, Shader, ShaderInfo, ShaderLibrary, ShaderProgram, SolidColor, UniformLocation,
    UniformValue, Uniforms, Varyings,
};
pub use texture::{Color, DepthImage, LoadedImage};

use model::{Mesh, MeshError};
use raster::{rasterize, ClipVertex};
use registry::{Key, Registry};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Point2, Point3, Vector3, Vector4};
use thiserror::Error;

/// Texture units available to a draw.
pub const MAX_TEXTURE_SLOTS: usize = 4;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no texture with handle {0}")]
    UnknownTexture(usize),
    #[error("no mesh with handle {0}")]
    UnknownMesh(usize),
    #[error("no render target with handle {0}")]
    UnknownTarget(usize),
    #[error("texture slot {0} is out of range")]
    InvalidSlot(usize),
    #[error("unsupported texture format: {channels} channels at {bpc} bits per channel")]
    UnsupportedFormat { channels: u32, bpc: u32 },
    #[error("pixel data has {got} bytes, expected {expected}")]
    DataLength { expected: usize, got: usize },
    #[error("couldn't load texture {path:?}")]
    LoadTexture {
        path: String,
        #[source]
        source: img::ImageError,
    },
    #[error("attachment is {got:?} but the target is {expected:?}")]
    SizeMismatch { expected: (u32, u32), got: (u32, u32) },
    #[error("render target {target} is not complete ({status:?})")]
    IncompleteTarget { target: usize, status: TargetStatus },
    #[error("no render target is bound")]
    NoTarget,
    #[error("texture {texture} is both sampled and rendered to")]
    FeedbackLoop { texture: usize },
    #[error("no shader program named {0:?}")]
    MissingProgram(String),
    #[error("shader {shader:?} has no uniform {uniform}")]
    UnknownUniform { shader: &'static str, uniform: String },
    #[error("shader {shader:?} can't bind unknown attribute {attribute:?}")]
    UnknownAttribute { shader: &'static str, attribute: String },
    #[error("shader {0:?} was used outside of begin/end")]
    ShaderNotActive(&'static str),
    #[error("mesh can't be uploaded: {0}")]
    Mesh(#[from] MeshError),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(Key);
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(Key);
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(Key);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    Complete,
    MissingColor,
    /// The color attachment was freed.
    Incomplete,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Replace,
    /// Source over, by source alpha.
    Alpha,
    /// Component-wise product with what's already there.
    Multiply,
}

impl BlendMode {
    fn apply(self, dst: &mut Color, src: Color) {
        match self {
            BlendMode::Replace => *dst = src,
            BlendMode::Alpha => {
                let a = src[3];
                for i in 0..3 {
                    dst[i] = src[i] * a + dst[i] * (1. - a);
                }
                dst[3] = a + dst[3] * (1. - a);
            }
            BlendMode::Multiply => {
                for i in 0..4 {
                    dst[i] *= src[i];
                }
            }
        }
    }
}

/// Offscreen framebuffer: one color texture and an optional depth buffer.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    width: u32,
    height: u32,
    color: Option<TextureHandle>,
    depth: Option<DepthImage>,
}

impl RenderTarget {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color(&self) -> Option<TextureHandle> {
        self.color
    }

    pub fn has_depth(&self) -> bool {
        self.depth.is_some()
    }
}

/// Fixed-function state used by draws.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DrawState {
    pub blend: BlendMode,
    pub depth_test: bool,
}

/// Headless reference renderer.
///
/// Owns every texture, uploaded mesh and render target behind a handle. Drawing is synchronous
/// and deterministic: the same calls always produce the same pixels.
#[derive(Debug, Default)]
pub struct Renderer {
    textures: Registry<LoadedImage>,
    meshes: Registry<LoadedBuffer>,
    targets: Registry<RenderTarget>,
    bound_target: Option<TargetHandle>,
    bound_textures: [Option<TextureHandle>; MAX_TEXTURE_SLOTS],
    state: DrawState,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    // Textures

    fn insert_texture(&mut self, tex: LoadedImage) -> TextureHandle {
        TextureHandle(self.textures.insert(tex))
    }

    /// Uploads raw pixel rows, top row first.
    pub fn upload_texture(
        &mut self,
        name: &str,
        raw: &[u8],
        channels: u32,
        bpc: u32,
        width: u32,
        height: u32,
    ) -> Result<TextureHandle, RenderError> {
        let tex = LoadedImage::from_raw(name, raw, channels, bpc, width, height)?;
        Ok(self.insert_texture(tex))
    }

    pub fn upload_image(&mut self, name: &str, image: &img::RgbaImage) -> TextureHandle {
        self.insert_texture(LoadedImage::from_rgba8(name, image))
    }

    /// A transparent black texture, typically a color attachment.
    pub fn create_texture(&mut self, name: &str, width: u32, height: u32) -> TextureHandle {
        self.insert_texture(LoadedImage::blank(name, width, height))
    }

    pub fn load_texture<P: AsRef<Path>>(&mut self, path: P) -> Result<TextureHandle, RenderError> {
        use img::GenericImageView;

        let path = path.as_ref();
        let image = img::open(path).map_err(|source| {
            error!("Couldn't load texture {:?}: {}", path, source);
            RenderError::LoadTexture {
                path: path.display().to_string(),
                source,
            }
        })?;
        let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        info!("Loaded texture {:?} ({}x{}).", name, image.width(), image.height());
        Ok(self.upload_image(&name, &image.to_rgba8()))
    }

    pub fn texture(&self, handle: TextureHandle) -> Result<&LoadedImage, RenderError> {
        self.textures
            .get(handle.0)
            .ok_or(RenderError::UnknownTexture(handle.0.index()))
    }

    pub fn texture_image(&self, handle: TextureHandle) -> Result<img::RgbaImage, RenderError> {
        self.texture(handle).map(LoadedImage::to_rgba8)
    }

    pub fn free_texture(&mut self, handle: TextureHandle) -> Result<(), RenderError> {
        self.textures
            .remove(handle.0)
            .ok_or(RenderError::UnknownTexture(handle.0.index()))?;
        for slot in self.bound_textures.iter_mut() {
            if *slot == Some(handle) {
                *slot = None;
            }
        }
        Ok(())
    }

    /// Binds a texture to a sampler slot, or clears the slot.
    pub fn bind_texture(&mut self, slot: usize, handle: Option<TextureHandle>) -> Result<(), RenderError> {
        if slot >= MAX_TEXTURE_SLOTS {
            return Err(RenderError::InvalidSlot(slot));
        }
        if let Some(handle) = handle {
            self.texture(handle)?;
        }
        self.bound_textures[slot] = handle;
        Ok(())
    }

    pub fn unbind_textures(&mut self) {
        self.bound_textures = [None; MAX_TEXTURE_SLOTS];
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    // Meshes

    pub fn upload_mesh(&mut self, mesh: &Arc<Mesh>) -> Result<MeshHandle, RenderError> {
        let buffer = LoadedBuffer::new(Arc::clone(mesh))?;
        Ok(MeshHandle(self.meshes.insert(buffer)))
    }

    pub fn mesh(&self, handle: MeshHandle) -> Result<&LoadedBuffer, RenderError> {
        self.meshes
            .get(handle.0)
            .ok_or(RenderError::UnknownMesh(handle.0.index()))
    }

    pub fn free_mesh(&mut self, handle: MeshHandle) -> Result<(), RenderError> {
        let buffer = self
            .meshes
            .remove(handle.0)
            .ok_or(RenderError::UnknownMesh(handle.0.index()))?;
        buffer.free();
        Ok(())
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    // Targets

    pub fn create_target(&mut self, width: u32, height: u32) -> TargetHandle {
        TargetHandle(self.targets.insert(RenderTarget {
            width,
            height,
            color: None,
            depth: None,
        }))
    }

    pub fn target(&self, handle: TargetHandle) -> Result<&RenderTarget, RenderError> {
        self.targets
            .get(handle.0)
            .ok_or(RenderError::UnknownTarget(handle.0.index()))
    }

    fn target_mut(&mut self, handle: TargetHandle) -> Result<&mut RenderTarget, RenderError> {
        self.targets
            .get_mut(handle.0)
            .ok_or(RenderError::UnknownTarget(handle.0.index()))
    }

    pub fn attach_color(&mut self, target: TargetHandle, texture: TextureHandle) -> Result<(), RenderError> {
        let tex = self.texture(texture)?;
        let got = (tex.width(), tex.height());
        let t = self.target_mut(target)?;
        if got != t.size() {
            return Err(RenderError::SizeMismatch { expected: t.size(), got });
        }
        t.color = Some(texture);
        Ok(())
    }

    pub fn attach_depth(&mut self, target: TargetHandle) -> Result<(), RenderError> {
        let t = self.target_mut(target)?;
        t.depth = Some(DepthImage::new(t.width, t.height));
        Ok(())
    }

    pub fn target_status(&self, target: TargetHandle) -> Result<TargetStatus, RenderError> {
        let t = self.target(target)?;
        Ok(match t.color {
            None => TargetStatus::MissingColor,
            Some(tex) if self.texture(tex).is_err() => TargetStatus::Incomplete,
            Some(_) => TargetStatus::Complete,
        })
    }

    pub fn bind_target(&mut self, target: TargetHandle) -> Result<(), RenderError> {
        let status = self.target_status(target)?;
        if status != TargetStatus::Complete {
            error!("Render target {} is {:?}.", target.0.index(), status);
            return Err(RenderError::IncompleteTarget {
                target: target.0.index(),
                status,
            });
        }
        self.bound_target = Some(target);
        Ok(())
    }

    pub fn unbind_target(&mut self) {
        self.bound_target = None;
    }

    pub fn bound_target(&self) -> Option<TargetHandle> {
        self.bound_target
    }

    pub fn free_target(&mut self, target: TargetHandle) -> Result<(), RenderError> {
        self.targets
            .remove(target.0)
            .ok_or(RenderError::UnknownTarget(target.0.index()))?;
        if self.bound_target == Some(target) {
            self.bound_target = None;
        }
        Ok(())
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    /// Quantized copy of a target's color attachment.
    pub fn read_pixels(&self, target: TargetHandle) -> Result<img::RgbaImage, RenderError> {
        let t = self.target(target)?;
        let color = t.color.ok_or(RenderError::IncompleteTarget {
            target: target.0.index(),
            status: TargetStatus::MissingColor,
        })?;
        self.texture_image(color)
    }

    // Drawing

    pub fn set_blend(&mut self, blend: BlendMode) {
        self.state.blend = blend;
    }

    pub fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn set_state(&mut self, state: DrawState) {
        self.state = state;
    }

    fn bound(&self) -> Result<(TargetHandle, TextureHandle), RenderError> {
        let target = self.bound_target.ok_or(RenderError::NoTarget)?;
        let t = self.target(target)?;
        match t.color {
            Some(color) if self.texture(color).is_ok() => Ok((target, color)),
            _ => Err(RenderError::IncompleteTarget {
                target: target.0.index(),
                status: TargetStatus::Incomplete,
            }),
        }
    }

    /// Clears the bound target's color to `color` and its depth to the far plane.
    pub fn clear(&mut self, color: Color) -> Result<(), RenderError> {
        let (target, tex) = self.bound()?;
        if let Some(t) = self.textures.get_mut(tex.0) {
            t.fill(color);
        }
        if let Some(depth) = self.target_mut(target)?.depth.as_mut() {
            depth.clear();
        }
        Ok(())
    }

    /// Draws an uploaded mesh into the bound target.
    pub fn draw(&mut self, shader: &Shader, mesh: MeshHandle) -> Result<(), RenderError> {
        if !shader.is_active() {
            return Err(RenderError::ShaderNotActive(shader.name()));
        }
        let buffer = self.mesh(mesh)?;
        let verts: Vec<ClipVertex> = buffer
            .vertices()
            .iter()
            .map(|v| {
                let (pos, varyings) = shader.program().vertex(shader.uniforms(), v);
                ClipVertex { pos, varyings }
            })
            .collect();
        let tris: Vec<[ClipVertex; 3]> = buffer
            .faces()
            .iter()
            .map(|f| f.indices.map(|i| verts[i as usize]))
            .collect();
        trace!("Drawing {:?} with {:?}: {} triangles.", buffer.name, shader.name(), tris.len());
        self.rasterize_all(shader, &tris)
    }

    /// Draws a quad covering the whole bound target, with UVs spanning `[0, 1]²`.
    ///
    /// The vertex program is skipped: clip positions are the quad corners and the varyings
    /// carry the UVs with `world` set to the NDC position.
    pub fn draw_fullscreen(&mut self, shader: &Shader) -> Result<(), RenderError> {
        if !shader.is_active() {
            return Err(RenderError::ShaderNotActive(shader.name()));
        }
        let corner = |x: f32, y: f32| ClipVertex {
            pos: Vector4::new(x, y, 0., 1.),
            varyings: Varyings {
                world: Point3::new(x, y, 0.),
                normal: Vector3::z(),
                tangent: Vector3::x(),
                uv: Point2::new((x + 1.) / 2., (y + 1.) / 2.),
            },
        };
        let (a, b, c, d) = (corner(-1., -1.), corner(1., -1.), corner(1., 1.), corner(-1., 1.));
        self.rasterize_all(shader, &[[a, b, c], [a, c, d]])
    }

    fn rasterize_all(&mut self, shader: &Shader, tris: &[[ClipVertex; 3]]) -> Result<(), RenderError> {
        let (target, color) = self.bound()?;
        if self.bound_textures.contains(&Some(color)) {
            error!("Texture {} is bound for sampling while rendered to.", color.0.index());
            return Err(RenderError::FeedbackLoop {
                texture: color.0.index(),
            });
        }
        let state = self.state;
        // Both are put back before returning.
        let slot = self
            .textures
            .get_mut(color.0)
            .ok_or(RenderError::UnknownTexture(color.0.index()))?;
        let mut out = std::mem::replace(slot, LoadedImage::blank("", 0, 0));
        let mut depth = self.targets.get_mut(target.0).and_then(|t| t.depth.take());

        let samplers = Samplers {
            units: self.bound_textures.map(|h| h.and_then(|h| self.textures.get(h.0))),
        };
        let size = (out.width(), out.height());
        for tri in tris {
            rasterize(tri, size.0, size.1, |px| {
                let mut stored = depth
                    .as_mut()
                    .filter(|_| state.depth_test)
                    .map(|d| d.at_mut(px.x, px.y));
                if stored.as_ref().is_some_and(|s| px.depth > **s) {
                    return;
                }
                let frag = Fragment {
                    uniforms: shader.uniforms(),
                    samplers: &samplers,
                    frag_coord: Point2::new(px.x as f32 + 0.5, px.y as f32 + 0.5),
                    target_size: size,
                };
                if let Some(src) = shader.program().fragment(&frag, &px.varyings) {
                    if let Some(s) = stored.as_mut() {
                        **s = px.depth;
                    }
                    state.blend.apply(out.texel_mut(px.x, px.y), src);
                }
            });
        }

        if let Some(slot) = self.textures.get_mut(color.0) {
            *slot = out;
        }
        if let Some(t) = self.targets.get_mut(target.0) {
            t.depth = depth;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::procedural::make_grid;
    use na::Matrix4;

    fn solid(color: [f32; 4]) -> Shader {
        let mut shader = Shader::new(Arc::new(SolidColor));
        shader.set_uniform("color", Vector4::from(color)).unwrap();
        shader.begin();
        shader
    }

    fn target(r: &mut Renderer, size: u32) -> (TargetHandle, TextureHandle) {
        let tex = r.create_texture("color", size, size);
        let target = r.create_target(size, size);
        r.attach_color(target, tex).unwrap();
        r.attach_depth(target).unwrap();
        (target, tex)
    }

    #[test]
    fn target_status_tracks_attachments() {
        let mut r = Renderer::new();
        let t = r.create_target(4, 4);
        assert_eq!(r.target_status(t).unwrap(), TargetStatus::MissingColor);
        assert!(matches!(r.bind_target(t), Err(RenderError::IncompleteTarget { .. })));
        let wrong = r.create_texture("small", 2, 2);
        assert!(matches!(r.attach_color(t, wrong), Err(RenderError::SizeMismatch { .. })));
        let tex = r.create_texture("color", 4, 4);
        r.attach_color(t, tex).unwrap();
        assert_eq!(r.target_status(t).unwrap(), TargetStatus::Complete);
        r.free_texture(tex).unwrap();
        assert_eq!(r.target_status(t).unwrap(), TargetStatus::Incomplete);
    }

    #[test]
    fn fullscreen_fills_the_target() {
        let mut r = Renderer::new();
        let (t, _) = target(&mut r, 4);
        r.bind_target(t).unwrap();
        r.clear([0., 0., 0., 1.]).unwrap();
        r.draw_fullscreen(&solid([1., 0., 0., 1.])).unwrap();
        let px = r.read_pixels(t).unwrap();
        assert!(px.pixels().all(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn mesh_draw_covers_its_footprint() {
        let mut r = Renderer::new();
        let (t, _) = target(&mut r, 8);
        // Grid spans [-0.5, 0.5]², the middle half of the target.
        let grid = r.upload_mesh(&Arc::new(make_grid(2, 2, 1., 1.))).unwrap();
        r.bind_target(t).unwrap();
        r.clear([0.; 4]).unwrap();
        r.draw(&solid([0., 1., 0., 1.]), grid).unwrap();
        let px = r.read_pixels(t).unwrap();
        assert_eq!(px.get_pixel(4, 4).0, [0, 255, 0, 255]);
        assert_eq!(px.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(px.pixels().filter(|p| p.0[1] == 255).count(), 16);
    }

    #[test]
    fn depth_test_keeps_the_nearest() {
        let mut r = Renderer::new();
        let (t, _) = target(&mut r, 4);
        let grid = r.upload_mesh(&Arc::new(make_grid(1, 1, 2., 2.))).unwrap();
        r.bind_target(t).unwrap();
        r.set_depth_test(true);
        r.clear([0.; 4]).unwrap();

        let mut near = solid([1., 0., 0., 1.]);
        near.set_uniform("model_view_projection", Matrix4::new_translation(&Vector3::new(0., 0., -0.5))).unwrap();
        let mut far = solid([0., 0., 1., 1.]);
        far.set_uniform("model_view_projection", Matrix4::new_translation(&Vector3::new(0., 0., 0.5))).unwrap();
        r.draw(&near, grid).unwrap();
        r.draw(&far, grid).unwrap();
        assert_eq!(r.read_pixels(t).unwrap().get_pixel(1, 1).0, [255, 0, 0, 255]);

        r.set_depth_test(false);
        r.draw(&far, grid).unwrap();
        assert_eq!(r.read_pixels(t).unwrap().get_pixel(1, 1).0, [0, 0, 255, 255]);
    }

    #[test]
    fn blend_modes() {
        let mut r = Renderer::new();
        let (t, _) = target(&mut r, 2);
        r.bind_target(t).unwrap();
        r.clear([1., 1., 1., 1.]).unwrap();
        r.set_blend(BlendMode::Multiply);
        r.draw_fullscreen(&solid([0.5, 1., 0., 1.])).unwrap();
        assert_eq!(r.read_pixels(t).unwrap().get_pixel(0, 0).0, [128, 255, 0, 255]);

        r.clear([0., 0., 0., 1.]).unwrap();
        r.set_blend(BlendMode::Alpha);
        r.draw_fullscreen(&solid([1., 1., 1., 0.5])).unwrap();
        assert_eq!(r.read_pixels(t).unwrap().get_pixel(1, 1).0, [128, 128, 128, 255]);
    }

    #[test]
    fn sampling_the_target_is_refused() {
        let mut r = Renderer::new();
        let (t, tex) = target(&mut r, 2);
        r.bind_target(t).unwrap();
        r.bind_texture(0, Some(tex)).unwrap();
        assert!(matches!(
            r.draw_fullscreen(&solid([1.; 4])),
            Err(RenderError::FeedbackLoop { .. })
        ));
        // The attachment survives the refused draw.
        assert_eq!(r.target_status(t).unwrap(), TargetStatus::Complete);
    }

    #[test]
    fn draws_need_an_active_shader_and_a_target() {
        let mut r = Renderer::new();
        let mut shader = solid([1.; 4]);
        assert!(matches!(r.draw_fullscreen(&shader), Err(RenderError::NoTarget)));
        let (t, _) = target(&mut r, 2);
        r.bind_target(t).unwrap();
        shader.end();
        assert!(matches!(
            r.draw_fullscreen(&shader),
            Err(RenderError::ShaderNotActive("solid-color"))
        ));
    }

    #[test]
    fn handles_are_released() {
        let mut r = Renderer::new();
        let mesh = r.upload_mesh(&Arc::new(make_grid(1, 1, 1., 1.))).unwrap();
        let (t, tex) = target(&mut r, 2);
        assert_eq!((r.live_meshes(), r.live_textures(), r.live_targets()), (1, 1, 1));
        r.free_mesh(mesh).unwrap();
        r.free_texture(tex).unwrap();
        r.free_target(t).unwrap();
        assert_eq!((r.live_meshes(), r.live_textures(), r.live_targets()), (0, 0, 0));
        assert!(matches!(r.free_mesh(mesh), Err(RenderError::UnknownMesh(_))));
    }

    #[test]
    fn per_frame_resources_reuse_their_slots() {
        let mut r = Renderer::new();
        let (first_target, first_color) = target(&mut r, 2);
        r.free_target(first_target).unwrap();
        r.free_texture(first_color).unwrap();
        for _ in 0..50 {
            let (t, tex) = target(&mut r, 2);
            assert_eq!(t.0.index(), first_target.0.index());
            assert_eq!(tex.0.index(), first_color.0.index());
            r.free_target(t).unwrap();
            r.free_texture(tex).unwrap();
        }
        // The recycled slot doesn't answer to the old handle.
        let (t, _) = target(&mut r, 2);
        assert!(matches!(r.target(first_target), Err(RenderError::UnknownTarget(_))));
        assert_eq!(r.target_status(t).unwrap(), TargetStatus::Complete);
    }

    #[test]
    fn missing_texture_file_is_an_error() {
        let mut r = Renderer::new();
        assert!(matches!(
            r.load_texture("definitely/not/here.png"),
            Err(RenderError::LoadTexture { .. })
        ));
    }
}
