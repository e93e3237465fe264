//! Glue tying the atlas to a renderer, a seeded generator and an asynchronously loaded host.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    generate_base_texture,
    glass::{programs, GlassAtlas, Placement},
    GlassError, GlassPreferences,
};
use model::Mesh;
use render::{BlendMode, MeshHandle, Renderer, Shader, ShaderLibrary, TextureHandle};
use th::{AsyncLoader, LoaderError, Progress};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::Matrix4;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A surface the glass can be placed on.
#[derive(Debug, Clone)]
pub struct HostSurface {
    pub mesh: Mesh,
    pub transform: Matrix4<f32>,
    /// Host texture coordinates per world unit, used to size the decal on it.
    pub uv_per_unit: f32,
}

/// Looks down -Z at the world square `[-1, 1]²`. Higher Z is nearer.
pub fn frame_view() -> Matrix4<f32> {
    Matrix4::new_nonuniform_scaling(&na::Vector3::new(1., 1., -0.5))
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

#[derive(Debug)]
pub struct Sandbox {
    renderer: Renderer,
    library: ShaderLibrary,
    rng: ChaCha8Rng,
    atlas: GlassAtlas,
    base_texture: TextureHandle,
    scatter: Shader,
    host_shader: Shader,
    host_loader: Option<AsyncLoader<HostSurface>>,
    host: Option<(MeshHandle, HostSurface)>,
}

impl Sandbox {
    /// Fractures and bakes with a procedural base texture.
    pub fn new(prefs: GlassPreferences) -> Result<Self, GlassError> {
        let base = generate_base_texture(prefs.diffuse_size);
        Self::with_base_texture(prefs, &base)
    }

    pub fn with_base_texture(prefs: GlassPreferences, base: &img::RgbaImage) -> Result<Self, GlassError> {
        prefs.validate()?;
        let seed = prefs.seed.unwrap_or_else(clock_seed);
        info!("Seeding the sandbox with {}.", seed);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut renderer = Renderer::new();
        let mut library = ShaderLibrary::new();
        programs::register_all(&mut library);
        let base_texture = renderer.upload_image("base", base);

        let mut atlas = GlassAtlas::new(&mut rng, prefs)?;
        atlas.generate_decals(&mut renderer, &library, base_texture)?;
        let scatter = library.compile(programs::SCATTER)?;
        let host_shader = library.compile(programs::HOST_DECAL)?;
        Ok(Self {
            renderer,
            library,
            rng,
            atlas,
            base_texture,
            scatter,
            host_shader,
            host_loader: None,
            host: None,
        })
    }

    pub fn atlas(&self) -> &GlassAtlas {
        &self.atlas
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// The diffuse and outline atlases, read back.
    pub fn atlas_images(&self) -> Result<(img::RgbaImage, img::RgbaImage), GlassError> {
        Ok((
            self.renderer.texture_image(self.atlas.diffuse()?)?,
            self.renderer.texture_image(self.atlas.outline()?)?,
        ))
    }

    /// Starts loading a host surface in the background, replacing any previous host.
    pub fn load_host<F>(&mut self, name: &str, load: F) -> Result<(), GlassError>
    where
        F: FnOnce(&Progress) -> Result<HostSurface, LoaderError> + Send + 'static,
    {
        if let Some((mesh, _)) = self.host.take() {
            self.renderer.free_mesh(mesh)?;
        }
        self.host_loader = Some(AsyncLoader::spawn(name, load)?);
        Ok(())
    }

    pub fn host_progress(&self) -> f32 {
        self.host_loader.as_ref().map_or(0., AsyncLoader::progress)
    }

    pub fn host_ready(&mut self) -> bool {
        self.host.is_some() || self.host_loader.as_mut().is_some_and(AsyncLoader::ready)
    }

    /// Uploads the host once its loader has finished.
    fn host(&mut self) -> Result<&(MeshHandle, HostSurface), GlassError> {
        if self.host.is_none() {
            let loader = self
                .host_loader
                .as_mut()
                .ok_or(GlassError::InvalidState("no host mesh has been requested"))?;
            let surface = match loader.get() {
                Ok(surface) => surface.clone(),
                Err(LoaderError::NotReady(_)) => {
                    return Err(GlassError::InvalidState("the host mesh is still loading"))
                }
                Err(e) => return Err(e.into()),
            };
            let handle = self.renderer.upload_mesh(&Arc::new(surface.mesh.clone()))?;
            debug!("Uploaded host mesh {:?}.", surface.mesh.name);
            self.host = Some((handle, surface));
        }
        self.host
            .as_ref()
            .ok_or(GlassError::InvalidState("no host mesh has been requested"))
    }

    /// Places a random variant on the loaded host.
    pub fn place_on_host(&mut self) -> Result<Placement, GlassError> {
        self.host()?;
        let (_, surface) = self
            .host
            .as_ref()
            .ok_or(GlassError::InvalidState("no host mesh has been requested"))?;
        self.atlas
            .randomize_hitpoint(&mut self.rng, &surface.mesh, &surface.transform)
    }

    /// Renders the host with its decal and the shards scattering at time `t`.
    pub fn render_frame(&mut self, t: f32, size: u32) -> Result<img::RgbaImage, GlassError> {
        let (host_mesh, transform, uv_per_unit) = {
            let (mesh, surface) = self.host()?;
            (*mesh, surface.transform, surface.uv_per_unit)
        };
        let saved = self.renderer.state();
        let color = self.renderer.create_texture("frame", size, size);
        let target = self.renderer.create_target(size, size);
        let res = self.render_into(target, color, t, host_mesh, &transform, uv_per_unit);
        // Put everything back whether or not the frame made it.
        self.renderer.unbind_target();
        self.renderer.unbind_textures();
        self.renderer.set_state(saved);
        let target_freed = self.renderer.free_target(target);
        let color_freed = self.renderer.free_texture(color);
        let frame = res?;
        target_freed?;
        color_freed?;
        Ok(frame)
    }

    #[allow(clippy::too_many_arguments)]
    fn render_into(
        &mut self,
        target: render::TargetHandle,
        color: TextureHandle,
        t: f32,
        host_mesh: MeshHandle,
        transform: &Matrix4<f32>,
        uv_per_unit: f32,
    ) -> Result<img::RgbaImage, GlassError> {
        let view = frame_view();
        self.renderer.attach_color(target, color)?;
        self.renderer.attach_depth(target)?;
        self.renderer.bind_target(target)?;
        self.renderer.set_depth_test(true);
        self.renderer.set_blend(BlendMode::Replace);
        self.renderer.clear([0., 0., 0., 1.])?;

        let decal_uv = self.atlas.preferences().decal_scale * uv_per_unit;
        self.atlas.draw_host(
            &mut self.renderer,
            &mut self.host_shader,
            host_mesh,
            Some(self.base_texture),
            transform,
            &view,
            decal_uv,
        )?;
        self.renderer.set_blend(BlendMode::Alpha);
        self.atlas.draw_scatter(&mut self.renderer, t, &mut self.scatter, &view)?;
        Ok(self.renderer.read_pixels(target)?)
    }

    /// Fractures new variants and bakes them again. The host stays, the placement doesn't.
    pub fn rebuild(&mut self) -> Result<(), GlassError> {
        info!("Rebuilding the glass atlas.");
        self.atlas
            .reload(&mut self.rng, &mut self.renderer, &self.library, self.base_texture)
    }
}
