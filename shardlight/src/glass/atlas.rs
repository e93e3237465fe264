use std::sync::Arc;

use crate::{
    glass::{
        placement::{pick_vertex, Placement, ShardPose, TangentFrame},
        programs,
    },
    GlassError, GlassPreferences,
};
use model::{
    camera::{atlas_cell_uv, OrthoCamera},
    Mesh,
};
use render::{
    BlendMode, DrawCall, Draws, MeshHandle, PassList, RenderPass, Renderer, Shader, ShaderLibrary, TargetHandle,
    TextureHandle, UniformValue,
};
use shatter::{FractureParams, Shard, ShardArena, ShardId};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Matrix4, Vector4};
use rand::Rng;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AtlasState {
    Unbuilt,
    Baked,
    Placed,
}

/// A render target together with the texture it renders into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Attachment {
    target: TargetHandle,
    color: TextureHandle,
}

impl Attachment {
    fn create(renderer: &mut Renderer, name: &str, size: u32, depth: bool) -> Result<Self, GlassError> {
        let color = renderer.create_texture(name, size, size);
        let target = renderer.create_target(size, size);
        let attachment = Self { target, color };
        let attached = renderer
            .attach_color(target, color)
            .and_then(|_| if depth { renderer.attach_depth(target) } else { Ok(()) });
        if let Err(e) = attached {
            attachment.free(renderer);
            return Err(e.into());
        }
        Ok(attachment)
    }

    fn free(&self, renderer: &mut Renderer) {
        if let Err(e) = renderer.free_target(self.target).and_then(|_| renderer.free_texture(self.color)) {
            warn!("Couldn't free attachment {:?}: {}", self, e);
        }
    }
}

/// GPU side of a bake. Mesh handles are indexed like the shard arena.
#[derive(Debug, Default)]
struct Baked {
    meshes: Vec<Vec<MeshHandle>>,
    targets: Vec<Attachment>,
}

impl Baked {
    const IMPACT: usize = 0;
    const DIFFUSE: usize = 1;
    const SCRATCH: usize = 2;

    fn impact(&self) -> Attachment {
        self.targets[Self::IMPACT]
    }

    fn diffuse(&self) -> Attachment {
        self.targets[Self::DIFFUSE]
    }

    fn scratch(&self) -> Attachment {
        self.targets[Self::SCRATCH]
    }

    fn mesh(&self, id: ShardId) -> Option<MeshHandle> {
        self.meshes.get(id.variant)?.get(id.shard).copied()
    }

    fn free(self, renderer: &mut Renderer) {
        for mesh in self.meshes.into_iter().flatten() {
            if let Err(e) = renderer.free_mesh(mesh) {
                warn!("Couldn't free shard mesh: {}", e);
            }
        }
        for attachment in self.targets.iter() {
            attachment.free(renderer);
        }
    }
}

/// Owns the fractured variants of the pane, their baked atlases and the current placement.
#[derive(Debug)]
pub struct GlassAtlas {
    prefs: GlassPreferences,
    params: FractureParams,
    shards: ShardArena,
    baked: Option<Baked>,
    placement: Option<Placement>,
}

impl GlassAtlas {
    pub const PASS_NAMES: [&'static str; 5] = ["impact", "falloff", "lighting", "blur-horizontal", "blur-vertical"];

    /// Fractures `variants_per_side²` independent variants. Nothing is baked yet.
    pub fn new<R: Rng + ?Sized>(rng: &mut R, prefs: GlassPreferences) -> Result<Self, GlassError> {
        prefs.validate()?;
        let params = FractureParams::default();
        let shards = ShardArena::generate(rng, &params, prefs.variant_count())?;
        Self::from_shards(prefs, params, shards)
    }

    /// Wraps already fractured variants, one per atlas cell.
    pub fn from_shards(prefs: GlassPreferences, params: FractureParams, shards: ShardArena) -> Result<Self, GlassError> {
        prefs.validate()?;
        if shards.variant_count() != prefs.variant_count() {
            return Err(GlassError::Config {
                name: "variants_per_side",
                reason: format!(
                    "a {0}x{0} atlas holds {1} variants, got {2}",
                    prefs.variants_per_side,
                    prefs.variant_count(),
                    shards.variant_count()
                ),
            });
        }
        Ok(Self {
            prefs,
            params,
            shards,
            baked: None,
            placement: None,
        })
    }

    pub fn state(&self) -> AtlasState {
        match (&self.baked, &self.placement) {
            (None, _) => AtlasState::Unbuilt,
            (Some(_), None) => AtlasState::Baked,
            (Some(_), Some(_)) => AtlasState::Placed,
        }
    }

    pub fn preferences(&self) -> &GlassPreferences {
        &self.prefs
    }

    pub fn shards(&self) -> &ShardArena {
        &self.shards
    }

    pub fn placement(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }

    fn baked(&self) -> Result<&Baked, GlassError> {
        self.baked
            .as_ref()
            .ok_or(GlassError::InvalidState("the glass atlas has not been baked"))
    }

    fn placed(&self) -> Result<(&Baked, &Placement), GlassError> {
        let baked = self.baked()?;
        let placement = self
            .placement
            .as_ref()
            .ok_or(GlassError::InvalidState("no hit point has been placed"))?;
        Ok((baked, placement))
    }

    /// The pre-lit diffuse atlas.
    pub fn diffuse(&self) -> Result<TextureHandle, GlassError> {
        Ok(self.baked()?.diffuse().color)
    }

    /// The blurred silhouette atlas.
    pub fn outline(&self) -> Result<TextureHandle, GlassError> {
        Ok(self.baked()?.impact().color)
    }

    /// Atlas rectangle of a variant's pane as `(min u, min v, max u, max v)`.
    pub fn cell_uv(&self, variant: usize) -> Vector4<f32> {
        let (min, max) = atlas_cell_uv(self.prefs.variants_per_side, variant);
        let centre = na::center(&min, &max);
        let half = (max - min) * 0.5 * self.prefs.cell_fill;
        Vector4::new(centre.x - half.x, centre.y - half.y, centre.x + half.x, centre.y + half.y)
    }

    // Baking

    /// Renders every variant into the atlases. Any missing program or texture is fatal.
    ///
    /// Baking again first releases the previous bake.
    pub fn generate_decals(
        &mut self,
        renderer: &mut Renderer,
        library: &ShaderLibrary,
        base_texture: TextureHandle,
    ) -> Result<(), GlassError> {
        if self.baked.is_some() {
            self.release(renderer)?;
        }
        let mut baked = Baked::default();
        match self.bake_into(renderer, library, base_texture, &mut baked) {
            Ok(()) => {
                info!(
                    "Baked {} glass variants ({} shards).",
                    self.shards.variant_count(),
                    self.shards.shard_count()
                );
                self.baked = Some(baked);
                Ok(())
            }
            Err(e) => {
                error!("Baking the glass atlas failed: {}", e);
                baked.free(renderer);
                Err(e)
            }
        }
    }

    fn bake_into(
        &self,
        renderer: &mut Renderer,
        library: &ShaderLibrary,
        base_texture: TextureHandle,
        baked: &mut Baked,
    ) -> Result<(), GlassError> {
        renderer.texture(base_texture)?;
        let shaders = [
            library.compile(programs::SILHOUETTE)?,
            library.compile(programs::FALLOFF)?,
            library.compile(programs::LIGHTING)?,
            library.compile(programs::BLUR)?,
        ];

        for v in 0..self.shards.variant_count() {
            let mut handles = Vec::new();
            for shard in self.shards.variant(v).unwrap_or(&[]) {
                handles.push(renderer.upload_mesh(&Arc::new(shard.mesh.clone()))?);
            }
            baked.meshes.push(handles);
        }
        baked
            .targets
            .push(Attachment::create(renderer, "impact", self.prefs.impact_size, false)?);
        baked
            .targets
            .push(Attachment::create(renderer, "diffuse", self.prefs.diffuse_size, true)?);
        baked
            .targets
            .push(Attachment::create(renderer, "blur-scratch", self.prefs.impact_size, false)?);

        let mut passes = self.bake_passes(baked, shaders, base_texture);
        debug!("Running bake passes {:?}.", passes.names());
        passes.run(renderer)?;
        Ok(())
    }

    /// One draw per shard, each drawn by its variant's atlas camera.
    fn shard_draws<F>(&self, baked: &Baked, extra: F) -> Draws
    where
        F: Fn(ShardId, &Shard) -> Vec<(&'static str, UniformValue)>,
    {
        let n = self.prefs.variants_per_side;
        let cameras: Vec<Matrix4<f32>> = (0..self.shards.variant_count())
            .map(|v| OrthoCamera::atlas_cell(n, v, self.prefs.cell_fill).vp_mat())
            .collect();
        let calls = self
            .shards
            .iter()
            .filter_map(|(id, shard)| {
                let mesh = baked.mesh(id)?;
                let mut uniforms = vec![("view_projection", UniformValue::from(cameras[id.variant]))];
                uniforms.extend(extra(id, shard));
                Some(DrawCall { mesh, uniforms })
            })
            .collect();
        Draws::Meshes(calls)
    }

    fn bake_passes(&self, baked: &Baked, shaders: [Shader; 4], base_texture: TextureHandle) -> PassList {
        let [silhouette, falloff, lighting, blur] = shaders;
        let (impact, diffuse, scratch) = (baked.impact(), baked.diffuse(), baked.scratch());
        let blur_size = self.prefs.impact_size as f32;
        let variants = self.shards.variant_count() as i32;

        let mut passes = PassList::new();
        passes.push(
            RenderPass::new(Self::PASS_NAMES[0], silhouette, impact.target)
                .clear([0.; 4])
                .uniform("shrink", self.prefs.crack_shrink)
                .draws(self.shard_draws(baked, |_, shard| vec![("centroid", shard.centroid.into())])),
        );
        passes.push(
            RenderPass::new(Self::PASS_NAMES[1], falloff, diffuse.target)
                .clear([0.; 4])
                .depth_test(true)
                .uniform("variants", variants)
                .draws(self.shard_draws(baked, |id, _| vec![("variant", (id.variant as i32).into())])),
        );
        passes.push(
            RenderPass::new(Self::PASS_NAMES[2], lighting, diffuse.target)
                .input(0, base_texture)
                .blend(BlendMode::Multiply)
                .depth_test(true)
                .uniform("light_direction", self.prefs.light_direction)
                .uniform("ambient", self.prefs.ambient)
                .draws(self.shard_draws(baked, |_, _| Vec::new())),
        );
        passes.push(
            RenderPass::new(Self::PASS_NAMES[3], blur.clone(), scratch.target)
                .input(0, impact.color)
                .uniform("imageWidth", blur_size)
                .uniform("imageHeight", blur_size)
                .uniform("horizontal", true),
        );
        passes.push(
            RenderPass::new(Self::PASS_NAMES[4], blur, impact.target)
                .input(0, scratch.color)
                .uniform("imageWidth", blur_size)
                .uniform("imageHeight", blur_size)
                .uniform("horizontal", false),
        );
        passes
    }

    /// Frees everything the bake created. The shards survive; the placement doesn't.
    pub fn release(&mut self, renderer: &mut Renderer) -> Result<(), GlassError> {
        self.placement = None;
        if let Some(baked) = self.baked.take() {
            baked.free(renderer);
            debug!("Released the glass atlas.");
        }
        Ok(())
    }

    /// Throws away every variant and its atlases, fractures new ones and bakes them.
    pub fn reload<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        renderer: &mut Renderer,
        library: &ShaderLibrary,
        base_texture: TextureHandle,
    ) -> Result<(), GlassError> {
        self.release(renderer)?;
        self.shards = ShardArena::generate(rng, &self.params, self.prefs.variant_count())?;
        info!("Regenerated {} glass variants.", self.shards.variant_count());
        self.generate_decals(renderer, library, base_texture)
    }

    // Placement

    /// Places a random variant on a random vertex from the middle of `host`'s vertex list.
    pub fn randomize_hitpoint<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        host: &Mesh,
        transform: &Matrix4<f32>,
    ) -> Result<Placement, GlassError> {
        self.baked()?;
        if host.is_empty() {
            return Err(GlassError::InvalidState("the host mesh has no vertices"));
        }
        let variant = rng.random_range(0..self.shards.variant_count());
        let vertex = pick_vertex(rng, host.vertex_count());
        self.set_hitpoint(host, transform, vertex, variant)
    }

    pub fn set_hitpoint(
        &mut self,
        host: &Mesh,
        transform: &Matrix4<f32>,
        vertex: usize,
        variant: usize,
    ) -> Result<Placement, GlassError> {
        self.baked()?;
        if variant >= self.shards.variant_count() {
            return Err(GlassError::InvalidState("no such glass variant"));
        }
        let frame = TangentFrame::at_vertex(host, transform, vertex)?;
        let placement = Placement { variant, vertex, frame };
        info!(
            "Placed glass variant {} on vertex {} of {:?} at {:?}.",
            variant,
            vertex,
            host.name,
            frame.position()
        );
        self.placement = Some(placement);
        Ok(placement)
    }

    // Scatter

    /// Pose of every shard of the placed variant at time `t`.
    pub fn scatter_poses(&self, t: f32) -> Result<Vec<ShardPose>, GlassError> {
        let (_, placement) = self.placed()?;
        Ok(self
            .shards
            .variant(placement.variant)
            .unwrap_or(&[])
            .iter()
            .map(|shard| ShardPose::at(shard, &placement.frame, &self.prefs, t))
            .collect())
    }

    /// Draws the placed variant's shards at time `t` into the bound target, textured from the
    /// diffuse atlas in slot 0.
    pub fn draw_scatter(
        &self,
        renderer: &mut Renderer,
        t: f32,
        shader: &mut Shader,
        view_projection: &Matrix4<f32>,
    ) -> Result<(), GlassError> {
        let (baked, placement) = self.placed()?;
        let poses = self.scatter_poses(t)?;
        renderer.bind_texture(0, Some(baked.diffuse().color))?;
        shader.begin();
        let res = (|| -> Result<(), GlassError> {
            shader.set_uniform("view_projection", *view_projection)?;
            shader.set_uniform("uv_anchor", placement.frame.uv_anchor)?;
            shader.set_uniform("cell", self.cell_uv(placement.variant))?;
            for (shard, pose) in poses.iter().enumerate() {
                let id = ShardId {
                    variant: placement.variant,
                    shard,
                };
                let mesh = baked
                    .mesh(id)
                    .ok_or(GlassError::InvalidState("shard was never uploaded"))?;
                shader.set_uniform("model", pose.model)?;
                shader.set_uniform("ambient", pose.ambient)?;
                shader.set_uniform("shine", pose.shine)?;
                shader.set_uniform("reflectivity", pose.reflectivity)?;
                renderer.draw(shader, mesh)?;
            }
            trace!("Drew {} scattering shards at t = {}.", poses.len(), t);
            Ok(())
        })();
        shader.end();
        renderer.bind_texture(0, None)?;
        res
    }

    /// Draws a host surface with the placed variant's outline decal around the hit point.
    ///
    /// `host_texture` goes to slot 0 and the outline atlas to slot 1.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_host(
        &self,
        renderer: &mut Renderer,
        shader: &mut Shader,
        host: MeshHandle,
        host_texture: Option<TextureHandle>,
        transform: &Matrix4<f32>,
        view_projection: &Matrix4<f32>,
        decal_uv_size: f32,
    ) -> Result<(), GlassError> {
        let (baked, placement) = self.placed()?;
        renderer.bind_texture(0, host_texture)?;
        renderer.bind_texture(1, Some(baked.impact().color))?;
        shader.begin();
        let res = (|| -> Result<(), GlassError> {
            shader.set_uniform("model", *transform)?;
            shader.set_uniform("view_projection", *view_projection)?;
            shader.set_uniform("uv_anchor", placement.frame.uv_anchor)?;
            shader.set_uniform("decal_size", decal_uv_size)?;
            shader.set_uniform("cell", self.cell_uv(placement.variant))?;
            renderer.draw(shader, host)?;
            Ok(())
        })();
        shader.end();
        renderer.unbind_textures();
        res
    }
}
