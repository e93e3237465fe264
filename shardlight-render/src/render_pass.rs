//! Ordered, data-driven offscreen passes.

use crate::{
    BlendMode, Color, MeshHandle, RenderError, Renderer, Shader, TargetHandle, TextureHandle, UniformValue,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// One mesh draw with the uniforms it overrides.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub mesh: MeshHandle,
    pub uniforms: Vec<(&'static str, UniformValue)>,
}

#[derive(Debug, Clone)]
pub enum Draws {
    Meshes(Vec<DrawCall>),
    Fullscreen,
}

/// Everything needed to render into one target.
#[derive(Debug, Clone)]
pub struct RenderPass {
    pub name: &'static str,
    pub shader: Shader,
    pub target: TargetHandle,
    /// Sampler slot and the texture bound to it.
    pub inputs: Vec<(usize, TextureHandle)>,
    pub clear: Option<Color>,
    pub blend: BlendMode,
    pub depth_test: bool,
    /// Set once before any draw.
    pub uniforms: Vec<(&'static str, UniformValue)>,
    pub draws: Draws,
}

impl RenderPass {
    pub fn new(name: &'static str, shader: Shader, target: TargetHandle) -> Self {
        Self {
            name,
            shader,
            target,
            inputs: Vec::new(),
            clear: None,
            blend: BlendMode::Replace,
            depth_test: false,
            uniforms: Vec::new(),
            draws: Draws::Fullscreen,
        }
    }

    pub fn input(mut self, slot: usize, texture: TextureHandle) -> Self {
        self.inputs.push((slot, texture));
        self
    }

    pub fn clear(mut self, color: Color) -> Self {
        self.clear = Some(color);
        self
    }

    pub fn blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    pub fn depth_test(mut self, enabled: bool) -> Self {
        self.depth_test = enabled;
        self
    }

    pub fn uniform(mut self, name: &'static str, value: impl Into<UniformValue>) -> Self {
        self.uniforms.push((name, value.into()));
        self
    }

    pub fn draws(mut self, draws: Draws) -> Self {
        self.draws = draws;
        self
    }

    /// Runs the pass, leaving no target or texture bound afterwards and the draw state as it found
    /// it, whether it succeeds or not.
    pub fn run(&mut self, renderer: &mut Renderer) -> Result<(), RenderError> {
        debug!("Running pass {:?}.", self.name);
        let saved = renderer.state();
        let res = self.run_bound(renderer);
        self.shader.end();
        renderer.unbind_target();
        renderer.unbind_textures();
        renderer.set_state(saved);
        if let Err(e) = &res {
            error!("Pass {:?} failed: {}", self.name, e);
        }
        res
    }

    fn run_bound(&mut self, renderer: &mut Renderer) -> Result<(), RenderError> {
        renderer.bind_target(self.target)?;
        renderer.unbind_textures();
        for &(slot, texture) in self.inputs.iter() {
            renderer.bind_texture(slot, Some(texture))?;
        }
        renderer.set_blend(self.blend);
        renderer.set_depth_test(self.depth_test);
        if let Some(color) = self.clear {
            renderer.clear(color)?;
        }

        self.shader.begin();
        for &(name, value) in self.uniforms.iter() {
            self.shader.set_uniform(name, value)?;
        }
        match &self.draws {
            Draws::Fullscreen => renderer.draw_fullscreen(&self.shader)?,
            Draws::Meshes(calls) => {
                for call in calls {
                    for &(name, value) in call.uniforms.iter() {
                        self.shader.set_uniform(name, value)?;
                    }
                    renderer.draw(&self.shader, call.mesh)?;
                }
                trace!("Pass {:?} drew {} meshes.", self.name, calls.len());
            }
        }
        Ok(())
    }
}

/// Passes run strictly in insertion order.
#[derive(Debug, Clone, Default)]
pub struct PassList {
    passes: Vec<RenderPass>,
}

impl PassList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pass: RenderPass) {
        self.passes.push(pass);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name).collect()
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn run(&mut self, renderer: &mut Renderer) -> Result<(), RenderError> {
        for pass in self.passes.iter_mut() {
            pass.run(renderer)?;
        }
        Ok(())
    }

    /// Runs the single pass called `name`, if there is one.
    pub fn run_pass(&mut self, renderer: &mut Renderer, name: &str) -> Result<bool, RenderError> {
        match self.passes.iter_mut().find(|p| p.name == name) {
            Some(pass) => pass.run(renderer).map(|_| true),
            None => Ok(false),
        }
    }
}
