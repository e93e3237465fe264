use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    texture::{Color, LoadedImage},
    RenderError, MAX_TEXTURE_SLOTS,
};
use model::geom::Vertex;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Matrix4, Point2, Point3, Vector2, Vector3, Vector4};

/// Static description of a program: its name and the uniform slots it reads, in slot order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShaderInfo {
    pub name: &'static str,
    pub uniforms: &'static [&'static str],
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vector2<f32>),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
    Mat4(Matrix4<f32>),
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}
impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}
impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Float(if v { 1. } else { 0. })
    }
}
impl From<Vector2<f32>> for UniformValue {
    fn from(v: Vector2<f32>) -> Self {
        UniformValue::Vec2(v)
    }
}
impl From<Point2<f32>> for UniformValue {
    fn from(v: Point2<f32>) -> Self {
        UniformValue::Vec2(v.coords)
    }
}
impl From<Vector3<f32>> for UniformValue {
    fn from(v: Vector3<f32>) -> Self {
        UniformValue::Vec3(v)
    }
}
impl From<Vector4<f32>> for UniformValue {
    fn from(v: Vector4<f32>) -> Self {
        UniformValue::Vec4(v)
    }
}
impl From<Matrix4<f32>> for UniformValue {
    fn from(v: Matrix4<f32>) -> Self {
        UniformValue::Mat4(v)
    }
}

/// Named uniform slots with their current values. Unset slots read as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniforms {
    names: &'static [&'static str],
    values: Vec<Option<UniformValue>>,
}

impl Uniforms {
    pub fn new(names: &'static [&'static str]) -> Self {
        Self {
            names,
            values: vec![None; names.len()],
        }
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.slot(name).and_then(|s| self.values[s].as_ref())
    }

    pub fn float(&self, name: &str) -> f32 {
        match self.get(name) {
            Some(UniformValue::Float(v)) => *v,
            Some(UniformValue::Int(v)) => *v as f32,
            _ => 0.,
        }
    }

    pub fn int(&self, name: &str) -> i32 {
        match self.get(name) {
            Some(UniformValue::Int(v)) => *v,
            Some(UniformValue::Float(v)) => *v as i32,
            _ => 0,
        }
    }

    pub fn vec2(&self, name: &str) -> Vector2<f32> {
        match self.get(name) {
            Some(UniformValue::Vec2(v)) => *v,
            _ => Vector2::zeros(),
        }
    }

    pub fn vec3(&self, name: &str) -> Vector3<f32> {
        match self.get(name) {
            Some(UniformValue::Vec3(v)) => *v,
            _ => Vector3::zeros(),
        }
    }

    pub fn vec4(&self, name: &str) -> Vector4<f32> {
        match self.get(name) {
            Some(UniformValue::Vec4(v)) => *v,
            _ => Vector4::zeros(),
        }
    }

    /// Unset matrices read as identity rather than zero.
    pub fn mat4(&self, name: &str) -> Matrix4<f32> {
        match self.get(name) {
            Some(UniformValue::Mat4(v)) => *v,
            _ => Matrix4::identity(),
        }
    }

    fn set(&mut self, slot: usize, value: UniformValue) {
        self.values[slot] = Some(value);
    }
}

/// Something a uniform can be addressed by: its name or its slot index.
pub trait UniformLocation: fmt::Debug {
    fn locate(&self, uniforms: &Uniforms) -> Option<usize>;
}

impl UniformLocation for &str {
    fn locate(&self, uniforms: &Uniforms) -> Option<usize> {
        uniforms.slot(self)
    }
}

impl UniformLocation for usize {
    fn locate(&self, uniforms: &Uniforms) -> Option<usize> {
        (*self < uniforms.names.len()).then_some(*self)
    }
}

/// Per-vertex outputs interpolated across a triangle.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Varyings {
    pub world: Point3<f32>,
    pub normal: Vector3<f32>,
    pub tangent: Vector3<f32>,
    pub uv: Point2<f32>,
}

impl Default for Varyings {
    fn default() -> Self {
        Self {
            world: Point3::origin(),
            normal: Vector3::z(),
            tangent: Vector3::x(),
            uv: Point2::origin(),
        }
    }
}

impl Varyings {
    /// Passes the vertex through untouched.
    pub fn from_vertex(v: &Vertex) -> Self {
        Self {
            world: Point3::from(v.pos),
            normal: Vector3::from(v.norm),
            tangent: Vector3::from(v.tangent),
            uv: Point2::from(v.uv),
        }
    }

    pub fn blend(v: &[Varyings; 3], w: [f32; 3]) -> Self {
        Self {
            world: Point3::from(v[0].world.coords * w[0] + v[1].world.coords * w[1] + v[2].world.coords * w[2]),
            normal: v[0].normal * w[0] + v[1].normal * w[1] + v[2].normal * w[2],
            tangent: v[0].tangent * w[0] + v[1].tangent * w[1] + v[2].tangent * w[2],
            uv: Point2::from(v[0].uv.coords * w[0] + v[1].uv.coords * w[1] + v[2].uv.coords * w[2]),
        }
    }
}

/// The textures bound while a draw runs.
pub struct Samplers<'a> {
    pub(crate) units: [Option<&'a LoadedImage>; MAX_TEXTURE_SLOTS],
}

impl<'a> Samplers<'a> {
    /// Bilinear sample of the texture in `slot`. Unbound slots read as transparent black.
    pub fn sample(&self, slot: usize, uv: &Point2<f32>) -> Color {
        match self.units.get(slot).copied().flatten() {
            Some(tex) => tex.sample(uv),
            None => [0.; 4],
        }
    }

    pub fn fetch(&self, slot: usize, x: i64, y: i64) -> Color {
        match self.units.get(slot).copied().flatten() {
            Some(tex) => tex.fetch(x, y),
            None => [0.; 4],
        }
    }

    pub fn size(&self, slot: usize) -> Option<(u32, u32)> {
        self.units
            .get(slot)
            .copied()
            .flatten()
            .map(|t| (t.width(), t.height()))
    }
}

/// Everything a fragment program can see besides its varyings.
pub struct Fragment<'a> {
    pub uniforms: &'a Uniforms,
    pub samplers: &'a Samplers<'a>,
    /// Pixel centre, origin at the top left.
    pub frag_coord: Point2<f32>,
    pub target_size: (u32, u32),
}

/// A shader program run by the CPU rasteriser.
pub trait ShaderProgram: fmt::Debug + Send + Sync {
    fn info(&self) -> ShaderInfo;
    /// Clip space position plus the varyings to interpolate.
    fn vertex(&self, uniforms: &Uniforms, vertex: &Vertex) -> (Vector4<f32>, Varyings);
    /// Output color, or `None` to discard.
    fn fragment(&self, frag: &Fragment, varyings: &Varyings) -> Option<Color>;
}

/// A compiled program with its own uniform state.
#[derive(Debug, Clone)]
pub struct Shader {
    info: ShaderInfo,
    program: Arc<dyn ShaderProgram>,
    uniforms: Uniforms,
    attributes: Vec<(u32, &'static str)>,
    active: bool,
}

impl Shader {
    pub fn new(program: Arc<dyn ShaderProgram>) -> Self {
        let info = program.info();
        trace!("Compiling shader {:?} with {} uniform slots.", info.name, info.uniforms.len());
        Self {
            info,
            uniforms: Uniforms::new(info.uniforms),
            program,
            attributes: Vec::new(),
            active: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    pub fn info(&self) -> ShaderInfo {
        self.info
    }

    pub fn begin(&mut self) {
        self.active = true;
    }

    pub fn end(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn uniforms(&self) -> &Uniforms {
        &self.uniforms
    }

    pub fn program(&self) -> &dyn ShaderProgram {
        self.program.as_ref()
    }

    pub fn set_uniform<L: UniformLocation>(
        &mut self,
        location: L,
        value: impl Into<UniformValue>,
    ) -> Result<(), RenderError> {
        let slot = location.locate(&self.uniforms).ok_or_else(|| RenderError::UnknownUniform {
            shader: self.info.name,
            uniform: format!("{:?}", location),
        })?;
        self.uniforms.set(slot, value.into());
        Ok(())
    }

    /// Binds a vertex attribute to an input slot. Only the packed [`Vertex`] attributes exist.
    pub fn bind_attribute(&mut self, slot: u32, name: &str) -> Result<(), RenderError> {
        let attribute = Vertex::ATTRIBUTES
            .iter()
            .find(|a| **a == name)
            .copied()
            .ok_or_else(|| RenderError::UnknownAttribute {
                shader: self.info.name,
                attribute: name.to_owned(),
            })?;
        self.attributes.retain(|(s, _)| *s != slot);
        self.attributes.push((slot, attribute));
        Ok(())
    }

    pub fn attribute(&self, slot: u32) -> Option<&'static str> {
        self.attributes.iter().find(|(s, _)| *s == slot).map(|(_, a)| *a)
    }
}

/// Programs available by name.
#[derive(Debug, Default, Clone)]
pub struct ShaderLibrary {
    programs: HashMap<&'static str, Arc<dyn ShaderProgram>>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, program: Arc<dyn ShaderProgram>) {
        let name = program.info().name;
        if self.programs.insert(name, program).is_some() {
            debug!("Replaced shader program {:?}.", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn compile(&self, name: &str) -> Result<Shader, RenderError> {
        match self.programs.get(name) {
            Some(program) => Ok(Shader::new(Arc::clone(program))),
            None => {
                error!("No shader program named {:?} has been registered.", name);
                Err(RenderError::MissingProgram(name.to_owned()))
            }
        }
    }
}

/// Flat color, transformed by `model_view_projection`.
#[derive(Debug, Default)]
pub struct SolidColor;

impl ShaderProgram for SolidColor {
    fn info(&self) -> ShaderInfo {
        ShaderInfo {
            name: "solid-color",
            uniforms: &["model_view_projection", "color"],
        }
    }

    fn vertex(&self, uniforms: &Uniforms, vertex: &Vertex) -> (Vector4<f32>, Varyings) {
        let pos = uniforms.mat4("model_view_projection") * Point3::from(vertex.pos).to_homogeneous();
        (pos, Varyings::from_vertex(vertex))
    }

    fn fragment(&self, frag: &Fragment, _: &Varyings) -> Option<Color> {
        Some(frag.uniforms.vec4("color").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_by_name_and_slot() {
        let mut shader = Shader::new(Arc::new(SolidColor));
        shader.set_uniform("color", Vector4::new(1., 0., 0., 1.)).unwrap();
        shader.set_uniform(0usize, Matrix4::new_scaling(2.)).unwrap();
        assert_eq!(shader.uniforms().vec4("color"), Vector4::new(1., 0., 0., 1.));
        assert_eq!(shader.uniforms().mat4("model_view_projection"), Matrix4::new_scaling(2.));
        assert!(matches!(
            shader.set_uniform("nope", 1f32),
            Err(RenderError::UnknownUniform { shader: "solid-color", .. })
        ));
        assert!(shader.set_uniform(2usize, 1f32).is_err());
    }

    #[test]
    fn unset_uniforms_read_as_defaults() {
        let shader = Shader::new(Arc::new(SolidColor));
        assert_eq!(shader.uniforms().vec4("color"), Vector4::zeros());
        assert_eq!(shader.uniforms().mat4("model_view_projection"), Matrix4::identity());
        assert_eq!(shader.uniforms().float("missing"), 0.);
    }

    #[test]
    fn attributes_must_exist() {
        let mut shader = Shader::new(Arc::new(SolidColor));
        shader.bind_attribute(0, "position").unwrap();
        shader.bind_attribute(0, "uv").unwrap();
        assert_eq!(shader.attribute(0), Some("uv"));
        assert!(matches!(
            shader.bind_attribute(1, "color"),
            Err(RenderError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn library_compiles_registered_programs() {
        let mut lib = ShaderLibrary::new();
        assert!(matches!(lib.compile("solid-color"), Err(RenderError::MissingProgram(_))));
        lib.register(Arc::new(SolidColor));
        let shader = lib.compile("solid-color").unwrap();
        assert_eq!(shader.name(), "solid-color");
        assert!(!shader.is_active());
    }

    #[test]
    fn varyings_blend_linearly() {
        let mut v = [Varyings::default(); 3];
        v[1].uv = Point2::new(1., 0.);
        v[2].uv = Point2::new(0., 1.);
        let mid = Varyings::blend(&v, [0.5, 0.25, 0.25]);
        assert_eq!(mid.uv, Point2::new(0.25, 0.25));
        assert_eq!(mid.normal, Vector3::z());
    }
}
