pub mod mesh;
pub mod ops;

use thiserror::Error;

/// Packed vertex record, laid out the way it's uploaded.
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
#[repr(C)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub norm: [f32; 3],
    pub tangent: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRIBUTES: [&'static str; 4] = ["position", "normal", "tangent", "uv"];
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, bytemuck::Zeroable, bytemuck::Pod)]
#[repr(C)]
pub struct Face {
    pub indices: [u32; 3],
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    #[error("attribute `{attribute}` has {len} entries but the mesh has {expected} positions")]
    AttributeLength {
        attribute: &'static str,
        len: usize,
        expected: usize,
    },
    #[error("triangle {triangle} references vertex {index} but the mesh has {len} vertices")]
    IndexOutOfRange { triangle: usize, index: u32, len: usize },
}
