use std::sync::Arc;

use crate::RenderError;
use model::{
    geom::{Face, Vertex},
    Mesh,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Vertex and index data packed for drawing, remembering which mesh it was uploaded from.
#[derive(Debug, Clone)]
pub struct LoadedBuffer {
    pub name: String,
    source: Option<Arc<Mesh>>,
    vertices: Vec<Vertex>,
    faces: Vec<Face>,
}

impl LoadedBuffer {
    pub fn new(source: Arc<Mesh>) -> Result<Self, RenderError> {
        source.validate()?;
        trace!(
            "Requested creation of LoadedBuffer for {:?} with {} vertices.",
            source.name,
            source.vertex_count()
        );
        Ok(LoadedBuffer {
            name: source.name.clone(),
            vertices: source.to_vertices(),
            faces: source.to_faces(),
            source: Some(source),
        })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Size of the packed vertex data.
    pub fn byte_len(&self) -> usize {
        bytemuck::cast_slice::<Vertex, u8>(&self.vertices).len()
            + bytemuck::cast_slice::<Face, u8>(&self.faces).len()
    }

    pub fn free(mut self) {
        self.source.take();
    }

    pub fn matches_source(&self, check: &Arc<Mesh>) -> bool {
        if let Some(ref a) = self.source {
            Arc::ptr_eq(a, check)
        } else {
            false
        }
    }
}
