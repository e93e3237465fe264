extern crate nalgebra as na;
extern crate shardlight_model as model;

mod arena;
mod shatter;
pub mod sites;
pub mod voronoi;

pub use arena::{ShardArena, ShardId};
pub use shatter::{extrude_cell, generate_broken_glass, pane_distance};

use model::{Mesh, MeshError};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Point2, Unit, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShatterError {
    #[error("invalid fracture parameter `{name}`: {reason}")]
    InvalidParams { name: &'static str, reason: &'static str },
    #[error("extruded shard is malformed: {0}")]
    Mesh(#[from] MeshError),
}

/// Constants driving one fracture pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct FractureParams {
    /// Sites always scattered.
    pub base_sites: usize,
    /// Up to this many more sites are added at random.
    pub extra_sites: usize,
    /// Probability of a site being drawn from the central cluster instead of uniformly.
    pub cluster_fraction: f64,
    /// Standard deviation of the central cluster.
    pub cluster_sigma: f64,
    /// Half thickness of a shard is `depth_factor` times its distance to the pane edge.
    pub depth_factor: f32,
    /// Cells closer than this to the pane edge are dropped.
    pub sliver_threshold: f32,
}

impl Default for FractureParams {
    fn default() -> Self {
        Self {
            base_sites: 20,
            extra_sites: 100,
            cluster_fraction: 0.5,
            cluster_sigma: 0.15,
            depth_factor: 0.3,
            sliver_threshold: 0.001,
        }
    }
}

impl FractureParams {
    pub fn validate(&self) -> Result<(), ShatterError> {
        let invalid = |name, reason| Err(ShatterError::InvalidParams { name, reason });
        if self.base_sites + self.extra_sites == 0 {
            return invalid("base_sites", "at least one site is needed");
        }
        if !(0. ..=1.).contains(&self.cluster_fraction) {
            return invalid("cluster_fraction", "must be within [0, 1]");
        }
        if !(self.cluster_sigma > 0.) {
            return invalid("cluster_sigma", "must be positive");
        }
        if !(self.depth_factor >= 0.) {
            return invalid("depth_factor", "must not be negative");
        }
        if !(self.sliver_threshold >= 0.) {
            return invalid("sliver_threshold", "must not be negative");
        }
        Ok(())
    }
}

/// One fragment of a fractured pane. Immutable once generated.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    pub mesh: Mesh,
    /// Smallest distance from the cell's outline to the pane edge.
    pub clearance: f32,
    /// Spin axis used when the shard scatters.
    pub axis: Unit<Vector3<f32>>,
    /// Area centroid of the originating cell, in pane coordinates.
    pub centroid: Point2<f32>,
}
