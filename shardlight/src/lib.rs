//! Shattered glass decals: fractured pane variants baked into texture atlases, placed on host
//! surfaces and scattered over time.

extern crate nalgebra as na;
extern crate shardlight_model as model;
extern crate shardlight_render as render;
extern crate shardlight_shatter as shatter;
extern crate shardlight_threading as th;

mod base_texture;
mod error;
pub mod glass;
mod prefs;
pub mod sandbox;

pub use base_texture::{generate_base_texture, load_base_texture};
pub use error::GlassError;
pub use glass::{AtlasState, GlassAtlas, Placement, ShardPose, TangentFrame};
pub use prefs::GlassPreferences;
pub use sandbox::{HostSurface, Sandbox};
