mod atlas;
mod placement;
pub mod programs;

pub use atlas::{AtlasState, GlassAtlas};
pub use placement::{pane_to_frame, pick_vertex, Placement, ShardPose, TangentFrame};
