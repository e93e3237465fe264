use model::{CurveError, MeshError};
use render::RenderError;
use shatter::ShatterError;
use th::LoaderError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GlassError {
    #[error("invalid preference `{name}`: {reason}")]
    Config { name: &'static str, reason: String },
    /// An operation was called before the atlas was ready for it.
    #[error("{0}")]
    InvalidState(&'static str),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Shatter(#[from] ShatterError),
    #[error(transparent)]
    Curve(#[from] CurveError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("couldn't write image: {0}")]
    Image(#[from] img::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
