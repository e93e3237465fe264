pub mod loader;
pub mod worker;

pub use loader::{AsyncLoader, LoaderError, Progress};
pub use worker::Worker;
