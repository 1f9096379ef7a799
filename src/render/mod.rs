//! Render service interface and the built-in CPU preview service.

mod preview;
mod service;

pub use preview::{PreviewRenderer, PreviewScene};
pub use service::*;
