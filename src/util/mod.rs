//! Utility types shared across the bridge.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Transform`] / [`BoundBox`] - Math helpers over `glam`

mod error;
mod math;

pub use error::*;
pub use math::*;
