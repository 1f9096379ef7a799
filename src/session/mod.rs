//! Per-target session state.
//!
//! - [`protocol`] - fixed-size control records and the material payload framing
//! - [`CameraParams`] - camera recomputed from a viewport snapshot
//! - [`RenderTarget`] - diff policy and the render/stream cycle of one image
//! - [`FrameReady`] - render-complete handoff

mod camera;
mod handoff;
pub mod protocol;
mod state;

pub use camera::{CameraParams, Projection, ViewPlane};
pub use handoff::FrameReady;
pub use protocol::{CameraSnapshot, TelemetryRecord, UpdateRecord};
pub use state::{RenderTarget, TargetState};
