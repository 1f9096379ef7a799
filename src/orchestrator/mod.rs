//! Frame orchestration: the session loop and the reconnect driver.
//!
//! Per cycle the [`Orchestrator`] receives an update and a material
//! payload, lets the addressed [`RenderTarget`](crate::session::RenderTarget)
//! diff them, renders one step and streams pixels plus telemetry back. A
//! fault ends the session; the [`Driver`] reconnects and starts the next.

mod driver;
mod session;

pub use driver::{Driver, DriverStats};
pub use session::{Addressing, Orchestrator, SessionEnd, VolumeBinding};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "stop requested" flag, checked once per cycle.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
