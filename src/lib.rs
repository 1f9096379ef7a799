//! # Render Bridge
//!
//! Remote-rendering bridge for an interactive path tracer. A controlling
//! front-end streams camera and material updates; the bridge applies them to
//! a live scene, renders one progressive sample step per update and streams
//! pixels and telemetry back. Work can be spread over several cooperating
//! processes, with rank 0 owning the single front-end link.
//!
//! ## Modules
//!
//! - [`util`] - Errors and math helpers
//! - [`graph`] - Typed nodes, sockets, registry and shader graphs
//! - [`scene`] - Scene arena: shaders, geometry, objects, singletons
//! - [`wire`] - Text index + binary blob scene format, live material edits
//! - [`volume`] - Voxel payloads: dense, device-ready, multi-resolution
//! - [`transport`] - Direct, in-memory and rank-routed links
//! - [`session`] - Control records, camera, per-target diff policy
//! - [`render`] - Render service seam and the CPU preview service
//! - [`orchestrator`] - Session loop and reconnect driver
//! - [`distributed`] - Rank topology
//! - [`relay`] - Conversion-service relay
//! - [`config`] - Settings, environment and flags
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use render_bridge::prelude::*;
//!
//! let registry = Arc::new(NodeRegistry::with_builtins());
//! let (scene, decoder) = load_scene(registry, "scene.json".as_ref())?;
//! let service = create_service(&SessionParams::default())?;
//! let target = RenderTarget::new(0, scene, decoder, service, SessionParams::default());
//!
//! let orchestrator = Orchestrator::new(vec![target], Addressing::Local, StopSignal::new())?;
//! let mut driver = Driver::new(DirectTransport::new(), Endpoint::listen_port(7000), orchestrator);
//! driver.run();
//! ```

pub mod config;
pub mod distributed;
pub mod graph;
pub mod orchestrator;
pub mod relay;
pub mod render;
pub mod scene;
pub mod session;
pub mod transport;
pub mod util;
pub mod volume;
pub mod wire;

pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::distributed::Topology;
    pub use crate::graph::{NodeId, NodeRegistry, ShaderGraph, SocketValue};
    pub use crate::orchestrator::{Addressing, Driver, Orchestrator, StopSignal};
    pub use crate::render::{create_service, RenderService, SessionParams};
    pub use crate::scene::Scene;
    pub use crate::session::{RenderTarget, TelemetryRecord, UpdateRecord};
    pub use crate::transport::{DirectTransport, Endpoint, RoutedTransport, Transport};
    pub use crate::util::{Error, Result};
    pub use crate::wire::{load_scene, write_scene, SceneDecoder};
}
