//! render-bridge - serve a scene to a remote front-end.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use render_bridge::config::{usage, Command, Config};
use render_bridge::distributed::{indexed_path, Topology};
use render_bridge::graph::NodeRegistry;
use render_bridge::orchestrator::{Addressing, Driver, Orchestrator, StopSignal, VolumeBinding};
use render_bridge::relay::{PendingVolume, Relay, RelayConfig};
use render_bridge::render::{available_devices, create_service, find_device, SessionParams};
use render_bridge::scene::Scene;
use render_bridge::session::RenderTarget;
use render_bridge::transport::{DirectTransport, Endpoint, RoutedTransport, TcpStarGroup, Transport};
use render_bridge::wire::{load_scene, SceneDecoder};

fn main() {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "render-bridge".to_string());
    let args: Vec<String> = args.collect();

    let config = match Config::from_args(&args) {
        Ok(Command::Help) => {
            println!("{}", usage(&program));
            return;
        }
        Ok(Command::Run(config)) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config);

    if let Err(e) = run(config) {
        tracing::error!(error = format!("{e:#}"), "fatal");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(config: Config) -> anyhow::Result<()> {
    let params = SessionParams {
        device: config.device.clone(),
        samples: config.samples.max(1),
        threads: config.threads,
    };
    let device = find_device(&params.device).with_context(|| {
        let names: Vec<String> = available_devices().into_iter().map(|d| d.name).collect();
        format!("no device matches '{}' (available: {})", params.device, names.join(", "))
    })?;
    tracing::info!(device = %device.name, description = %device.description, "device selected");

    let topology = Topology::new(config.world.world_size, config.world.rank);
    let registry = Arc::new(NodeRegistry::with_builtins());

    let scene_paths: Vec<(usize, Option<PathBuf>)> = if topology.is_distributed() {
        vec![(topology.rank, config.scene.as_deref().map(|s| topology.scene_path(s)))]
    } else {
        let n = config.anim_frames.max(1);
        (0..n)
            .map(|i| {
                let path = config.scene.as_deref().map(|s| if n > 1 { indexed_path(s, i) } else { s.to_path_buf() });
                (i, path)
            })
            .collect()
    };

    let mut targets = Vec::with_capacity(scene_paths.len());
    for (id, path) in scene_paths {
        let (scene, decoder) = load_target_scene(registry.clone(), path.as_deref())?;
        let service = create_service(&params)?;
        targets.push(RenderTarget::new(id, scene, decoder, service, params.clone()));
    }

    let stop = StopSignal::new();
    let addressing = if topology.is_distributed() {
        Addressing::Rank(topology)
    } else {
        Addressing::Local
    };
    let mut orchestrator = Orchestrator::new(targets, addressing, stop)?;

    let pending = Arc::new(PendingVolume::new());
    let _relay = if config.space_enabled && topology.is_root() {
        let relay_config = RelayConfig {
            listen: SocketAddr::from(([0, 0, 0, 0], config.space_port)),
            server: config.space_server_addr(),
        };
        Some(Relay::spawn(relay_config, pending.clone()).context("starting conversion relay")?)
    } else {
        None
    };
    if let (Some(geometry), Some(attribute)) = (config.volume_geometry.clone(), config.volume_attribute.clone()) {
        orchestrator = orchestrator.with_volume(VolumeBinding { geometry, attribute, pending });
    }

    let endpoint = Endpoint::listen_port(config.port);
    let stats = if topology.is_distributed() {
        let group = TcpStarGroup::connect(&config.world.coordinator, topology.rank, topology.world_size)
            .with_context(|| format!("joining group at {}", config.world.coordinator))?;
        let link = topology.is_root().then(|| Box::new(DirectTransport::new()) as Box<dyn Transport>);
        Driver::new(RoutedTransport::new(group, link), endpoint, orchestrator).run()
    } else {
        Driver::new(DirectTransport::new(), endpoint, orchestrator).run()
    };
    tracing::info!(sessions = stats.sessions, faults = stats.faults, "exiting");
    Ok(())
}

/// Scene for one target. No path or a missing file gives an empty scene;
/// a file that exists but does not parse is fatal.
fn load_target_scene(registry: Arc<NodeRegistry>, path: Option<&Path>) -> anyhow::Result<(Scene, SceneDecoder)> {
    let Some(path) = path else {
        tracing::warn!("no scene given, rendering an empty scene");
        return empty_scene(registry);
    };
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "scene not found, rendering an empty scene");
        return empty_scene(registry);
    }
    load_scene(registry, path).with_context(|| format!("loading scene {}", path.display()))
}

fn empty_scene(registry: Arc<NodeRegistry>) -> anyhow::Result<(Scene, SceneDecoder)> {
    let scene = Scene::new(&registry)?;
    Ok((scene, SceneDecoder::new(registry)))
}
