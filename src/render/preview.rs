//! Built-in CPU preview renderer.
//!
//! Shades every pixel from the scene background colour and a gradient along
//! the camera ray, jittered per sample so accumulation converges the way a
//! path tracer's would. Rendering runs on a worker thread; finished steps are
//! handed back through [`FrameReady`].

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use half::f16;
use rayon::prelude::*;

use super::service::{BufferParams, RenderService, SessionParams};
use crate::graph::SocketValue;
use crate::scene::Scene;
use crate::session::{CameraParams, FrameReady, Projection, ViewPlane};
use crate::util::{Error, Result, Transform, Vec3};

/// How long [`PreviewRenderer::wait`] sleeps between liveness checks.
const WAIT_POLL: Duration = Duration::from_millis(250);

/// What the worker needs from a scene.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewScene {
    pub camera: CameraParams,
    pub background: Vec3,
}

impl PreviewScene {
    /// Read the camera node sockets and the background colour.
    pub fn from_scene(scene: &Scene) -> Self {
        let node = scene.get(scene.camera).map(|c| &c.node);
        let float = |name: &str, default: f32| {
            node.and_then(|n| n.get(name)).and_then(SocketValue::as_float).unwrap_or(default)
        };
        let int = |name: &str| node.and_then(|n| n.get(name)).and_then(SocketValue::as_int).unwrap_or(0);
        let projection = match node.and_then(|n| n.get("camera_type")) {
            Some(SocketValue::Enum(1)) => Projection::Orthographic,
            _ => Projection::Perspective,
        };
        let matrix = node
            .and_then(|n| n.get("matrix"))
            .and_then(SocketValue::as_transform)
            .copied()
            .unwrap_or(Transform::IDENTITY);

        Self {
            camera: CameraParams {
                matrix,
                projection,
                fov: float("fov", std::f32::consts::FRAC_PI_4),
                near: float("nearclip", 0.1),
                far: float("farclip", 1000.0),
                width: int("full_width").max(0) as u32,
                height: int("full_height").max(0) as u32,
                viewplane: ViewPlane {
                    left: float("viewplane_left", -1.0),
                    right: float("viewplane_right", 1.0),
                    bottom: float("viewplane_bottom", -1.0),
                    top: float("viewplane_top", 1.0),
                },
            },
            background: scene.background_color(),
        }
    }

    /// Radiance along the ray through `(u, v)`.
    fn shade(&self, u: f32, v: f32) -> Vec3 {
        let dir = self.camera.matrix.transform_direction(self.camera.ray_direction(u, v));
        let dir = dir.normalize_or_zero();
        let t = 0.5 * (dir.y + 1.0);
        self.background * (0.6 + 0.4 * t) + Vec3::splat(0.05 * t)
    }
}

#[derive(Debug)]
enum PreviewCommand {
    Reset { width: u32, height: u32 },
    Scene(Arc<PreviewScene>),
    Render { target: u32 },
    Stop,
}

/// CPU preview service. One worker thread per instance.
pub struct PreviewRenderer {
    tx: Sender<PreviewCommand>,
    ready: Arc<FrameReady>,
    handle: Option<JoinHandle<()>>,
    pixels: Vec<u8>,
    target: u32,
    last_scene: Option<Arc<PreviewScene>>,
}

impl PreviewRenderer {
    /// Spawn the worker. `threads == 0` uses rayon's default pool size.
    pub fn spawn(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("preview-{i}"))
            .build()
            .map_err(|e| Error::other(format!("preview thread pool: {e}")))?;
        let (tx, rx) = channel();
        let ready = Arc::new(FrameReady::new());
        let handle = {
            let ready = ready.clone();
            thread::Builder::new()
                .name("preview-render".into())
                .spawn(move || worker_loop(pool, rx, ready))?
        };
        Ok(Self {
            tx,
            ready,
            handle: Some(handle),
            pixels: Vec::new(),
            target: 1,
            last_scene: None,
        })
    }

    fn send(&self, cmd: PreviewCommand) -> Result<()> {
        self.tx.send(cmd).map_err(|_| Error::other("preview worker has exited"))
    }

    fn worker_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        let _ = self.tx.send(PreviewCommand::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PreviewRenderer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl RenderService for PreviewRenderer {
    fn device(&self) -> &str {
        "CPU"
    }

    fn reset(&mut self, _params: &SessionParams, buffer: &BufferParams) {
        self.ready.clear();
        if self.send(PreviewCommand::Reset { width: buffer.width, height: buffer.height }).is_err() {
            tracing::warn!("preview reset dropped, worker has exited");
        }
    }

    fn sync_scene(&mut self, scene: &Scene) {
        let preview = PreviewScene::from_scene(scene);
        if self.last_scene.as_deref() == Some(&preview) {
            return;
        }
        let preview = Arc::new(preview);
        self.last_scene = Some(preview.clone());
        if self.send(PreviewCommand::Scene(preview)).is_err() {
            tracing::warn!("preview scene sync dropped, worker has exited");
        }
    }

    fn set_sample_target(&mut self, samples: u32) {
        self.target = samples;
    }

    fn start(&mut self) {
        self.ready.clear();
    }

    fn draw(&mut self) -> Result<()> {
        self.send(PreviewCommand::Render { target: self.target })
    }

    fn wait(&mut self) -> Result<Duration> {
        loop {
            if let Some(d) = self.ready.wait_into_timeout(&mut self.pixels, WAIT_POLL) {
                return Ok(d);
            }
            if !self.worker_alive() {
                return Err(Error::other("preview worker has exited"));
            }
        }
    }

    fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Accumulation state owned by the worker thread.
struct Accumulator {
    width: u32,
    height: u32,
    sum: Vec<[f32; 4]>,
    samples: u32,
}

impl Accumulator {
    fn new() -> Self {
        Self { width: 0, height: 0, sum: Vec::new(), samples: 0 }
    }

    fn reset(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.sum.clear();
        self.sum.resize(width as usize * height as usize, [0.0; 4]);
        self.samples = 0;
    }

    /// Add one jittered sample. Returns `false` when there is no buffer to
    /// accumulate into.
    fn add_sample(&mut self, scene: &PreviewScene) -> bool {
        let (w, h) = (self.width as usize, self.height as usize);
        if w == 0 || h == 0 {
            return false;
        }
        let (jx, jy) = (radical_inverse(self.samples + 1, 2), radical_inverse(self.samples + 1, 3));
        self.sum.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let v = (y as f32 + jy) / h as f32;
            for (x, px) in row.iter_mut().enumerate() {
                let u = (x as f32 + jx) / w as f32;
                let c = scene.shade(u, v);
                px[0] += c.x;
                px[1] += c.y;
                px[2] += c.z;
                px[3] += 1.0;
            }
        });
        self.samples += 1;
        true
    }

    /// Average into RGBA half texels.
    fn resolve(&self) -> Vec<f16> {
        let scale = if self.samples > 0 { 1.0 / self.samples as f32 } else { 0.0 };
        self.sum
            .par_iter()
            .flat_map_iter(|px| px.map(|c| f16::from_f32(c * scale)))
            .collect()
    }
}

/// Van der Corput sequence in `base`.
fn radical_inverse(mut i: u32, base: u32) -> f32 {
    let inv = 1.0 / base as f32;
    let mut f = inv;
    let mut r = 0.0;
    while i > 0 {
        r += f * (i % base) as f32;
        i /= base;
        f *= inv;
    }
    r
}

fn worker_loop(pool: rayon::ThreadPool, rx: Receiver<PreviewCommand>, ready: Arc<FrameReady>) {
    let mut acc = Accumulator::new();
    let mut scene: Option<Arc<PreviewScene>> = None;

    while let Ok(cmd) = rx.recv() {
        match cmd {
            PreviewCommand::Reset { width, height } => acc.reset(width, height),
            PreviewCommand::Scene(s) => {
                // Scene changes always come with a reset from the session side.
                scene = Some(s);
            }
            PreviewCommand::Render { target } => {
                let start = Instant::now();
                if let Some(scene) = scene.as_deref() {
                    pool.install(|| {
                        while acc.samples < target && acc.add_sample(scene) {}
                    });
                }
                let texels = pool.install(|| acc.resolve());
                ready.publish(bytemuck::cast_slice(&texels), start.elapsed());
            }
            PreviewCommand::Stop => break,
        }
    }
    tracing::debug!("preview worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeRegistry;

    fn render(svc: &mut PreviewRenderer, scene: &Scene, w: u32, h: u32, target: u32) -> Vec<u8> {
        svc.reset(&SessionParams::default(), &BufferParams::new(w, h));
        svc.sync_scene(scene);
        svc.set_sample_target(target);
        svc.start();
        svc.draw().unwrap();
        svc.wait().unwrap();
        svc.pixels().to_vec()
    }

    #[test]
    fn test_radical_inverse() {
        assert_eq!(radical_inverse(1, 2), 0.5);
        assert_eq!(radical_inverse(2, 2), 0.25);
        assert!((radical_inverse(1, 3) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_renders_half_rgba() {
        let reg = NodeRegistry::with_builtins();
        let scene = Scene::new(&reg).unwrap();
        let mut svc = PreviewRenderer::spawn(2).unwrap();
        let px = render(&mut svc, &scene, 4, 3, 2);
        assert_eq!(px.len(), 4 * 3 * 8);
        // Alpha is the sample coverage, 1.0 after averaging.
        assert_eq!(f16::from_le_bytes([px[6], px[7]]).to_f32(), 1.0);
    }

    #[test]
    fn test_background_drives_colour() {
        let reg = NodeRegistry::with_builtins();
        let scene = Scene::new(&reg).unwrap();
        let preview = PreviewScene::from_scene(&scene);
        let c = preview.shade(0.5, 0.5);
        let bg = scene.background_color();
        assert!((c - (bg * (0.6 + 0.4 * 0.5) + Vec3::splat(0.025))).length() < 0.2);
    }

    #[test]
    fn test_empty_buffer_still_publishes() {
        let reg = NodeRegistry::with_builtins();
        let scene = Scene::new(&reg).unwrap();
        let mut svc = PreviewRenderer::spawn(1).unwrap();
        assert!(render(&mut svc, &scene, 0, 0, 1).is_empty());
        // A second step on the same empty buffer must not spin either.
        assert!(render(&mut svc, &scene, 0, 0, 4).is_empty());
    }

    #[test]
    fn test_empty_accumulator_refuses_samples() {
        let reg = NodeRegistry::with_builtins();
        let scene = PreviewScene::from_scene(&Scene::new(&reg).unwrap());
        let mut acc = Accumulator::new();
        assert!(!acc.add_sample(&scene));
        assert_eq!(acc.samples, 0);
        acc.reset(2, 1);
        assert!(acc.add_sample(&scene));
        assert_eq!(acc.samples, 1);
    }
}
