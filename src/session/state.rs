//! Per-target session state and the accumulation reset policy.
//!
//! A [`RenderTarget`] owns its scene, its render service and the last
//! camera and material bytes it applied. Every incoming update is compared
//! byte for byte against those; any difference drops the sample counter to
//! zero so the next step restarts accumulation.

use std::time::Duration;

use super::camera::CameraParams;
use super::protocol::{pixel_buffer_len, TelemetryRecord, UpdateRecord};
use crate::render::{BufferParams, RenderService, SessionParams};
use crate::scene::Scene;
use crate::util::{BoundBox, Result};
use crate::volume::VoxelPayload;
use crate::wire::{apply_material, apply_volume, SceneDecoder};

/// Where a target is in its update/render/stream cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TargetState {
    #[default]
    Idle,
    CameraDirty,
    MaterialDirty,
    Rendering,
    Streaming,
}

/// One independently rendered image.
pub struct RenderTarget {
    id: usize,
    scene: Scene,
    decoder: SceneDecoder,
    service: Box<dyn RenderService>,
    params: SessionParams,
    state: TargetState,
    /// Steps accumulated since the last reset.
    samples: u32,
    width: u32,
    height: u32,
    /// Last applied update, frame field zeroed.
    last_update: Option<UpdateRecord>,
    last_material: Vec<u8>,
    camera: Option<CameraParams>,
    bounds: Option<BoundBox>,
    scalars_range: [f32; 2],
    reset_pending: bool,
    scene_dirty: bool,
    camera_recomputes: u64,
    last_step: Duration,
}

impl RenderTarget {
    pub fn new(
        id: usize,
        scene: Scene,
        decoder: SceneDecoder,
        service: Box<dyn RenderService>,
        params: SessionParams,
    ) -> Self {
        Self {
            id,
            scene,
            decoder,
            service,
            params,
            state: TargetState::Idle,
            samples: 0,
            width: 0,
            height: 0,
            last_update: None,
            last_material: Vec::new(),
            camera: None,
            bounds: None,
            scalars_range: [0.0; 2],
            reset_pending: false,
            scene_dirty: true,
            camera_recomputes: 0,
            last_step: Duration::ZERO,
        }
    }

    /// Apply the camera part of an update.
    ///
    /// Returns `true` when the record differs from the stored one (ignoring
    /// the frame field) or a reset was requested; the sample counter is then
    /// zero and the camera has been recomputed. Zero dimensions are a
    /// protocol error.
    pub fn sync_camera(&mut self, update: &UpdateRecord) -> Result<bool> {
        let mut update = *update;
        update.frame = 0;
        let changed = self.last_update.as_ref().map(UpdateRecord::as_bytes) != Some(update.as_bytes());
        if !changed && !self.reset_pending {
            return Ok(false);
        }

        let (width, height) = update.dimensions()?;
        self.last_update = Some(update);
        self.reset_pending = false;
        self.samples = 0;
        self.state = TargetState::CameraDirty;

        if (width, height) != (self.width, self.height) {
            tracing::debug!(target_id = self.id, width, height, "resolution changed");
            self.width = width;
            self.height = height;
        }

        let camera = CameraParams::from_snapshot(&update.camera, width, height);
        camera.apply(&mut self.scene)?;
        self.camera = Some(camera);
        self.camera_recomputes += 1;
        self.scene_dirty = true;
        Ok(true)
    }

    /// Apply a material-edit payload. Empty or byte-identical payloads are
    /// ignored and return `false`.
    ///
    /// A payload that fails to decode still counts as a change; the fault is
    /// logged and the scene keeps whatever was applied.
    pub fn sync_material(&mut self, payload: &[u8]) -> bool {
        if payload.is_empty() || payload == self.last_material.as_slice() {
            return false;
        }
        self.last_material.clear();
        self.last_material.extend_from_slice(payload);
        self.samples = 0;
        self.state = TargetState::MaterialDirty;
        self.scene_dirty = true;

        if let Err(e) = apply_material(&mut self.decoder, &mut self.scene, payload) {
            tracing::warn!(target_id = self.id, error = %e, "material payload rejected");
        }
        true
    }

    /// Swap a volume attribute's voxels and restart accumulation if found.
    pub fn replace_volume(&mut self, geometry: &str, attribute: &str, payload: VoxelPayload) -> bool {
        if !apply_volume(&mut self.scene, geometry, attribute, payload) {
            return false;
        }
        self.samples = 0;
        self.scene_dirty = true;
        true
    }

    /// Force the next camera sync to count as a change.
    pub fn request_reset(&mut self) {
        self.reset_pending = true;
    }

    /// Render one more sample step and block until its pixels are ready.
    ///
    /// The service is reset whenever the counter is zero, so every camera,
    /// material or volume change restarts accumulation here.
    ///
    /// A target that has not seen a camera yet has no buffer; it only
    /// advances its counter so it keeps pace with the rest of the group.
    pub fn render_step(&mut self) -> Result<Duration> {
        self.state = TargetState::Rendering;
        if self.width == 0 || self.height == 0 {
            self.samples = self.samples.saturating_add(1);
            self.last_step = Duration::ZERO;
            self.state = TargetState::Streaming;
            return Ok(self.last_step);
        }
        if self.samples == 0 {
            self.service.reset(&self.params, &BufferParams::new(self.width, self.height));
        }
        if self.scene_dirty {
            self.service.sync_scene(&self.scene);
            self.scene_dirty = false;
        }
        self.samples = self.samples.saturating_add(1);
        self.service.set_sample_target(self.total_samples());
        self.service.start();
        self.service.draw()?;
        self.last_step = self.service.wait()?;
        self.state = TargetState::Streaming;
        tracing::trace!(target_id = self.id, samples = self.samples, step = ?self.last_step, "step done");
        Ok(self.last_step)
    }

    /// Pixels of the last step. Exactly `width * height` texels once a
    /// step has run.
    pub fn pixels(&self) -> &[u8] {
        let pixels = self.service.pixels();
        let expected = pixel_buffer_len(self.width, self.height);
        if pixels.len() != expected {
            tracing::warn!(target_id = self.id, got = pixels.len(), expected, "pixel buffer size mismatch");
        }
        pixels
    }

    /// Status record for the last step. World bounds are computed once.
    pub fn telemetry(&mut self) -> TelemetryRecord {
        let scene = &self.scene;
        let bounds = *self.bounds.get_or_insert_with(|| scene.world_bounds());
        let (lower, upper) = if bounds.is_empty() {
            ([0.0; 3], [0.0; 3])
        } else {
            (bounds.min.to_array(), bounds.max.to_array())
        };
        let secs = self.last_step.as_secs_f32();
        TelemetryRecord {
            world_bounds_lower: lower,
            world_bounds_upper: upper,
            scalars_range: self.scalars_range,
            fps: if secs > 0.0 { self.params.samples as f32 / secs } else { 0.0 },
            samples: i32::try_from(self.total_samples()).unwrap_or(i32::MAX),
        }
    }

    /// Service samples behind the current image.
    fn total_samples(&self) -> u32 {
        self.samples.saturating_mul(self.params.samples.max(1))
    }

    /// Mark the cycle complete after pixels and telemetry went out.
    pub fn streamed(&mut self) {
        self.state = TargetState::Idle;
    }

    pub fn set_scalars_range(&mut self, min: f32, max: f32) {
        self.scalars_range = [min, max];
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn camera(&self) -> Option<&CameraParams> {
        self.camera.as_ref()
    }

    pub fn camera_recomputes(&self) -> u64 {
        self.camera_recomputes
    }

    pub fn last_material(&self) -> &[u8] {
        &self.last_material
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        self.scene_dirty = true;
        &mut self.scene
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn device(&self) -> &str {
        self.service.device()
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("samples", &self.samples)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::graph::NodeRegistry;
    use crate::render::PreviewRenderer;
    use crate::util::Error;
    use crate::wire::encode_shader_payload;

    fn target() -> RenderTarget {
        let reg = Arc::new(NodeRegistry::with_builtins());
        let scene = Scene::new(&reg).unwrap();
        let decoder = SceneDecoder::new(reg);
        let service = Box::new(PreviewRenderer::spawn(1).unwrap());
        RenderTarget::new(0, scene, decoder, service, SessionParams::default())
    }

    fn update(width: i32, height: i32) -> UpdateRecord {
        let mut u = UpdateRecord::default();
        u.camera.view[0] = 1.0;
        u.camera.view[5] = 1.0;
        u.camera.view[10] = 1.0;
        u.camera.lens = 0.8;
        u.camera.width = width;
        u.camera.height = height;
        u
    }

    #[test]
    fn test_first_update_resets() {
        let mut t = target();
        assert!(t.sync_camera(&update(8, 4)).unwrap());
        assert_eq!(t.state(), TargetState::CameraDirty);
        assert_eq!(t.dimensions(), (8, 4));
        assert!(!t.sync_camera(&update(8, 4)).unwrap());
        assert_eq!(t.camera_recomputes(), 1);
    }

    #[test]
    fn test_frame_field_ignored() {
        let mut t = target();
        t.sync_camera(&update(8, 4)).unwrap();
        let mut u = update(8, 4);
        u.frame = 3;
        assert!(!t.sync_camera(&u).unwrap());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut t = target();
        assert!(matches!(t.sync_camera(&update(0, 4)), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_request_reset_forces_change() {
        let mut t = target();
        t.sync_camera(&update(4, 4)).unwrap();
        t.render_step().unwrap();
        t.request_reset();
        assert!(t.sync_camera(&update(4, 4)).unwrap());
        assert_eq!(t.samples(), 0);
    }

    #[test]
    fn test_steps_accumulate_and_telemetry() {
        let mut t = target();
        t.sync_camera(&update(4, 2)).unwrap();
        t.render_step().unwrap();
        t.render_step().unwrap();
        assert_eq!(t.samples(), 2);
        assert_eq!(t.state(), TargetState::Streaming);
        assert_eq!(t.pixels().len(), pixel_buffer_len(4, 2));
        let tel = t.telemetry();
        assert_eq!(tel.samples, 2);
        assert!(tel.fps >= 0.0);
        t.streamed();
        assert_eq!(t.state(), TargetState::Idle);
    }

    #[test]
    fn test_step_without_camera_only_counts() {
        let mut t = target();
        assert_eq!(t.render_step().unwrap(), Duration::ZERO);
        t.render_step().unwrap();
        assert_eq!(t.samples(), 2);
        assert!(t.pixels().is_empty());
        assert_eq!(t.telemetry().samples, 2);

        // The first camera restarts accumulation on a real buffer.
        assert!(t.sync_camera(&update(2, 2)).unwrap());
        t.render_step().unwrap();
        assert_eq!(t.samples(), 1);
        assert_eq!(t.pixels().len(), pixel_buffer_len(2, 2));
    }

    #[test]
    fn test_sample_total_saturates() {
        let reg = Arc::new(NodeRegistry::with_builtins());
        let params = SessionParams { samples: u32::MAX, ..SessionParams::default() };
        let service = Box::new(PreviewRenderer::spawn(1).unwrap());
        let mut t = RenderTarget::new(0, Scene::new(&reg).unwrap(), SceneDecoder::new(reg), service, params);
        t.render_step().unwrap();
        t.render_step().unwrap();
        assert_eq!(t.total_samples(), u32::MAX);
        assert_eq!(t.telemetry().samples, i32::MAX);
    }

    #[test]
    fn test_material_diff() {
        let mut t = target();
        t.sync_camera(&update(2, 2)).unwrap();
        t.render_step().unwrap();

        let shader = t.scene().find_shader("default_surface").unwrap();
        let payload = encode_shader_payload(t.scene(), shader).unwrap();
        assert!(!t.sync_material(&[]));
        assert_eq!(t.samples(), 1);
        assert!(t.sync_material(&payload));
        assert_eq!(t.samples(), 0);
        assert_eq!(t.state(), TargetState::MaterialDirty);

        t.render_step().unwrap();
        assert!(!t.sync_material(&payload));
        assert_eq!(t.samples(), 1);
    }
}
