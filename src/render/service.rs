//! Render service seam: the path tracer consumed as "render one more
//! sample step and hand back pixels".

use std::time::Duration;

use crate::scene::Scene;
use crate::util::{Error, Result};

use super::preview::PreviewRenderer;

/// Session-wide settings passed on every reset.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionParams {
    pub device: String,
    /// Samples rendered per step; also the numerator of the fps estimate.
    pub samples: u32,
    /// Worker threads, 0 for automatic.
    pub threads: usize,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            device: "CPU".to_string(),
            samples: 1,
            threads: 0,
        }
    }
}

/// Output buffer layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferParams {
    pub width: u32,
    pub height: u32,
}

impl BufferParams {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A compute device a service can run on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub description: String,
}

/// Progressive renderer driven one step at a time.
///
/// Call order per step: [`reset`](Self::reset) when accumulation restarts,
/// [`sync_scene`](Self::sync_scene) after scene edits,
/// [`set_sample_target`](Self::set_sample_target), [`start`](Self::start),
/// [`draw`](Self::draw), then [`wait`](Self::wait) before reading
/// [`pixels`](Self::pixels).
pub trait RenderService: Send {
    fn device(&self) -> &str;

    /// Drop accumulation and size buffers for `buffer`.
    fn reset(&mut self, params: &SessionParams, buffer: &BufferParams);

    /// Pick up scene state the renderer depends on.
    fn sync_scene(&mut self, scene: &Scene);

    /// Total accumulated samples to reach.
    fn set_sample_target(&mut self, samples: u32);

    fn start(&mut self);

    /// Kick off the current step.
    fn draw(&mut self) -> Result<()>;

    /// Block until the step's pixels are available. Returns its duration.
    fn wait(&mut self) -> Result<Duration>;

    /// RGBA half-float pixels of the last finished step.
    fn pixels(&self) -> &[u8];
}

/// Devices this build can render on.
pub fn available_devices() -> Vec<DeviceInfo> {
    vec![DeviceInfo {
        name: "CPU".to_string(),
        description: format!("preview renderer, {} threads", rayon::current_num_threads()),
    }]
}

/// Find a device by case-insensitive name.
pub fn find_device(name: &str) -> Result<DeviceInfo> {
    available_devices()
        .into_iter()
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::UnknownDevice(name.to_string()))
}

/// Create a service for `params.device`.
pub fn create_service(params: &SessionParams) -> Result<Box<dyn RenderService>> {
    let device = find_device(&params.device)?;
    tracing::debug!(device = %device.name, "creating render service");
    Ok(Box::new(PreviewRenderer::spawn(params.threads)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lookup() {
        assert_eq!(find_device("cpu").unwrap().name, "CPU");
        assert!(matches!(find_device("OPTIX"), Err(Error::UnknownDevice(_))));
        let params = SessionParams { device: "CUDA".into(), ..Default::default() };
        assert!(create_service(&params).is_err());
    }
}
