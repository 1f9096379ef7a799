//! Scene camera derived from a viewport snapshot.

use super::protocol::{CameraSnapshot, VIEW_ORTHOGRAPHIC};
use crate::graph::SocketValue;
use crate::scene::Scene;
use crate::util::{Result, Transform, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
    Perspective = 0,
    Orthographic = 1,
}

/// View plane extents in camera space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewPlane {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

/// Camera parameters recomputed on every camera change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    pub matrix: Transform,
    pub projection: Projection,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub width: u32,
    pub height: u32,
    pub viewplane: ViewPlane,
}

impl CameraParams {
    /// The matrix is the snapshot's view with scale cleared and z flipped;
    /// the view plane fits the longer image side to `[-aspect, aspect]`.
    pub fn from_snapshot(cam: &CameraSnapshot, width: u32, height: u32) -> Self {
        let matrix = (Transform::from_rows(&cam.view) * Transform::scale(Vec3::new(1.0, 1.0, -1.0))).clear_scale();
        let projection = if cam.view_perspective == VIEW_ORTHOGRAPHIC {
            Projection::Orthographic
        } else {
            Projection::Perspective
        };

        let (w, h) = (width as f32, height as f32);
        let (mut x, mut y) = if w > h { (w / h, 1.0) } else { (1.0, h / w) };
        if projection == Projection::Orthographic {
            let ortho_scale = cam.lens / 2.0;
            x *= ortho_scale;
            y *= ortho_scale;
        }

        Self {
            matrix,
            projection,
            fov: cam.lens,
            near: cam.clip_start,
            far: cam.clip_end,
            width,
            height,
            viewplane: ViewPlane { left: -x, right: x, bottom: -y, top: y },
        }
    }

    /// Write these parameters into the scene camera node.
    pub fn apply(&self, scene: &mut Scene) -> Result<()> {
        let id = scene.camera;
        let Some(cam) = scene.get_mut(id) else {
            return Ok(());
        };
        let node = &mut cam.node;
        node.set("matrix", SocketValue::Transform(self.matrix))?;
        node.set("camera_type", SocketValue::Enum(self.projection as i32))?;
        node.set("fov", SocketValue::Float(self.fov))?;
        node.set("nearclip", SocketValue::Float(self.near))?;
        node.set("farclip", SocketValue::Float(self.far))?;
        node.set("full_width", SocketValue::Int(self.width as i32))?;
        node.set("full_height", SocketValue::Int(self.height as i32))?;
        node.set("viewplane_left", SocketValue::Float(self.viewplane.left))?;
        node.set("viewplane_right", SocketValue::Float(self.viewplane.right))?;
        node.set("viewplane_bottom", SocketValue::Float(self.viewplane.bottom))?;
        node.set("viewplane_top", SocketValue::Float(self.viewplane.top))?;
        Ok(())
    }

    /// Camera-space ray direction through normalized image coordinates
    /// `(u, v)` in `[0, 1]`, before the camera matrix is applied.
    pub fn ray_direction(&self, u: f32, v: f32) -> Vec3 {
        let vp = &self.viewplane;
        let px = vp.left + (vp.right - vp.left) * u;
        let py = vp.bottom + (vp.top - vp.bottom) * v;
        match self.projection {
            Projection::Orthographic => Vec3::new(0.0, 0.0, 1.0),
            Projection::Perspective => {
                let scale = (self.fov * 0.5).tan();
                Vec3::new(px * scale, py * scale, 1.0).normalize()
            }
        }
    }
}
