//! Control records exchanged with the front-end.
//!
//! Per cycle the front-end sends an [`UpdateRecord`] and a length-prefixed
//! material payload; the bridge answers with the pixel buffer and a
//! [`TelemetryRecord`]. Records are `#[repr(C)]` plain data compared and
//! sent as raw little-endian bytes.

use bytemuck::{Pod, Zeroable};

use crate::transport::{Tag, Transport};
use crate::util::{Error, Result};

/// Bytes per output texel (RGBA half float).
pub const PIXEL_SIZE: usize = 8;

/// `view_perspective` value selecting an orthographic camera.
pub const VIEW_ORTHOGRAPHIC: i32 = 1;

/// Viewport camera as sent by the front-end.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CameraSnapshot {
    /// Row-major 3x4 inverse view matrix; `view[3]` is the x translation.
    pub view: [f32; 12],
    /// Field of view, or the orthographic extent.
    pub lens: f32,
    pub clip_start: f32,
    pub clip_end: f32,
    pub view_perspective: i32,
    pub width: i32,
    pub height: i32,
}

/// One control update.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UpdateRecord {
    pub camera: CameraSnapshot,
    /// Target (animation frame) this update addresses.
    pub frame: i32,
    /// Non-zero ends the current session.
    pub reset: i32,
}

/// Status sent after every frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TelemetryRecord {
    pub world_bounds_lower: [f32; 3],
    pub world_bounds_upper: [f32; 3],
    pub scalars_range: [f32; 2],
    pub fps: f32,
    pub samples: i32,
}

const _: () = assert!(std::mem::size_of::<CameraSnapshot>() == 72);
const _: () = assert!(std::mem::size_of::<UpdateRecord>() == 80);
const _: () = assert!(std::mem::size_of::<TelemetryRecord>() == 40);

impl UpdateRecord {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn receive(t: &mut dyn Transport, tag: Tag) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        t.receive_frame(&mut buf, tag)?;
        Ok(bytemuck::pod_read_unaligned(&buf))
    }

    pub fn send(&self, t: &mut dyn Transport, tag: Tag) -> Result<()> {
        t.send_frame(self.as_bytes(), tag)
    }

    /// Width and height, or a protocol error when either is zero or negative.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let (w, h) = (self.camera.width, self.camera.height);
        if w <= 0 || h <= 0 {
            return Err(Error::protocol(format!("bad dimensions {w}x{h}")));
        }
        Ok((w as u32, h as u32))
    }
}

impl TelemetryRecord {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn send(&self, t: &mut dyn Transport, tag: Tag) -> Result<()> {
        t.send_frame(bytemuck::bytes_of(self), tag)
    }

    pub fn receive(t: &mut dyn Transport, tag: Tag) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        t.receive_frame(&mut buf, tag)?;
        Ok(bytemuck::pod_read_unaligned(&buf))
    }
}

/// Largest material payload accepted from a peer.
pub const MAX_MATERIAL_LEN: usize = 64 << 20;

/// Read an `i32` length and that many payload bytes.
pub fn receive_material(t: &mut dyn Transport, tag: Tag) -> Result<Vec<u8>> {
    let mut len = [0u8; 4];
    t.receive_frame(&mut len, tag)?;
    let len = i32::from_le_bytes(len);
    let len = usize::try_from(len)
        .ok()
        .filter(|n| *n <= MAX_MATERIAL_LEN)
        .ok_or_else(|| Error::protocol(format!("material length {len} out of range")))?;
    let mut payload = vec![0u8; len];
    if len > 0 {
        t.receive_frame(&mut payload, tag)?;
    }
    Ok(payload)
}

/// Write a length-prefixed material payload.
pub fn send_material(t: &mut dyn Transport, payload: &[u8], tag: Tag) -> Result<()> {
    let len = i32::try_from(payload.len()).map_err(|_| Error::protocol("material payload too large"))?;
    t.send_frame(&len.to_le_bytes(), tag)?;
    if !payload.is_empty() {
        t.send_frame(payload, tag)?;
    }
    Ok(())
}

/// Size of the pixel buffer for a `width` x `height` frame.
#[inline]
pub fn pixel_buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * PIXEL_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_translation_is_byte_12() {
        let mut rec = UpdateRecord::default();
        rec.camera.view[3] = 1.0;
        let bytes = rec.as_bytes();
        assert_eq!(&bytes[12..16], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_records_over_pipe() {
        let (mut a, mut b) = MemoryTransport::pair();
        let mut rec = UpdateRecord::default();
        rec.camera.width = 64;
        rec.camera.height = 32;
        rec.frame = 2;
        rec.send(&mut a, 0).unwrap();
        send_material(&mut a, b"abc", 0).unwrap();
        send_material(&mut a, b"", 0).unwrap();

        let got = UpdateRecord::receive(&mut b, 0).unwrap();
        assert_eq!(got, rec);
        assert_eq!(got.dimensions().unwrap(), (64, 32));
        assert_eq!(receive_material(&mut b, 0).unwrap(), b"abc");
        assert!(receive_material(&mut b, 0).unwrap().is_empty());
    }

    #[test]
    fn test_protocol_violations() {
        let rec = UpdateRecord::default();
        assert!(matches!(rec.dimensions(), Err(Error::Protocol(_))));

        let (mut a, mut b) = MemoryTransport::pair();
        a.send_frame(&(-5i32).to_le_bytes(), 0).unwrap();
        assert!(matches!(receive_material(&mut b, 0), Err(Error::Protocol(_))));
        // Rejected from the length alone, before any payload arrives.
        a.send_frame(&i32::MAX.to_le_bytes(), 0).unwrap();
        assert!(matches!(receive_material(&mut b, 0), Err(Error::Protocol(_))));
    }
}
