//! Conversion-service relay.
//!
//! A background thread accepts one front-end connection, connects to the
//! conversion server and forwards messages between them. Converted grids are
//! kept here instead of being sent back to the front-end: they land in a
//! [`PendingVolume`] slot the session loop installs into its scenes.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;

use crate::orchestrator::StopSignal;
use crate::util::{Error, Result};
use crate::volume::VoxelPayload;

/// Message types sent by the front-end.
pub mod message {
    pub const STOP: i32 = -1;
    pub const INFO: i32 = 1;
    pub const DATA: i32 = 2;
}

/// Grid file types reported by the conversion server.
pub mod file_type {
    pub const NONE: i32 = 0;
    pub const OPENVDB: i32 = 1;
    pub const NANOVDB: i32 = 2;
}

/// Conversion request forwarded verbatim from front-end to server.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VolumeRequest {
    pub bbox_min: [f32; 3],
    pub bbox_max: [f32; 3],
    pub bbox_dim: i32,
    pub grid_transform: f32,
    pub particle_type: i32,
    pub block_name_id: i32,
    pub extracted_type: i32,
    pub dense_type: i32,
    pub dense_norm: i32,
    pub object_size: f32,
    pub particle_fix_size: f32,
    pub filter_min: f32,
    pub filter_max: f32,
    pub frame: i32,
    pub anim_type: i32,
    pub anim_task_counter: i32,
}

const _: () = assert!(std::mem::size_of::<VolumeRequest>() == 80);

/// Largest converted grid accepted from the server.
pub const MAX_GRID_SIZE: u64 = 1 << 30;
/// Largest data-type list in an info reply.
pub const MAX_INFO_LEN: usize = 1 << 16;

/// A converted grid waiting to be installed.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeUpdate {
    pub payload: VoxelPayload,
    pub min_value: f32,
    pub max_value: f32,
    pub frames: i32,
}

/// Latest-wins slot between the relay thread and the session loop.
#[derive(Debug, Default)]
pub struct PendingVolume {
    slot: Mutex<Option<VolumeUpdate>>,
}

impl PendingVolume {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `update`, replacing one not yet taken.
    pub fn publish(&self, update: VolumeUpdate) {
        if self.slot.lock().replace(update).is_some() {
            tracing::debug!("pending volume replaced before it was applied");
        }
    }

    pub fn take(&self) -> Option<VolumeUpdate> {
        self.slot.lock().take()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Forward one front-end connection until it sends [`message::STOP`] or
/// either side drops.
///
/// `front` is the front-end, `server` the conversion server.
pub fn relay_session(
    front: &mut (impl Read + Write),
    server: &mut (impl Read + Write),
    pending: &PendingVolume,
) -> Result<()> {
    loop {
        let msg = front.read_i32::<LittleEndian>().unwrap_or(message::STOP);
        let msg = match server.write_i32::<LittleEndian>(msg) {
            Ok(()) => msg,
            Err(_) => message::STOP,
        };
        tracing::debug!(msg, "relay message");

        match msg {
            message::STOP => return Ok(()),
            message::INFO => forward_info(front, server)?,
            message::DATA => {
                let update = forward_data(front, server)?;
                tracing::info!(bytes = update.payload.bytes().len(), frames = update.frames, "volume received");
                pending.publish(update);
            }
            other => tracing::warn!(msg = other, "unknown relay message ignored"),
        }
    }
}

fn forward_i32(from: &mut impl Read, to: &mut impl Write) -> io::Result<i32> {
    let v = from.read_i32::<LittleEndian>()?;
    to.write_i32::<LittleEndian>(v)?;
    Ok(v)
}

fn forward_f32(from: &mut impl Read, to: &mut impl Write) -> io::Result<f32> {
    let v = from.read_f32::<LittleEndian>()?;
    to.write_f32::<LittleEndian>(v)?;
    Ok(v)
}

/// Server describes its animation range and data types; front-end acks.
fn forward_info(front: &mut (impl Read + Write), server: &mut (impl Read + Write)) -> Result<()> {
    let anim_type = forward_i32(server, front)?;
    let anim_start = forward_i32(server, front)?;
    let anim_end = forward_i32(server, front)?;
    let len = forward_i32(server, front)?;
    let len = usize::try_from(len)
        .ok()
        .filter(|n| *n <= MAX_INFO_LEN)
        .ok_or_else(|| Error::protocol(format!("info length {len} out of range")))?;
    let mut types = vec![0u8; len];
    server.read_exact(&mut types)?;
    front.write_all(&types)?;
    forward_i32(front, server)?;
    tracing::debug!(anim_type, anim_start, anim_end, "info forwarded");
    Ok(())
}

/// Request goes to the server; the grid stays here and the front-end is
/// told it got nothing.
fn forward_data(front: &mut (impl Read + Write), server: &mut (impl Read + Write)) -> Result<VolumeUpdate> {
    let mut request = VolumeRequest::zeroed();
    front.read_exact(bytemuck::bytes_of_mut(&mut request))?;
    server.write_all(bytemuck::bytes_of(&request))?;
    tracing::debug!(frame = request.frame, dim = request.bbox_dim, "volume requested");

    let kind = server.read_i32::<LittleEndian>()?;
    let size = server.read_u64::<LittleEndian>()?;
    if size > MAX_GRID_SIZE {
        return Err(Error::protocol(format!("grid size {size} exceeds {MAX_GRID_SIZE}")));
    }
    front.write_i32::<LittleEndian>(file_type::NONE)?;
    front.write_u64::<LittleEndian>(0)?;

    let size = usize::try_from(size).map_err(|_| Error::protocol(format!("grid size {size} too large")))?;
    let mut data = vec![0u8; size];
    server.read_exact(&mut data)?;

    let min_value = forward_f32(server, front)?;
    let max_value = forward_f32(server, front)?;
    let frames = forward_i32(server, front)?;
    forward_i32(front, server)?;

    let payload = match kind {
        file_type::OPENVDB => VoxelPayload::SparseStream { data, grid: String::new() },
        _ => VoxelPayload::Device(data),
    };
    Ok(VolumeUpdate { payload, min_value, max_value, frames })
}

/// Where the relay listens and what it connects to.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub listen: SocketAddr,
    pub server: String,
}

/// Handle to the relay thread.
pub struct Relay {
    stop: StopSignal,
    listen: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl Relay {
    /// Bind the front-end port and start forwarding in the background.
    pub fn spawn(config: RelayConfig, pending: Arc<PendingVolume>) -> Result<Self> {
        let listener = TcpListener::bind(config.listen)?;
        let listen = listener.local_addr()?;
        tracing::info!(%listen, server = %config.server, "relay listening");
        let stop = StopSignal::new();
        let handle = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("relay".into())
                .spawn(move || relay_loop(listener, config.server, pending, stop))?
        };
        Ok(Self { stop, listen, handle: Some(handle) })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listen
    }

    /// Ask the thread to exit. A session in progress ends when either
    /// side disconnects; this does not wait for that.
    pub fn stop(&mut self) {
        self.stop.request_stop();
        // Wake a pending accept.
        let _ = TcpStream::connect(self.listen);
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.stop();
    }
}

fn relay_loop(listener: TcpListener, server: String, pending: Arc<PendingVolume>, stop: StopSignal) {
    while !stop.is_stopped() {
        let (mut front, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "relay accept failed");
                thread::sleep(Duration::from_secs(1));
                continue;
            }
        };
        if stop.is_stopped() {
            break;
        }
        tracing::info!(%peer, "relay front-end connected");

        let mut conv = loop {
            match TcpStream::connect(&server) {
                Ok(s) => break Some(s),
                Err(e) if !stop.is_stopped() => {
                    tracing::warn!(server = %server, error = %e, "conversion server unreachable, retrying");
                    thread::sleep(Duration::from_secs(1));
                }
                Err(_) => break None,
            }
        };
        let Some(conv) = conv.as_mut() else { break };

        if let Err(e) = relay_session(&mut front, conv, &pending) {
            tracing::warn!(error = %e, "relay session ended");
        }
    }
    tracing::debug!("relay stopped");
}
