//! Point-to-point message channel to the controlling front-end.
//!
//! - [`DirectTransport`] - one TCP link to one peer
//! - [`MemoryTransport`] - in-process pipe pair
//! - [`RoutedTransport`] - rank-aware wrapper over a [`Collective`] group
//!
//! Every transport latches a fault on the first I/O error or peer
//! disconnect. While faulted, sends and receives fail fast with
//! [`Error::TransportFaulted`](crate::util::Error::TransportFaulted) without
//! touching the link; [`Transport::connect`] clears the fault.

mod collective;
mod direct;
mod memory;
mod routed;

pub use collective::*;
pub use direct::*;
pub use memory::*;
pub use routed::*;

use std::fmt;
use std::net::SocketAddr;

use crate::util::Result;

/// Logical stream id multiplexed over one link (the animation frame).
pub type Tag = i32;

/// Where a transport connects to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Bind (once) and accept a single peer.
    Listen(SocketAddr),
    /// Connect out to `host:port`.
    Connect(String),
}

impl Endpoint {
    /// Listen on all interfaces at `port`.
    pub fn listen_port(port: u16) -> Self {
        Self::Listen(SocketAddr::from(([0, 0, 0, 0], port)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listen(addr) => write!(f, "listen {addr}"),
            Self::Connect(addr) => write!(f, "connect {addr}"),
        }
    }
}

/// Blocking, fault-latching message channel.
pub trait Transport: Send {
    /// Establish the link, clearing any latched fault.
    fn connect(&mut self, endpoint: &Endpoint) -> Result<()>;

    /// Release the local endpoint (listening socket). The next
    /// [`connect`](Self::connect) binds again.
    fn close_local(&mut self);

    /// Drop the link to the peer.
    fn close_remote(&mut self);

    /// Send all of `bytes`. Blocks until written or faulted.
    fn send_frame(&mut self, bytes: &[u8], tag: Tag) -> Result<()>;

    /// Fill all of `buf`. Blocks until read or faulted.
    fn receive_frame(&mut self, buf: &mut [u8], tag: Tag) -> Result<()>;

    fn is_faulted(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        (**self).connect(endpoint)
    }

    fn close_local(&mut self) {
        (**self).close_local()
    }

    fn close_remote(&mut self) {
        (**self).close_remote()
    }

    fn send_frame(&mut self, bytes: &[u8], tag: Tag) -> Result<()> {
        (**self).send_frame(bytes, tag)
    }

    fn receive_frame(&mut self, buf: &mut [u8], tag: Tag) -> Result<()> {
        (**self).receive_frame(buf, tag)
    }

    fn is_faulted(&self) -> bool {
        (**self).is_faulted()
    }
}
