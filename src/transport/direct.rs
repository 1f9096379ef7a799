//! Single TCP link; the tag is ignored.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use super::{Endpoint, Tag, Transport};
use crate::util::{Error, Result};

/// TCP transport to exactly one peer.
///
/// As a server it keeps its listening socket across reconnects, so a peer
/// that drops can simply connect again.
#[derive(Debug, Default)]
pub struct DirectTransport {
    listener: Option<TcpListener>,
    stream: Option<TcpStream>,
    faulted: bool,
}

impl DirectTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a listening socket up front (port 0 picks an ephemeral port).
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener: Some(listener), ..Self::default() })
    }

    /// Address of the listening socket, if bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    fn fault(&mut self, op: &str, e: std::io::Error) -> Error {
        if !self.faulted {
            tracing::warn!(op, error = %e, "transport fault");
        }
        self.faulted = true;
        Error::TransportFaulted
    }

    fn accept(&mut self, addr: SocketAddr) -> std::io::Result<TcpStream> {
        let listener = match self.listener.take() {
            Some(l) => l,
            None => {
                let l = TcpListener::bind(addr)?;
                tracing::info!(addr = %l.local_addr()?, "listening");
                l
            }
        };
        let accepted = listener.accept();
        self.listener = Some(listener);
        let (stream, peer) = accepted?;
        tracing::info!(%peer, "peer connected");
        Ok(stream)
    }
}

impl Transport for DirectTransport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.close_remote();
        let stream = match endpoint {
            Endpoint::Listen(addr) => self.accept(*addr),
            Endpoint::Connect(addr) => TcpStream::connect(addr.as_str()),
        };
        let stream = stream.map_err(|e| self.fault("connect", e))?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "set_nodelay failed");
        }
        self.stream = Some(stream);
        self.faulted = false;
        Ok(())
    }

    fn close_local(&mut self) {
        self.listener = None;
    }

    fn close_remote(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn send_frame(&mut self, bytes: &[u8], _tag: Tag) -> Result<()> {
        if self.faulted {
            return Err(Error::TransportFaulted);
        }
        let Some(stream) = self.stream.as_mut() else {
            self.faulted = true;
            return Err(Error::TransportFaulted);
        };
        match stream.write_all(bytes) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fault("send", e)),
        }
    }

    fn receive_frame(&mut self, buf: &mut [u8], _tag: Tag) -> Result<()> {
        if self.faulted {
            return Err(Error::TransportFaulted);
        }
        let Some(stream) = self.stream.as_mut() else {
            self.faulted = true;
            return Err(Error::TransportFaulted);
        };
        match stream.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fault("receive", e)),
        }
    }

    fn is_faulted(&self) -> bool {
        self.faulted
    }
}
