//! In-process byte pipe with the same blocking contract as a stream socket.

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};

use super::{Endpoint, Tag, Transport};
use crate::util::{Error, Result};

/// One end of an in-memory pipe. Created in pairs by [`MemoryTransport::pair`].
///
/// Chunks sent by the peer are buffered and handed out byte-exact, so frame
/// boundaries on the two sides need not line up.
pub struct MemoryTransport {
    tx: Option<Sender<Vec<u8>>>,
    rx: Option<Receiver<Vec<u8>>>,
    pending: VecDeque<u8>,
    faulted: bool,
}

impl MemoryTransport {
    /// Two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = channel();
        let (b_tx, a_rx) = channel();
        (Self::from_channels(a_tx, a_rx), Self::from_channels(b_tx, b_rx))
    }

    fn from_channels(tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>) -> Self {
        Self {
            tx: Some(tx),
            rx: Some(rx),
            pending: VecDeque::new(),
            faulted: false,
        }
    }

    fn fault(&mut self, op: &str) -> Error {
        if !self.faulted {
            tracing::warn!(op, "memory transport peer gone");
        }
        self.faulted = true;
        Error::TransportFaulted
    }
}

impl Transport for MemoryTransport {
    /// A pipe cannot be re-established; this only clears the fault while
    /// the pipe is still open.
    fn connect(&mut self, _endpoint: &Endpoint) -> Result<()> {
        if self.tx.is_none() || self.rx.is_none() {
            return Err(Error::TransportFaulted);
        }
        self.faulted = false;
        Ok(())
    }

    fn close_local(&mut self) {}

    fn close_remote(&mut self) {
        self.tx = None;
        self.rx = None;
        self.pending.clear();
    }

    fn send_frame(&mut self, bytes: &[u8], _tag: Tag) -> Result<()> {
        if self.faulted {
            return Err(Error::TransportFaulted);
        }
        let sent = self.tx.as_ref().is_some_and(|tx| tx.send(bytes.to_vec()).is_ok());
        if sent {
            Ok(())
        } else {
            Err(self.fault("send"))
        }
    }

    fn receive_frame(&mut self, buf: &mut [u8], _tag: Tag) -> Result<()> {
        if self.faulted {
            return Err(Error::TransportFaulted);
        }
        while self.pending.len() < buf.len() {
            let chunk = self.rx.as_ref().and_then(|rx| rx.recv().ok());
            match chunk {
                Some(chunk) => self.pending.extend(chunk),
                None => return Err(self.fault("receive")),
            }
        }
        let n = buf.len();
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(())
    }

    fn is_faulted(&self) -> bool {
        self.faulted
    }
}
