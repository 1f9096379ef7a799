//! Rank-aware transport: only rank 0 owns the physical link.
//!
//! Every rank runs the same call sequence. Receives are read by rank 0 and
//! broadcast. A send goes out from rank 0, funneled point-to-point from the
//! rank that owns the tag when that is not rank 0. After each operation
//! rank 0 broadcasts a status byte so all ranks latch faults together.

use super::{Collective, Endpoint, Tag, Transport};
use crate::distributed::Topology;
use crate::util::{Error, Result};

const STATUS_OK: u8 = 0;
const STATUS_FAULT: u8 = 1;

/// Collective wrapper around a direct transport.
pub struct RoutedTransport<C: Collective> {
    /// Present on rank 0 only.
    link: Option<Box<dyn Transport>>,
    group: C,
    topology: Topology,
    faulted: bool,
}

impl<C: Collective> RoutedTransport<C> {
    /// `link` is used on rank 0 and ignored elsewhere.
    pub fn new(group: C, link: Option<Box<dyn Transport>>) -> Self {
        let topology = Topology::new(group.world_size(), group.rank());
        let link = if topology.is_root() { link } else { None };
        if topology.is_root() && link.is_none() {
            tracing::warn!("rank 0 has no link, every operation will fault");
        }
        Self { link, group, topology, faulted: false }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Share rank 0's outcome with every rank. Returns the shared outcome.
    fn share_status(&mut self, local: Result<()>) -> Result<()> {
        let mut status = [if local.is_ok() { STATUS_OK } else { STATUS_FAULT }];
        if let Err(e) = self.group.broadcast(&mut status) {
            self.faulted = true;
            return Err(e);
        }
        if status[0] == STATUS_OK {
            Ok(())
        } else {
            self.faulted = true;
            Err(local.err().unwrap_or(Error::TransportFaulted))
        }
    }

    fn link_op(&mut self, op: impl FnOnce(&mut dyn Transport) -> Result<()>) -> Result<()> {
        match self.link.as_deref_mut() {
            Some(link) => op(link),
            None => Err(Error::TransportFaulted),
        }
    }
}

impl<C: Collective> Transport for RoutedTransport<C> {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        let local = if self.topology.is_root() {
            self.link_op(|l| l.connect(endpoint))
        } else {
            Ok(())
        };
        self.share_status(local)?;
        self.faulted = false;
        Ok(())
    }

    fn close_local(&mut self) {
        if let Some(link) = self.link.as_deref_mut() {
            link.close_local();
        }
    }

    fn close_remote(&mut self) {
        if let Some(link) = self.link.as_deref_mut() {
            link.close_remote();
        }
    }

    fn send_frame(&mut self, bytes: &[u8], tag: Tag) -> Result<()> {
        if self.faulted {
            return Err(Error::TransportFaulted);
        }
        let owner = self.topology.owner_of(tag);
        let rank = self.topology.rank;

        let local = if owner != 0 && rank == owner {
            self.group.send(0, bytes)
        } else if rank == 0 {
            if owner == 0 {
                self.link_op(|l| l.send_frame(bytes, tag))
            } else {
                match self.group.recv(owner) {
                    Ok(forwarded) => self.link_op(|l| l.send_frame(&forwarded, tag)),
                    Err(e) => Err(e),
                }
            }
        } else {
            Ok(())
        };
        self.share_status(local)
    }

    fn receive_frame(&mut self, buf: &mut [u8], tag: Tag) -> Result<()> {
        if self.faulted {
            return Err(Error::TransportFaulted);
        }
        let local = if self.topology.is_root() {
            self.link_op(|l| l.receive_frame(buf, tag))
        } else {
            Ok(())
        };
        self.share_status(local)?;
        if let Err(e) = self.group.broadcast(buf) {
            self.faulted = true;
            return Err(e);
        }
        Ok(())
    }

    fn is_faulted(&self) -> bool {
        self.faulted
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::transport::{LocalGroup, MemoryTransport};

    #[test]
    fn test_receive_broadcast_and_funneled_send() {
        let (link, mut peer) = MemoryTransport::pair();
        let mut link = Some(Box::new(link) as Box<dyn Transport>);

        let handles: Vec<_> = LocalGroup::create(3)
            .into_iter()
            .map(|g| {
                let link = if g.rank() == 0 { link.take() } else { None };
                thread::spawn(move || {
                    let mut t = RoutedTransport::new(g, link);
                    let rank = t.topology().rank as u8;
                    let mut buf = [0u8; 4];
                    t.receive_frame(&mut buf, 0).unwrap();
                    // Tag 2 is owned by rank 2.
                    t.send_frame(&[rank; 2], 2).unwrap();
                    // Tag 9 names no rank; rank 0 sends its own bytes.
                    t.send_frame(&[rank + 10], 9).unwrap();
                    buf
                })
            })
            .collect();

        peer.send_frame(b"ping", 0).unwrap();
        let mut out = [0u8; 3];
        peer.receive_frame(&mut out, 0).unwrap();
        assert_eq!(out, [2, 2, 10]);

        for h in handles {
            assert_eq!(&h.join().unwrap(), b"ping");
        }
    }

    #[test]
    fn test_fault_shared_by_all_ranks() {
        let (link, peer) = MemoryTransport::pair();
        drop(peer);
        let mut link = Some(Box::new(link) as Box<dyn Transport>);
        let handles: Vec<_> = LocalGroup::create(2)
            .into_iter()
            .map(|g| {
                let link = if g.rank() == 0 { link.take() } else { None };
                thread::spawn(move || {
                    let mut t = RoutedTransport::new(g, link);
                    let mut buf = [0u8; 1];
                    let r = t.receive_frame(&mut buf, 0);
                    (r.is_err(), t.is_faulted())
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), (true, true));
        }
    }
}
