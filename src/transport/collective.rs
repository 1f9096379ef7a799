//! Rank-addressed group communication.
//!
//! Groups are stars around rank 0: broadcasts go out from rank 0 and
//! point-to-point messages run between rank 0 and one other rank. Every
//! operation is a synchronous rendezvous; a rank that never reaches the
//! matching call blocks its partners indefinitely.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::sleep;
use std::time::Duration;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::util::{Error, Result};

/// Sent by a joining rank right after connecting, followed by its rank.
const HANDSHAKE_MAGIC: u64 = 0x7262_6272_6964_6765;
/// Returned by rank 0 once the joining rank is accepted.
const ACK_MAGIC: u64 = 0x6163_6b6e_6f77_6c64;

const JOIN_RETRIES: u32 = 60;
const JOIN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Group of cooperating processes (or threads) identified by rank.
pub trait Collective: Send {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    /// Overwrite `buf` on every rank with rank 0's contents. All ranks
    /// must pass buffers of the same length.
    fn broadcast(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Send one message to `dest`.
    fn send(&mut self, dest: usize, bytes: &[u8]) -> Result<()>;

    /// Receive one message from `src`.
    fn recv(&mut self, src: usize) -> Result<Vec<u8>>;
}

fn check_peer(rank: usize, peer: usize, world: usize) -> Result<()> {
    if peer >= world || peer == rank {
        return Err(Error::invalid(format!("rank {rank}: bad peer rank {peer} (world {world})")));
    }
    Ok(())
}

fn broadcast_len_mismatch(expected: usize, got: usize) -> Error {
    Error::protocol(format!("broadcast length {got}, expected {expected}"))
}

/// In-process group: one member per thread, wired with channels.
pub struct LocalGroup {
    rank: usize,
    /// `tx[d]` carries messages from this rank to rank `d`.
    tx: Vec<Option<Sender<Vec<u8>>>>,
    /// `rx[s]` carries messages from rank `s` to this rank.
    rx: Vec<Option<Receiver<Vec<u8>>>>,
}

impl LocalGroup {
    /// Create all `world_size` members; hand one to each thread.
    pub fn create(world_size: usize) -> Vec<Self> {
        let mut members: Vec<Self> = (0..world_size)
            .map(|rank| Self {
                rank,
                tx: (0..world_size).map(|_| None).collect(),
                rx: (0..world_size).map(|_| None).collect(),
            })
            .collect();
        for src in 0..world_size {
            for dst in 0..world_size {
                if src == dst {
                    continue;
                }
                let (tx, rx) = channel();
                members[src].tx[dst] = Some(tx);
                members[dst].rx[src] = Some(rx);
            }
        }
        members
    }

    fn gone(&self, peer: usize) -> Error {
        tracing::warn!(rank = self.rank, peer, "group member gone");
        Error::TransportFaulted
    }
}

impl Collective for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.tx.len()
    }

    fn broadcast(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.rank == 0 {
            for dst in 1..self.world_size() {
                self.send(dst, buf)?;
            }
            return Ok(());
        }
        let msg = self.recv(0)?;
        if msg.len() != buf.len() {
            return Err(broadcast_len_mismatch(buf.len(), msg.len()));
        }
        buf.copy_from_slice(&msg);
        Ok(())
    }

    fn send(&mut self, dest: usize, bytes: &[u8]) -> Result<()> {
        check_peer(self.rank, dest, self.world_size())?;
        let ok = self.tx[dest].as_ref().is_some_and(|tx| tx.send(bytes.to_vec()).is_ok());
        if ok {
            Ok(())
        } else {
            Err(self.gone(dest))
        }
    }

    fn recv(&mut self, src: usize) -> Result<Vec<u8>> {
        check_peer(self.rank, src, self.world_size())?;
        match self.rx[src].as_ref().map(Receiver::recv) {
            Some(Ok(msg)) => Ok(msg),
            _ => Err(self.gone(src)),
        }
    }
}

/// Process group over TCP: rank 0 accepts one connection per other rank.
///
/// Messages are framed as `[len: u64 LE][bytes]`.
pub struct TcpStarGroup {
    rank: usize,
    world_size: usize,
    /// On rank 0, `peers[r]` is the link to rank `r`; elsewhere only `peers[0]`.
    peers: Vec<Option<TcpStream>>,
}

impl TcpStarGroup {
    /// Join or coordinate a group at `coordinator` depending on `rank`.
    pub fn connect(coordinator: &str, rank: usize, world_size: usize) -> Result<Self> {
        if rank == 0 {
            let listener = TcpListener::bind(coordinator)?;
            Self::coordinate(listener, world_size)
        } else {
            Self::join(coordinator, rank, world_size)
        }
    }

    /// Rank 0: accept the other `world_size - 1` ranks on `listener`.
    pub fn coordinate(listener: TcpListener, world_size: usize) -> Result<Self> {
        let mut peers: Vec<Option<TcpStream>> = (0..world_size).map(|_| None).collect();
        let mut joined = 1;
        tracing::info!(addr = ?listener.local_addr().ok(), world_size, "waiting for ranks");
        while joined < world_size {
            let (mut stream, addr) = listener.accept()?;
            let magic = stream.read_u64::<LittleEndian>()?;
            let rank = stream.read_u64::<LittleEndian>()? as usize;
            if magic != HANDSHAKE_MAGIC || rank == 0 || rank >= world_size || peers[rank].is_some() {
                tracing::warn!(%addr, rank, "rejected group handshake");
                continue;
            }
            stream.write_u64::<LittleEndian>(ACK_MAGIC)?;
            stream.set_nodelay(true)?;
            tracing::debug!(%addr, rank, "rank joined");
            peers[rank] = Some(stream);
            joined += 1;
        }
        Ok(Self { rank: 0, world_size, peers })
    }

    /// Rank > 0: connect to rank 0, retrying until it is up.
    pub fn join(coordinator: &str, rank: usize, world_size: usize) -> Result<Self> {
        if rank == 0 || rank >= world_size {
            return Err(Error::invalid(format!("cannot join as rank {rank} of {world_size}")));
        }
        let mut attempt = 0;
        let stream = loop {
            attempt += 1;
            match Self::handshake(coordinator, rank) {
                Ok(stream) => break stream,
                Err(e) if attempt < JOIN_RETRIES => {
                    tracing::debug!(rank, attempt, error = %e, "coordinator not ready, retrying");
                    sleep(JOIN_RETRY_DELAY);
                }
                Err(e) => return Err(e.into()),
            }
        };
        let mut peers: Vec<Option<TcpStream>> = (0..world_size).map(|_| None).collect();
        peers[0] = Some(stream);
        tracing::info!(rank, world_size, "joined group");
        Ok(Self { rank, world_size, peers })
    }

    fn handshake(coordinator: &str, rank: usize) -> std::io::Result<TcpStream> {
        let mut stream = TcpStream::connect(coordinator)?;
        stream.set_nodelay(true)?;
        stream.write_u64::<LittleEndian>(HANDSHAKE_MAGIC)?;
        stream.write_u64::<LittleEndian>(rank as u64)?;
        if stream.read_u64::<LittleEndian>()? != ACK_MAGIC {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad group ack"));
        }
        Ok(stream)
    }

    /// Address of rank 0's end of the link to `peer`, for diagnostics.
    pub fn peer_addr(&self, peer: usize) -> Option<SocketAddr> {
        self.peers.get(peer)?.as_ref()?.peer_addr().ok()
    }

    fn stream(&mut self, peer: usize) -> Result<&mut TcpStream> {
        check_peer(self.rank, peer, self.world_size)?;
        self.peers[peer]
            .as_mut()
            .ok_or_else(|| Error::invalid(format!("rank {} has no link to rank {peer}", self.rank)))
    }

    fn io_fault(&self, peer: usize, e: std::io::Error) -> Error {
        tracing::warn!(rank = self.rank, peer, error = %e, "group link fault");
        Error::TransportFaulted
    }
}

impl Collective for TcpStarGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn broadcast(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.rank == 0 {
            for dst in 1..self.world_size {
                self.send(dst, buf)?;
            }
            return Ok(());
        }
        let msg = self.recv(0)?;
        if msg.len() != buf.len() {
            return Err(broadcast_len_mismatch(buf.len(), msg.len()));
        }
        buf.copy_from_slice(&msg);
        Ok(())
    }

    fn send(&mut self, dest: usize, bytes: &[u8]) -> Result<()> {
        let stream = self.stream(dest)?;
        let written = stream
            .write_u64::<LittleEndian>(bytes.len() as u64)
            .and_then(|()| stream.write_all(bytes));
        written.map_err(|e| self.io_fault(dest, e))
    }

    fn recv(&mut self, src: usize) -> Result<Vec<u8>> {
        let stream = self.stream(src)?;
        let read = stream.read_u64::<LittleEndian>().and_then(|len| {
            let mut msg = vec![0u8; len as usize];
            stream.read_exact(&mut msg).map(|()| msg)
        });
        read.map_err(|e| self.io_fault(src, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_local_broadcast_and_p2p() {
        let handles: Vec<_> = LocalGroup::create(3)
            .into_iter()
            .map(|mut g| {
                thread::spawn(move || {
                    let mut buf = if g.rank() == 0 { *b"root" } else { [0u8; 4] };
                    g.broadcast(&mut buf).unwrap();
                    assert_eq!(&buf, b"root");
                    match g.rank() {
                        0 => g.recv(2).unwrap(),
                        2 => {
                            g.send(0, b"from two").unwrap();
                            Vec::new()
                        }
                        _ => Vec::new(),
                    }
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results[0], b"from two");
    }

    #[test]
    fn test_local_rejects_self_and_bad_len() {
        let mut members = LocalGroup::create(2);
        let mut one = members.pop().unwrap();
        let mut zero = members.pop().unwrap();
        assert!(zero.send(0, b"x").is_err());
        assert!(zero.send(5, b"x").is_err());
        zero.broadcast(&mut [1, 2, 3]).unwrap();
        assert!(one.broadcast(&mut [0u8; 2]).is_err());
    }

    #[test]
    fn test_tcp_star() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let joiners: Vec<_> = (1..3)
            .map(|rank| {
                let addr = addr.clone();
                thread::spawn(move || {
                    let mut g = TcpStarGroup::join(&addr, rank, 3).unwrap();
                    let mut buf = [0u8; 5];
                    g.broadcast(&mut buf).unwrap();
                    g.send(0, &[rank as u8; 3]).unwrap();
                    buf
                })
            })
            .collect();
        let mut root = TcpStarGroup::coordinate(listener, 3).unwrap();
        let mut hello = *b"hello";
        root.broadcast(&mut hello).unwrap();
        assert_eq!(root.recv(1).unwrap(), vec![1, 1, 1]);
        assert_eq!(root.recv(2).unwrap(), vec![2, 2, 2]);
        for j in joiners {
            assert_eq!(&j.join().unwrap(), b"hello");
        }
    }
}
