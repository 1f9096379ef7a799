//! Rank topology for multi-process rendering.
//!
//! Each rank renders its own target; the frame index carried by an update
//! addresses one rank. Only rank 0 touches the front-end link.

use std::path::{Path, PathBuf};

/// World size and local rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Topology {
    pub world_size: usize,
    pub rank: usize,
}

impl Default for Topology {
    fn default() -> Self {
        Self::single()
    }
}

impl Topology {
    /// One process, rank 0.
    pub const fn single() -> Self {
        Self { world_size: 1, rank: 0 }
    }

    /// Clamps `world_size` to at least 1 and `rank` into range.
    pub fn new(world_size: usize, rank: usize) -> Self {
        let world_size = world_size.max(1);
        if rank >= world_size {
            tracing::warn!(rank, world_size, "rank out of range, using 0");
        }
        Self {
            world_size,
            rank: if rank < world_size { rank } else { 0 },
        }
    }

    #[inline]
    pub fn is_distributed(&self) -> bool {
        self.world_size > 1
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    /// Rank that owns frame `frame`: the frame itself when it names a rank,
    /// rank 0 otherwise.
    pub fn owner_of(&self, frame: i32) -> usize {
        match usize::try_from(frame) {
            Ok(f) if self.is_distributed() && f < self.world_size => f,
            _ => 0,
        }
    }

    /// True if an update for `frame` addresses this rank.
    pub fn addresses_me(&self, frame: i32) -> bool {
        usize::try_from(frame).is_ok_and(|f| f == self.rank)
    }

    /// Scene path this rank loads: `<scene>_NNNNN` with the rank when
    /// distributed, `scene` unchanged otherwise.
    pub fn scene_path(&self, scene: &Path) -> PathBuf {
        if self.is_distributed() {
            indexed_path(scene, self.rank)
        } else {
            scene.to_path_buf()
        }
    }
}

/// `<base>_NNNNN` (five-digit zero-padded index).
pub fn indexed_path(base: &Path, index: usize) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push(format!("_{index:05}"));
    PathBuf::from(s)
}
