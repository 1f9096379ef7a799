//! The per-connection session loop.

use std::sync::Arc;

use super::StopSignal;
use crate::distributed::Topology;
use crate::relay::PendingVolume;
use crate::session::protocol::receive_material;
use crate::session::{RenderTarget, UpdateRecord};
use crate::transport::Transport;
use crate::util::{Error, Result};

/// How an update's frame index picks the target it applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Addressing {
    /// All targets live in this process; an in-range frame selects one,
    /// an out-of-range frame keeps the previous selection.
    Local,
    /// One target per rank; an update applies only on the rank that owns
    /// its frame. Other ranks keep accumulating.
    Rank(Topology),
}

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Stop was requested.
    Stopped,
    /// The front-end sent a reset record.
    Reset,
    /// Transport fault, protocol violation or render failure.
    Fault(Error),
}

/// Where a relayed volume is installed.
#[derive(Clone)]
pub struct VolumeBinding {
    pub geometry: String,
    pub attribute: String,
    pub pending: Arc<PendingVolume>,
}

/// Drives render targets from the control stream.
pub struct Orchestrator {
    targets: Vec<RenderTarget>,
    active: usize,
    addressing: Addressing,
    stop: StopSignal,
    volume: Option<VolumeBinding>,
    cycles: u64,
    material: Vec<u8>,
}

enum Cycle {
    Continue,
    Reset,
}

impl Orchestrator {
    /// `targets` must not be empty.
    pub fn new(targets: Vec<RenderTarget>, addressing: Addressing, stop: StopSignal) -> Result<Self> {
        if targets.is_empty() {
            return Err(Error::invalid("orchestrator needs at least one render target"));
        }
        Ok(Self {
            targets,
            active: 0,
            addressing,
            stop,
            volume: None,
            cycles: 0,
            material: Vec::new(),
        })
    }

    pub fn with_volume(mut self, binding: VolumeBinding) -> Self {
        self.volume = Some(binding);
        self
    }

    pub fn targets(&self) -> &[RenderTarget] {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut [RenderTarget] {
        &mut self.targets
    }

    /// Index of the currently selected target.
    pub fn active(&self) -> usize {
        self.active
    }

    /// Completed update/render/stream cycles over all sessions.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Run cycles until stop, reset or fault.
    #[tracing::instrument(skip_all, fields(targets = self.targets.len()))]
    pub fn run_session(&mut self, transport: &mut dyn Transport) -> SessionEnd {
        tracing::info!("session started");
        loop {
            if self.stop.is_stopped() {
                return SessionEnd::Stopped;
            }
            match self.cycle(transport) {
                Ok(Cycle::Continue) => self.cycles += 1,
                Ok(Cycle::Reset) => {
                    tracing::info!("front-end reset, ending session");
                    return SessionEnd::Reset;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "session aborted");
                    return SessionEnd::Fault(e);
                }
            }
        }
    }

    fn cycle(&mut self, t: &mut dyn Transport) -> Result<Cycle> {
        let update = UpdateRecord::receive(t, self.active as i32)?;
        if update.reset != 0 {
            return Ok(Cycle::Reset);
        }
        update.dimensions()?;

        let applies = self.select(update.frame);
        self.material = receive_material(t, update.frame)?;

        let active = self.active;
        let target = &mut self.targets[active];
        if applies {
            if target.sync_camera(&update)? {
                tracing::debug!(target_id = target.id(), "camera changed, accumulation reset");
            }
            if target.sync_material(&self.material) {
                tracing::debug!(target_id = target.id(), "material changed, accumulation reset");
            }
        }

        self.apply_pending_volume();

        let target = &mut self.targets[active];
        target.render_step()?;
        t.send_frame(target.pixels(), update.frame)?;
        target.telemetry().send(t, update.frame)?;
        target.streamed();
        Ok(Cycle::Continue)
    }

    /// Select the target for `frame`; returns whether the update applies.
    fn select(&mut self, frame: i32) -> bool {
        match self.addressing {
            Addressing::Local => {
                if let Ok(f) = usize::try_from(frame) {
                    if self.targets.len() > 1 && f < self.targets.len() {
                        self.active = f;
                    }
                }
                true
            }
            Addressing::Rank(topology) => topology.owner_of(frame) == topology.rank,
        }
    }

    fn apply_pending_volume(&mut self) {
        let Some(binding) = &self.volume else {
            return;
        };
        let Some(update) = binding.pending.take() else {
            return;
        };
        for target in &mut self.targets {
            if target.replace_volume(&binding.geometry, &binding.attribute, update.payload.clone()) {
                target.set_scalars_range(update.min_value, update.max_value);
            }
        }
    }
}
