//! Outer reconnect loop.

use std::thread;
use std::time::Duration;

use super::{Orchestrator, SessionEnd};
use crate::transport::{Endpoint, Transport};

/// Counters reported when the driver returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub connects: u64,
    pub failed_connects: u64,
    pub sessions: u64,
    pub faults: u64,
    pub resets: u64,
}

/// Keeps a session running across link faults: close both directions,
/// connect again, resume the orchestrator with its targets intact.
pub struct Driver<T: Transport> {
    transport: T,
    endpoint: Endpoint,
    orchestrator: Orchestrator,
    retry_delay: Duration,
    max_sessions: Option<u64>,
    stats: DriverStats,
}

impl<T: Transport> Driver<T> {
    pub fn new(transport: T, endpoint: Endpoint, orchestrator: Orchestrator) -> Self {
        Self {
            transport,
            endpoint,
            orchestrator,
            retry_delay: Duration::from_secs(1),
            max_sessions: None,
            stats: DriverStats::default(),
        }
    }

    /// Delay before retrying a failed connect.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Return after this many sessions instead of running until stopped.
    pub fn max_sessions(mut self, n: u64) -> Self {
        self.max_sessions = Some(n);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Run until stop is requested or the session limit is reached.
    pub fn run(&mut self) -> DriverStats {
        tracing::info!(endpoint = %self.endpoint, "driver started");
        loop {
            if self.orchestrator.stop_signal().is_stopped() {
                break;
            }
            if self.max_sessions.is_some_and(|n| self.stats.sessions >= n) {
                break;
            }

            self.transport.close_remote();
            self.transport.close_local();
            if let Err(e) = self.transport.connect(&self.endpoint) {
                self.stats.failed_connects += 1;
                tracing::warn!(endpoint = %self.endpoint, error = %e, "connect failed, retrying");
                thread::sleep(self.retry_delay);
                continue;
            }
            self.stats.connects += 1;
            self.stats.sessions += 1;

            match self.orchestrator.run_session(&mut self.transport) {
                SessionEnd::Stopped => break,
                SessionEnd::Reset => self.stats.resets += 1,
                SessionEnd::Fault(e) => {
                    self.stats.faults += 1;
                    tracing::info!(error = %e, "reconnecting");
                }
            }
        }
        self.transport.close_remote();
        tracing::info!(stats = ?self.stats, "driver stopped");
        self.stats
    }

    pub fn into_parts(self) -> (T, Orchestrator) {
        (self.transport, self.orchestrator)
    }
}
