//! Single-slot "pixels ready" handoff between a render worker and the
//! session loop.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct Slot {
    ready: bool,
    pixels: Vec<u8>,
    duration: Duration,
}

/// One producer publishes a finished step, one consumer waits for it.
#[derive(Default)]
pub struct FrameReady {
    slot: Mutex<Slot>,
    cond: Condvar,
}

impl FrameReady {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer side: store a step's pixels and wake the waiter.
    pub fn publish(&self, pixels: &[u8], duration: Duration) {
        let mut slot = self.slot.lock();
        slot.pixels.clear();
        slot.pixels.extend_from_slice(pixels);
        slot.duration = duration;
        slot.ready = true;
        self.cond.notify_one();
    }

    /// Consumer side: block until a step is published, copy its pixels into
    /// `out` and clear the flag. Returns the step duration.
    pub fn wait_into(&self, out: &mut Vec<u8>) -> Duration {
        let mut slot = self.slot.lock();
        while !slot.ready {
            self.cond.wait(&mut slot);
        }
        slot.ready = false;
        out.clear();
        out.extend_from_slice(&slot.pixels);
        slot.duration
    }

    /// Like [`wait_into`](Self::wait_into) but gives up after `timeout`.
    pub fn wait_into_timeout(&self, out: &mut Vec<u8>, timeout: Duration) -> Option<Duration> {
        let mut slot = self.slot.lock();
        if !slot.ready {
            self.cond.wait_for(&mut slot, timeout);
        }
        if !slot.ready {
            return None;
        }
        slot.ready = false;
        out.clear();
        out.extend_from_slice(&slot.pixels);
        Some(slot.duration)
    }

    pub fn is_ready(&self) -> bool {
        self.slot.lock().ready
    }

    /// Drop any published but unconsumed step.
    pub fn clear(&self) {
        self.slot.lock().ready = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_publish_then_wait() {
        let ready = Arc::new(FrameReady::new());
        let producer = {
            let ready = ready.clone();
            thread::spawn(move || ready.publish(&[1, 2, 3], Duration::from_millis(5)))
        };
        let mut out = Vec::new();
        let d = ready.wait_into(&mut out);
        producer.join().unwrap();
        assert_eq!(out, vec![1, 2, 3]);
        assert_eq!(d, Duration::from_millis(5));
        assert!(!ready.is_ready());
    }

    #[test]
    fn test_timeout_and_clear() {
        let ready = FrameReady::new();
        let mut out = Vec::new();
        assert!(ready.wait_into_timeout(&mut out, Duration::from_millis(10)).is_none());
        ready.publish(&[7], Duration::ZERO);
        ready.clear();
        assert!(ready.wait_into_timeout(&mut out, Duration::from_millis(10)).is_none());
        ready.publish(&[8], Duration::ZERO);
        assert_eq!(ready.wait_into_timeout(&mut out, Duration::from_millis(10)), Some(Duration::ZERO));
        assert_eq!(out, vec![8]);
    }
}
