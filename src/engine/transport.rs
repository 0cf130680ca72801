// Transport - Shared start/stop/pause state for every track's pattern
//
// One transport per engine. Starting an already started transport is a
// no-op; patterns only fire while it is started.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Transport state (start/stop/pause)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Started,
    Paused,
}

impl TransportState {
    pub fn is_started(&self) -> bool {
        matches!(self, TransportState::Started)
    }

    /// Check if transport is stopped or paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped | TransportState::Paused)
    }
}

/// Shared transport consumed from the audio engine
pub trait Transport: Send + Sync {
    fn start(&self);

    /// Stop and rewind to 0
    fn stop(&self);

    /// Stop and keep the current position
    fn pause(&self);

    fn state(&self) -> TransportState;
}

/// Transport state shared via atomics between the session and the clock
#[derive(Debug, Default)]
pub struct SharedTransportState {
    started: AtomicBool,
    paused: AtomicBool,
    /// Elapsed transport seconds, stored as f64 bits
    position: AtomicU64,
}

impl SharedTransportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds the transport has been running since the last stop
    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    /// Advance the position if started; returns the new position
    pub fn advance_position(&self, seconds: f64) -> f64 {
        let current = self.position();
        if !self.state().is_started() {
            return current;
        }
        let next = current + seconds;
        self.position.store(next.to_bits(), Ordering::Relaxed);
        next
    }
}

impl Transport for SharedTransportState {
    fn start(&self) {
        self.started.store(true, Ordering::Relaxed);
        self.paused.store(false, Ordering::Relaxed);
    }

    fn stop(&self) {
        self.started.store(false, Ordering::Relaxed);
        self.paused.store(false, Ordering::Relaxed);
        self.position.store(0f64.to_bits(), Ordering::Relaxed);
    }

    fn pause(&self) {
        self.started.store(false, Ordering::Relaxed);
        self.paused.store(true, Ordering::Relaxed);
    }

    fn state(&self) -> TransportState {
        if self.started.load(Ordering::Relaxed) {
            TransportState::Started
        } else if self.paused.load(Ordering::Relaxed) {
            TransportState::Paused
        } else {
            TransportState::Stopped
        }
    }
}
