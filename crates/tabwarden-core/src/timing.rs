//! Caller-polled timer primitives.
//!
//! No internal threads or spawned timers -- the owner calls `due(now)` from
//! its periodic tick and the primitive answers whether its deadline passed.
//! Arming an already-armed [`Debounce`] coalesces into the existing deadline
//! instead of stacking a second one.

use serde::{Deserialize, Serialize};

/// Trailing-edge debounce with a staleness bound.
///
/// A request arriving less than `window_ms` after the previous fire is
/// delayed just enough to respect the window, but never beyond `window_ms`
/// from the request that armed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debounce {
    window_ms: u64,
    armed_at_ms: Option<u64>,
    last_fired_at_ms: Option<u64>,
}

impl Debounce {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            armed_at_ms: None,
            last_fired_at_ms: None,
        }
    }

    /// Request a fire. Coalesces into the pending deadline if one exists.
    pub fn arm(&mut self, now_ms: u64) {
        if self.armed_at_ms.is_none() {
            self.armed_at_ms = Some(now_ms);
        }
    }

    pub fn cancel(&mut self) {
        self.armed_at_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at_ms.is_some()
    }

    /// The instant this debounce should fire, if armed.
    pub fn deadline_ms(&self) -> Option<u64> {
        let armed = self.armed_at_ms?;
        let earliest = match self.last_fired_at_ms {
            Some(last) => armed.max(last.saturating_add(self.window_ms)),
            None => armed,
        };
        // Staleness bound: never later than one window after arming.
        Some(earliest.min(armed.saturating_add(self.window_ms)))
    }

    /// True once the deadline has passed. Does not disarm.
    pub fn due(&self, now_ms: u64) -> bool {
        self.deadline_ms().is_some_and(|d| now_ms >= d)
    }

    /// Disarm and record the fire instant.
    pub fn fire(&mut self, now_ms: u64) {
        self.armed_at_ms = None;
        self.last_fired_at_ms = Some(now_ms);
    }
}

/// Fixed-cadence job marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicInterval {
    every_ms: u64,
    last_run_at_ms: Option<u64>,
}

impl PeriodicInterval {
    pub fn new(every_ms: u64) -> Self {
        Self {
            every_ms,
            last_run_at_ms: None,
        }
    }

    pub fn due(&self, now_ms: u64) -> bool {
        match self.last_run_at_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.every_ms,
            None => true,
        }
    }

    pub fn mark(&mut self, now_ms: u64) {
        self.last_run_at_ms = Some(now_ms);
    }
}
