//! Clock abstraction.
//!
//! All dwell accounting and TTL arithmetic runs on epoch milliseconds
//! supplied by a [`Clock`] so the whole core can be driven deterministically
//! in tests. The daily quota uses the local calendar date key, compared by
//! string equality -- a date change resets it exactly once, independent of
//! clock drift within the day.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Local, TimeZone, Utc};

/// Time source for the core. One instance is shared by every component.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Local calendar date key, `YYYY-MM-DD`.
    fn date_key(&self) -> String;
}

/// Wall-clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn date_key(&self) -> String {
        Local::now().format("%Y-%m-%d").to_string()
    }
}

/// Manually-advanced clock for tests.
///
/// The date key is derived from the fake instant in UTC, so advancing past
/// midnight exercises quota rollover without touching the host clock.
#[derive(Debug, Default)]
pub struct FakeClock {
    now_ms: AtomicU64,
}

impl FakeClock {
    pub fn at(now_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            now_ms: AtomicU64::new(now_ms),
        })
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn date_key(&self) -> String {
        let ms = self.now_ms() as i64;
        match Utc.timestamp_millis_opt(ms) {
            chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d").to_string(),
            _ => "1970-01-01".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances() {
        let clock = FakeClock::at(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[test]
    fn fake_clock_date_key_rolls_at_midnight() {
        let clock = FakeClock::at(0);
        assert_eq!(clock.date_key(), "1970-01-01");
        clock.set(24 * 60 * 60 * 1000);
        assert_eq!(clock.date_key(), "1970-01-02");
    }
}
