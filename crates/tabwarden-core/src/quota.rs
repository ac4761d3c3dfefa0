//! Daily oracle call budget.
//!
//! The counter is keyed by the local calendar date and compared by string
//! equality, so it is immune to clock drift within a day and resets exactly
//! once when the date key changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyQuota {
    pub date_key: String,
    pub used: u32,
    #[serde(skip)]
    ceiling: u32,
}

impl DailyQuota {
    pub fn new(ceiling: u32, date_key: String) -> Self {
        Self {
            date_key,
            used: 0,
            ceiling,
        }
    }

    /// Reset the counter if the calendar date moved on. Returns true when a
    /// rollover happened (the caller should persist the fresh state).
    pub fn roll(&mut self, today: &str) -> bool {
        if self.date_key != today {
            log::info!(
                "quota rollover {} -> {today} ({} calls used)",
                self.date_key,
                self.used
            );
            self.date_key = today.to_string();
            self.used = 0;
            true
        } else {
            false
        }
    }

    pub fn exhausted(&self) -> bool {
        self.used >= self.ceiling
    }

    /// Consume one call if the budget allows. The increment must be
    /// persisted before the oracle call is issued.
    pub fn consume(&mut self) -> bool {
        if self.exhausted() {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn remaining(&self) -> u32 {
        self.ceiling.saturating_sub(self.used)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Restore the persisted counter, keeping the configured ceiling.
    pub fn restore(&mut self, value: Value) {
        if let Ok(saved) = serde_json::from_value::<DailyQuota>(value) {
            self.date_key = saved.date_key;
            self.used = saved.used;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_stops_at_the_ceiling() {
        let mut q = DailyQuota::new(3, "2026-08-07".to_string());
        assert!(q.consume());
        assert!(q.consume());
        assert!(q.consume());
        assert!(!q.consume());
        assert_eq!(q.used, 3);
        assert!(q.exhausted());
    }

    #[test]
    fn rollover_resets_exactly_once_per_date_change() {
        let mut q = DailyQuota::new(3, "2026-08-07".to_string());
        q.consume();
        assert!(!q.roll("2026-08-07"));
        assert!(q.roll("2026-08-08"));
        assert_eq!(q.used, 0);
        assert!(!q.roll("2026-08-08"));
    }

    #[test]
    fn restore_keeps_configured_ceiling() {
        let mut q = DailyQuota::new(300, "2026-08-07".to_string());
        let mut saved = DailyQuota::new(0, "2026-08-06".to_string());
        saved.used = 17;
        q.restore(saved.to_value());
        assert_eq!(q.used, 17);
        assert_eq!(q.date_key, "2026-08-06");
        assert_eq!(q.remaining(), 283);
    }
}
