//! Per-domain dwell aggregates.
//!
//! Created lazily on the first dwell tick for a domain; accumulated by the
//! session tracker; cleared only by an explicit stats reset.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Accumulated dwell for one domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainStats {
    pub productive_ms: u64,
    pub non_productive_ms: u64,
    pub last_productive_score: Option<u8>,
    pub last_non_productive_score: Option<u8>,
}

/// Outward-facing stats snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_productive_ms: u64,
    pub total_non_productive_ms: u64,
    pub per_domain: HashMap<String, DomainStats>,
    pub cache_size: usize,
}

/// The domain ledger.
#[derive(Debug, Clone, Default)]
pub struct StatsBook {
    domains: HashMap<String, DomainStats>,
}

impl StatsBook {
    /// Charge a qualifying dwell tick to a domain's bucket.
    pub fn record_dwell(&mut self, domain: &str, elapsed_ms: u64, is_productive: bool, score: u8) {
        let entry = self.domains.entry(domain.to_string()).or_default();
        if is_productive {
            entry.productive_ms += elapsed_ms;
            entry.last_productive_score = Some(score);
        } else {
            entry.non_productive_ms += elapsed_ms;
            entry.last_non_productive_score = Some(score);
        }
    }

    pub fn snapshot(&self, cache_size: usize) -> StatsSnapshot {
        StatsSnapshot {
            total_productive_ms: self.domains.values().map(|d| d.productive_ms).sum(),
            total_non_productive_ms: self.domains.values().map(|d| d.non_productive_ms).sum(),
            per_domain: self.domains.clone(),
            cache_size,
        }
    }

    pub fn reset(&mut self) {
        self.domains.clear();
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.domains).unwrap_or(Value::Null)
    }

    pub fn restore(&mut self, value: Value) {
        if let Ok(domains) = serde_json::from_value(value) {
            self.domains = domains;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_split_by_classification() {
        let mut book = StatsBook::default();
        book.record_dwell("example.com", 1_000, true, 80);
        book.record_dwell("example.com", 500, false, 20);
        book.record_dwell("other.com", 250, false, 10);

        let snap = book.snapshot(0);
        assert_eq!(snap.total_productive_ms, 1_000);
        assert_eq!(snap.total_non_productive_ms, 750);
        let d = &snap.per_domain["example.com"];
        assert_eq!(d.last_productive_score, Some(80));
        assert_eq!(d.last_non_productive_score, Some(20));
    }

    #[test]
    fn reset_clears_everything() {
        let mut book = StatsBook::default();
        book.record_dwell("example.com", 1_000, true, 80);
        book.reset();
        assert!(book.snapshot(0).per_domain.is_empty());
    }

    #[test]
    fn roundtrips_through_value() {
        let mut book = StatsBook::default();
        book.record_dwell("example.com", 1_000, true, 80);
        let value = book.to_value();

        let mut back = StatsBook::default();
        back.restore(value);
        assert_eq!(back.snapshot(0).total_productive_ms, 1_000);
    }

    #[test]
    fn restore_ignores_malformed_payload() {
        let mut book = StatsBook::default();
        book.record_dwell("example.com", 1_000, true, 80);
        book.restore(serde_json::json!("garbage"));
        assert_eq!(book.snapshot(0).total_productive_ms, 1_000);
    }
}
