//! Classification cache.
//!
//! In-memory map from normalized URL to classification, TTL-bounded, with
//! debounced persistence through the store adapter. Resolution order on a
//! read: always-productive list, always-non-productive list, then the map.
//! The list checks are domain-substring matches evaluated before any oracle
//! call is considered, so they are free and authoritative.
//!
//! Expired entries are evicted by the read that discovers them; a periodic
//! sweep covers entries nobody reads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::timing::{Debounce, PeriodicInterval};
use crate::urls;

/// Classification source tags.
pub const SOURCE_ALLOWLIST: &str = "Allowlist";
pub const SOURCE_DENYLIST: &str = "Denylist";
pub const SOURCE_MANUAL: &str = "Manual";
pub const SOURCE_QUOTA: &str = "Quota";
pub const SOURCE_ORACLE: &str = "Oracle";

/// One classification verdict. One record per normalized URL; overwritten
/// on re-classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub normalized_url: String,
    pub is_productive: bool,
    pub score: u8,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    pub created_at_ms: u64,
    pub source: String,
}

impl ClassificationRecord {
    fn allowlisted(url: &str, now_ms: u64) -> Self {
        Self {
            normalized_url: urls::normalize(url),
            is_productive: true,
            score: 100,
            categories: vec!["Allowlisted".to_string()],
            explanation: "Domain is on the always-productive list".to_string(),
            created_at_ms: now_ms,
            source: SOURCE_ALLOWLIST.to_string(),
        }
    }

    fn denylisted(url: &str, now_ms: u64) -> Self {
        Self {
            normalized_url: urls::normalize(url),
            is_productive: false,
            score: 0,
            categories: vec!["Denylisted".to_string()],
            explanation: "Domain is on the always-non-productive list".to_string(),
            created_at_ms: now_ms,
            source: SOURCE_DENYLIST.to_string(),
        }
    }

    pub fn is_expired(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > ttl_ms
    }
}

/// TTL-bounded classification cache with debounced persistence.
pub struct ClassificationCache {
    entries: HashMap<String, ClassificationRecord>,
    ttl_ms: u64,
    always_productive: Vec<String>,
    always_non_productive: Vec<String>,
    flush: Debounce,
    sweep: PeriodicInterval,
    dirty: bool,
}

impl ClassificationCache {
    pub fn new(
        ttl_ms: u64,
        flush_debounce_ms: u64,
        sweep_interval_ms: u64,
        always_productive: Vec<String>,
        always_non_productive: Vec<String>,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms,
            always_productive,
            always_non_productive,
            flush: Debounce::new(flush_debounce_ms),
            sweep: PeriodicInterval::new(sweep_interval_ms),
            dirty: false,
        }
    }

    /// Insert a record under the URL's normalized key.
    ///
    /// The map is updated immediately so reads in the same turn see it; the
    /// flush to the store is debounced.
    pub fn add(&mut self, url: &str, mut record: ClassificationRecord, now_ms: u64) {
        let key = urls::normalize(url);
        record.normalized_url = key.clone();
        record.created_at_ms = now_ms;
        self.entries.insert(key, record);
        self.dirty = true;
        self.flush.arm(now_ms);
    }

    /// Resolve a URL: allowlist, denylist, then the map with TTL eviction.
    pub fn lookup(&mut self, url: &str, now_ms: u64) -> Option<ClassificationRecord> {
        let domain = urls::domain_of(url);
        if urls::domain_matches(&domain, &self.always_productive) {
            return Some(ClassificationRecord::allowlisted(url, now_ms));
        }
        if urls::domain_matches(&domain, &self.always_non_productive) {
            return Some(ClassificationRecord::denylisted(url, now_ms));
        }

        let key = urls::normalize(url);
        let expired = self
            .entries
            .get(&key)
            .is_some_and(|r| r.is_expired(now_ms, self.ttl_ms));
        if expired {
            self.entries.remove(&key);
            self.dirty = true;
            self.flush.arm(now_ms);
            log::debug!("evicted expired cache entry for {key}");
            return None;
        }
        self.entries.get(&key).cloned()
    }

    /// Periodic work: run the TTL sweep when due. Returns true when a flush
    /// should be performed now.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if self.sweep.due(now_ms) {
            self.sweep.mark(now_ms);
            let before = self.entries.len();
            self.entries.retain(|_, r| !r.is_expired(now_ms, self.ttl_ms));
            let evicted = before - self.entries.len();
            if evicted > 0 {
                log::info!("cache sweep evicted {evicted} expired entries");
                self.dirty = true;
                self.flush.arm(now_ms);
            }
        }
        self.dirty && self.flush.due(now_ms)
    }

    /// Serialize for persistence and mark the flush as performed.
    pub fn flush_payload(&mut self, now_ms: u64) -> Value {
        self.flush.fire(now_ms);
        self.dirty = false;
        serde_json::to_value(&self.entries).unwrap_or(Value::Null)
    }

    /// A flush write failed terminally. In-memory state stays authoritative;
    /// the next `add` re-arms persistence.
    pub fn flush_failed(&mut self) {
        self.dirty = true;
    }

    /// Restore from a persisted value, skipping malformed entries.
    pub fn restore(&mut self, value: Value) {
        let Value::Object(map) = value else {
            return;
        };
        for (key, raw) in map {
            match serde_json::from_value::<ClassificationRecord>(raw) {
                Ok(record) => {
                    self.entries.insert(key, record);
                }
                Err(e) => log::warn!("skipping malformed cached entry {key}: {e}"),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self, now_ms: u64) {
        self.entries.clear();
        self.dirty = true;
        self.flush.arm(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TTL: u64 = 7 * 24 * 60 * 60 * 1000;

    fn cache() -> ClassificationCache {
        ClassificationCache::new(
            TTL,
            2_000,
            30 * 60 * 1000,
            vec!["docs.rs".to_string()],
            vec!["clickbait.example".to_string()],
        )
    }

    fn record(score: u8) -> ClassificationRecord {
        ClassificationRecord {
            normalized_url: String::new(),
            is_productive: score >= 50,
            score,
            categories: vec![],
            explanation: String::new(),
            created_at_ms: 0,
            source: SOURCE_ORACLE.to_string(),
        }
    }

    #[test]
    fn host_casing_maps_to_one_entry() {
        let mut c = cache();
        c.add("https://Example.COM/a", record(80), 1_000);
        c.add("https://example.com/a", record(20), 2_000);
        assert_eq!(c.len(), 1);
        let hit = c.lookup("https://EXAMPLE.com/a", 3_000).unwrap();
        assert_eq!(hit.score, 20);
    }

    #[test]
    fn read_past_ttl_misses_and_evicts() {
        let mut c = cache();
        c.add("https://example.com/", record(80), 0);
        assert!(c.lookup("https://example.com/", TTL).is_some());
        assert!(c.lookup("https://example.com/", TTL + 1).is_none());
        assert_eq!(c.len(), 0, "eviction happens on the discovering read");
    }

    #[test]
    fn allowlist_short_circuits_regardless_of_cache() {
        let mut c = cache();
        c.add("https://docs.rs/serde", record(10), 0);
        let hit = c.lookup("https://docs.rs/serde", 1).unwrap();
        assert!(hit.is_productive);
        assert_eq!(hit.score, 100);
        assert_eq!(hit.source, SOURCE_ALLOWLIST);
    }

    #[test]
    fn denylist_short_circuits_with_zero_score() {
        let mut c = cache();
        let hit = c.lookup("https://www.clickbait.example/feed", 1).unwrap();
        assert!(!hit.is_productive);
        assert_eq!(hit.score, 0);
        assert_eq!(hit.source, SOURCE_DENYLIST);
    }

    #[test]
    fn sweep_flushes_only_when_something_was_evicted() {
        let mut c = cache();
        c.add("https://example.com/", record(80), 0);
        assert!(c.tick(2_000), "debounced add flush");
        c.flush_payload(2_000);

        // Sweep with nothing expired: no flush.
        assert!(!c.tick(31 * 60 * 1000));

        // Sweep after TTL: eviction, then a flush once the debounce allows.
        let late = TTL + 62 * 60 * 1000;
        c.tick(late);
        assert_eq!(c.len(), 0);
        assert!(c.tick(late + 2_000));
    }

    #[test]
    fn flush_debounce_bounds_staleness() {
        let mut c = cache();
        c.add("https://example.com/", record(80), 0);
        assert!(c.tick(0), "first flush is immediate");
        c.flush_payload(0);

        c.add("https://example.com/b", record(60), 500);
        assert!(!c.tick(1_999));
        assert!(c.tick(2_000), "delayed to the window, not beyond it");
    }

    #[test]
    fn failed_flush_leaves_memory_authoritative() {
        let mut c = cache();
        c.add("https://example.com/", record(80), 0);
        assert!(c.tick(0));
        let _ = c.flush_payload(0);
        c.flush_failed();
        assert!(c.lookup("https://example.com/", 1).is_some());
        // Next add re-arms persistence.
        c.add("https://example.com/b", record(70), 10);
        assert!(c.tick(2_010));
    }

    #[test]
    fn restore_skips_malformed_entries() {
        let mut c = cache();
        c.restore(json!({
            "https://good.example/": {
                "normalized_url": "https://good.example/",
                "is_productive": true,
                "score": 90,
                "created_at_ms": 0,
                "source": "Oracle"
            },
            "https://bad.example/": {"score": "ninety"}
        }));
        assert_eq!(c.len(), 1);
        assert!(c.lookup("https://good.example/", 1).is_some());
    }

    #[test]
    fn clear_empties_and_schedules_flush() {
        let mut c = cache();
        c.add("https://example.com/", record(80), 0);
        c.clear(1);
        assert!(c.is_empty());
        assert!(c.tick(2_001));
    }
}
