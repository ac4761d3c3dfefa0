//! Enforcement state machine.
//!
//! Per-URL accumulated unproductive dwell, with blocking after a sustained
//! threshold. The accumulator is keyed by normalized URL so switching away
//! and back resumes rather than restarts; switching to a different URL
//! pauses (does not reset) the previous URL's bucket.
//!
//! ## Phases
//!
//! ```text
//! Idle -> Accumulating -> Blocked
//!   any -> Idle on: productive reclassification, productive override,
//!                   or enforcement disabled (clears the block registry)
//! ```
//!
//! Accumulation resets to zero only on: manual override to productive,
//! reclassification to productive, or a successful block.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::urls;

/// Host navigation action, used only to redirect a blocked tab.
pub trait Navigator: Send + Sync {
    fn redirect(&self, tab_id: i64, target_url: &str) -> Result<(), Box<dyn std::error::Error>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementPhase {
    Idle,
    Accumulating,
    Blocked,
}

/// One active block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEntry {
    pub id: String,
    pub blocked_at_ms: u64,
    pub title: String,
}

/// A block decision for the owner to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAction {
    pub url: String,
    pub accumulated_ms: u64,
}

/// Persisted portion of the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedEnforcement {
    enabled: bool,
    per_url_ms: HashMap<String, u64>,
    #[serde(default)]
    unproductive_started_at_ms: Option<u64>,
    registry: HashMap<String, BlockEntry>,
}

pub struct EnforcementEngine {
    enabled: bool,
    block_delay_ms: u64,
    per_url_ms: HashMap<String, u64>,
    active_url: Option<String>,
    unproductive_started_at_ms: Option<u64>,
    phase: EnforcementPhase,
    registry: HashMap<String, BlockEntry>,
}

impl EnforcementEngine {
    pub fn new(enabled: bool, block_delay_ms: u64) -> Self {
        Self {
            enabled,
            block_delay_ms,
            per_url_ms: HashMap::new(),
            active_url: None,
            unproductive_started_at_ms: None,
            phase: EnforcementPhase::Idle,
            registry: HashMap::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn phase(&self) -> EnforcementPhase {
        self.phase
    }

    pub fn accumulated_for(&self, url: &str) -> u64 {
        self.per_url_ms
            .get(&urls::normalize(url))
            .copied()
            .unwrap_or(0)
    }

    pub fn registry(&self) -> &HashMap<String, BlockEntry> {
        &self.registry
    }

    /// Re-evaluate the phase for the current target. Pauses the previous
    /// URL's accumulator when the target moved elsewhere.
    pub fn observe_target(
        &mut self,
        url: Option<&str>,
        is_productive: bool,
        has_productive_override: bool,
        now_ms: u64,
    ) {
        let qualifying_url = match url {
            Some(u) if self.enabled && !is_productive && !has_productive_override => u,
            _ => {
                self.active_url = None;
                self.unproductive_started_at_ms = None;
                self.phase = EnforcementPhase::Idle;
                return;
            }
        };

        let key = urls::normalize(qualifying_url);
        if self.active_url.as_deref() != Some(key.as_str()) {
            self.active_url = Some(key);
            self.unproductive_started_at_ms = Some(now_ms);
        }
        self.phase = EnforcementPhase::Accumulating;
    }

    /// Charge one qualifying dwell tick to the active URL. Returns the
    /// block decision when the threshold is crossed.
    pub fn dwell_tick(&mut self, elapsed_ms: u64, title: &str, now_ms: u64) -> Option<BlockAction> {
        if !self.enabled || self.phase != EnforcementPhase::Accumulating {
            return None;
        }
        let url = self.active_url.clone()?;
        let bucket = self.per_url_ms.entry(url.clone()).or_insert(0);
        *bucket += elapsed_ms;
        let accumulated_ms = *bucket;
        if accumulated_ms <= self.block_delay_ms {
            return None;
        }

        // Block: register, zero the accumulator, stop accumulating.
        self.per_url_ms.insert(url.clone(), 0);
        self.registry.insert(
            url.clone(),
            BlockEntry {
                id: Uuid::new_v4().to_string(),
                blocked_at_ms: now_ms,
                title: title.to_string(),
            },
        );
        self.phase = EnforcementPhase::Blocked;
        self.active_url = None;
        self.unproductive_started_at_ms = None;
        log::info!("blocking {url} after {accumulated_ms}ms of unproductive dwell");
        Some(BlockAction {
            url,
            accumulated_ms,
        })
    }

    /// Enable or disable enforcement. Disabling forgives all prior blocks.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.registry.clear();
            self.phase = EnforcementPhase::Idle;
            self.active_url = None;
            self.unproductive_started_at_ms = None;
        }
    }

    /// Charge elapsed dwell to the active URL without evaluating the block
    /// threshold. Used when the target is replaced mid-tick: the delta
    /// lands in the outgoing URL's bucket and the bucket pauses.
    pub fn flush_partial(&mut self, elapsed_ms: u64) {
        if self.phase != EnforcementPhase::Accumulating {
            return;
        }
        if let Some(url) = &self.active_url {
            *self.per_url_ms.entry(url.clone()).or_insert(0) += elapsed_ms;
        }
    }

    /// The URL became productive (override or reclassification): zero its
    /// accumulator and stop accumulating it.
    pub fn note_productive(&mut self, url: &str) {
        let key = urls::normalize(url);
        self.per_url_ms.insert(key.clone(), 0);
        if self.active_url.as_deref() == Some(key.as_str()) {
            self.active_url = None;
            self.unproductive_started_at_ms = None;
            self.phase = EnforcementPhase::Idle;
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(PersistedEnforcement {
            enabled: self.enabled,
            per_url_ms: self.per_url_ms.clone(),
            unproductive_started_at_ms: self.unproductive_started_at_ms,
            registry: self.registry.clone(),
        })
        .unwrap_or(Value::Null)
    }

    /// Restore the persisted portion; runtime phase starts Idle.
    pub fn restore(&mut self, value: Value) {
        if let Ok(saved) = serde_json::from_value::<PersistedEnforcement>(value) {
            self.enabled = saved.enabled;
            self.per_url_ms = saved.per_url_ms;
            self.unproductive_started_at_ms = saved.unproductive_started_at_ms;
            self.registry = saved.registry;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: u64 = 30_000;
    const URL: &str = "https://feed.example/";

    fn engine() -> EnforcementEngine {
        let mut e = EnforcementEngine::new(true, DELAY);
        e.observe_target(Some(URL), false, false, 0);
        e
    }

    #[test]
    fn accumulates_only_past_the_delay() {
        let mut e = engine();
        for i in 1..=30 {
            assert!(e.dwell_tick(1_000, "Feed", i * 1_000).is_none());
        }
        assert_eq!(e.accumulated_for(URL), 30_000);
        let action = e.dwell_tick(1_000, "Feed", 31_000).expect("block fires");
        assert_eq!(action.accumulated_ms, 31_000);
        assert_eq!(e.phase(), EnforcementPhase::Blocked);
    }

    #[test]
    fn block_fires_exactly_once_and_zeroes_the_bucket() {
        let mut e = engine();
        e.dwell_tick(31_000, "Feed", 31_000).expect("block");
        assert_eq!(e.accumulated_for(URL), 0);
        assert!(e.dwell_tick(1_000, "Feed", 32_000).is_none());
        assert_eq!(e.registry().len(), 1);
    }

    #[test]
    fn switching_away_pauses_rather_than_resets() {
        let mut e = engine();
        e.dwell_tick(10_000, "Feed", 10_000);

        // Different non-productive URL gets its own bucket.
        e.observe_target(Some("https://other.example/"), false, false, 10_000);
        e.dwell_tick(5_000, "Other", 15_000);
        assert_eq!(e.accumulated_for(URL), 10_000);
        assert_eq!(e.accumulated_for("https://other.example/"), 5_000);

        // Coming back resumes the paused bucket.
        e.observe_target(Some(URL), false, false, 20_000);
        e.dwell_tick(21_000, "Feed", 41_000);
        assert_eq!(e.phase(), EnforcementPhase::Blocked);
    }

    #[test]
    fn productive_target_idles_without_resetting_others() {
        let mut e = engine();
        e.dwell_tick(10_000, "Feed", 10_000);
        e.observe_target(Some("https://docs.example/"), true, false, 10_000);
        assert_eq!(e.phase(), EnforcementPhase::Idle);
        assert!(e.dwell_tick(5_000, "Docs", 15_000).is_none());
        assert_eq!(e.accumulated_for(URL), 10_000);
    }

    #[test]
    fn productive_override_zeroes_the_accumulator() {
        let mut e = engine();
        e.dwell_tick(10_000, "Feed", 10_000);
        e.note_productive(URL);
        assert_eq!(e.accumulated_for(URL), 0);
        assert_eq!(e.phase(), EnforcementPhase::Idle);
    }

    #[test]
    fn disabling_clears_the_registry() {
        let mut e = engine();
        e.dwell_tick(31_000, "Feed", 31_000).expect("block");
        assert_eq!(e.registry().len(), 1);
        e.set_enabled(false);
        assert!(e.registry().is_empty());
        assert_eq!(e.phase(), EnforcementPhase::Idle);

        // Re-enabling starts a fresh cycle; accumulators were kept.
        e.set_enabled(true);
        e.observe_target(Some(URL), false, false, 40_000);
        assert!(e.dwell_tick(1_000, "Feed", 41_000).is_none());
    }

    #[test]
    fn disabled_engine_never_accumulates() {
        let mut e = EnforcementEngine::new(false, DELAY);
        e.observe_target(Some(URL), false, false, 0);
        assert!(e.dwell_tick(60_000, "Feed", 60_000).is_none());
        assert_eq!(e.accumulated_for(URL), 0);
    }

    #[test]
    fn persisted_state_roundtrips() {
        let mut e = engine();
        e.dwell_tick(10_000, "Feed", 10_000);
        let value = e.to_value();

        let mut back = EnforcementEngine::new(false, DELAY);
        back.restore(value);
        assert!(back.enabled());
        assert_eq!(back.accumulated_for(URL), 10_000);
        assert_eq!(back.phase(), EnforcementPhase::Idle);
    }
}
