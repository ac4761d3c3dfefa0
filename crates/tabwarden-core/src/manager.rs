//! Session manager.
//!
//! The aggregate root. Owns the cache, tracker, quota, overrides,
//! enforcement engine and the in-flight dispatch slot; every component
//! receives time from the shared clock and persistence goes through the
//! single-flight store adapter.
//!
//! No internal threads: the host pushes [`HostEvent`]s and calls
//! [`SessionManager::tick`] periodically (about once a second). All state
//! mutation happens synchronously inside those calls; suspension points are
//! only the store and oracle boundaries.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::cache::{ClassificationCache, ClassificationRecord, SOURCE_ORACLE};
use crate::clock::Clock;
use crate::dispatch::{Dispatcher, SingleFlight};
use crate::enforcement::{BlockAction, EnforcementEngine, Navigator};
use crate::events::{Event, HostEvent};
use crate::oracle::{ClassificationOracle, OracleRequest};
use crate::overrides::{OverrideRegistry, OverrideState};
use crate::quota::DailyQuota;
use crate::session::{SessionState, SessionTracker, TickOutcome};
use crate::stats::{StatsBook, StatsSnapshot};
use crate::status::{self, StatusIcon};
use crate::storage::{Config, KeyValueStore, StoreAdapter};
use crate::timing::PeriodicInterval;
use crate::urls;

/// Store keys for persisted state.
pub mod keys {
    pub const CACHE: &str = "classification_cache";
    pub const QUOTA: &str = "daily_quota";
    pub const ENFORCEMENT: &str = "enforcement";
    pub const STATS: &str = "domain_stats";
    pub const OVERRIDES: &str = "overrides";
    pub const USER_BLOCKED: &str = "user_blocked_domains";
}

/// Cadence for persisting the non-cache runtime state.
const RUNTIME_PERSIST_MS: u64 = 10_000;

pub struct SessionManager {
    config: Config,
    clock: Arc<dyn Clock>,
    store: StoreAdapter,
    cache: ClassificationCache,
    tracker: SessionTracker,
    stats: StatsBook,
    quota: DailyQuota,
    overrides: OverrideRegistry,
    enforcement: EnforcementEngine,
    dispatcher: Dispatcher,
    inflight: SingleFlight,
    navigator: Arc<dyn Navigator>,
    user_blocked: Vec<String>,
    persist: PeriodicInterval,
}

impl SessionManager {
    pub fn new(
        config: Config,
        store: Box<dyn KeyValueStore>,
        oracle: Arc<dyn ClassificationOracle>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = ClassificationCache::new(
            config.ttl_ms(),
            config.cache.flush_debounce_ms,
            config.sweep_interval_ms(),
            config.domains.always_productive.clone(),
            config.domains.always_non_productive.clone(),
        );
        let tracker = SessionTracker::new(
            config.tracking.max_tick_gap_ms,
            config.tracking.analysis_trigger_ms,
        );
        let dispatcher = Dispatcher::new(
            oracle,
            config.oracle.timeout_ms,
            config.oracle.productivity_threshold,
            config.oracle.quota_default_productive,
        );
        let quota = DailyQuota::new(config.oracle.daily_quota, clock.date_key());
        let enforcement =
            EnforcementEngine::new(config.enforcement.enabled, config.enforcement.block_delay_ms);
        let user_blocked = config.domains.user_blocked.clone();

        Self {
            config,
            clock,
            store: StoreAdapter::new(store),
            cache,
            tracker,
            stats: StatsBook::default(),
            quota,
            overrides: OverrideRegistry::default(),
            enforcement,
            dispatcher,
            inflight: SingleFlight::default(),
            navigator,
            user_blocked,
            persist: PeriodicInterval::new(RUNTIME_PERSIST_MS),
        }
    }

    /// Load persisted state. Missing or malformed values fall back to the
    /// constructor defaults.
    pub async fn restore(&mut self) {
        let wanted: Vec<String> = [
            keys::CACHE,
            keys::QUOTA,
            keys::ENFORCEMENT,
            keys::STATS,
            keys::OVERRIDES,
            keys::USER_BLOCKED,
        ]
        .iter()
        .map(|k| k.to_string())
        .collect();

        let mut values = match self.store.get(&wanted).await {
            Ok(values) => values,
            Err(e) => {
                log::warn!("restore failed, starting from defaults: {e}");
                return;
            }
        };
        if let Some(v) = values.remove(keys::CACHE) {
            self.cache.restore(v);
        }
        if let Some(v) = values.remove(keys::QUOTA) {
            self.quota.restore(v);
        }
        if let Some(v) = values.remove(keys::ENFORCEMENT) {
            self.enforcement.restore(v);
        }
        if let Some(v) = values.remove(keys::STATS) {
            self.stats.restore(v);
        }
        if let Some(v) = values.remove(keys::OVERRIDES) {
            self.overrides.restore(v);
        }
        if let Some(v) = values.remove(keys::USER_BLOCKED) {
            if let Ok(list) = serde_json::from_value::<Vec<String>>(v) {
                self.user_blocked = list;
            }
        }
        log::info!(
            "restored state: {} cached classifications, quota {}/{} for {}",
            self.cache.len(),
            self.quota.used,
            self.quota.used + self.quota.remaining(),
            self.quota.date_key
        );
    }

    // ── Host events ──────────────────────────────────────────────────

    pub async fn handle_event(&mut self, event: HostEvent) -> Vec<Event> {
        let mut events = Vec::new();
        match event {
            HostEvent::TabActivated { tab_id, url, title } => {
                self.target_changed(tab_id, url, title, &mut events);
            }
            HostEvent::TabUpdated { tab_id, url, title } => {
                let tracks_tab = self
                    .tracker
                    .current()
                    .is_none_or(|c| c.tab_id == tab_id);
                match (url, title) {
                    (Some(url), title) if tracks_tab => {
                        let title = title.unwrap_or_else(|| {
                            self.tracker
                                .current()
                                .map(|c| c.title.clone())
                                .unwrap_or_default()
                        });
                        self.target_changed(tab_id, url, title, &mut events);
                    }
                    (None, Some(title)) if tracks_tab => {
                        self.tracker.update_title(title);
                    }
                    // Updates for tabs we are not observing are ignored.
                    _ => {}
                }
            }
            HostEvent::WindowFocusChanged { focused } => {
                self.tracker.set_window_focused(focused);
            }
            HostEvent::TabVisibilityChanged { visible } => {
                self.tracker.set_tab_visible(visible);
            }
        }
        events
    }

    fn target_changed(&mut self, tab_id: i64, url: String, title: String, events: &mut Vec<Event>) {
        let now = self.clock.now_ms();
        let same_target = self
            .tracker
            .current()
            .is_some_and(|c| c.tab_id == tab_id && c.url == url);
        if same_target {
            self.tracker.update_title(title);
            return;
        }

        // Flush the partial dwell since the last tick into the outgoing
        // target's buckets before replacing it.
        if let TickOutcome::Dwell { elapsed_ms } = self.tracker.tick(now) {
            if let Some(prev) = self.tracker.current().cloned() {
                self.stats
                    .record_dwell(&prev.domain, elapsed_ms, prev.is_productive, prev.score);
                self.enforcement.flush_partial(elapsed_ms);
            }
        }

        let resolved = self.resolve_local(&url, now);
        self.tracker
            .set_target(tab_id, url.clone(), title, resolved.as_ref(), now);

        let domain = urls::domain_of(&url);
        events.push(Event::TargetChanged {
            tab_id,
            url: url.clone(),
            domain,
            at: Utc::now(),
        });

        match &resolved {
            Some(record) => {
                events.push(Event::ClassificationResolved {
                    url: url.clone(),
                    is_productive: record.is_productive,
                    score: record.score,
                    source: record.source.clone(),
                    at: Utc::now(),
                });
                let has_productive_override =
                    matches!(self.overrides.get(&url), Some(OverrideState::Productive));
                self.enforcement.observe_target(
                    Some(&url),
                    record.is_productive,
                    has_productive_override,
                    now,
                );
            }
            None => {
                events.push(Event::AnalysisStarted {
                    url: url.clone(),
                    at: Utc::now(),
                });
                // No dwell is charged and nothing accumulates while the
                // verdict is pending.
                self.enforcement.observe_target(None, false, false, now);
            }
        }
    }

    /// Local resolution: overrides outrank the cache, which already
    /// consults the allow/deny lists before its map.
    fn resolve_local(&mut self, url: &str, now_ms: u64) -> Option<ClassificationRecord> {
        if let Some(state) = self.overrides.get(url) {
            return Some(Dispatcher::manual_record(url, state, now_ms));
        }
        self.cache.lookup(url, now_ms)
    }

    // ── Periodic tick ────────────────────────────────────────────────

    /// Advance the whole core by one tick. Call roughly once a second.
    pub async fn tick(&mut self) -> Vec<Event> {
        let mut events = Vec::new();

        // Collect a finished classification before accounting dwell, so the
        // verdict applies from this tick onward.
        if let Some((url, _tab_id, record)) = self.inflight.harvest().await {
            self.finish_classification(url, record, &mut events).await;
        }

        let today = self.clock.date_key();
        if self.quota.roll(&today) {
            self.persist_quota().await;
        }

        let now = self.clock.now_ms();
        match self.tracker.tick(now) {
            TickOutcome::Dwell { elapsed_ms } => {
                if let Some(cur) = self.tracker.current().cloned() {
                    self.stats
                        .record_dwell(&cur.domain, elapsed_ms, cur.is_productive, cur.score);
                    if let Some(action) = self.enforcement.dwell_tick(elapsed_ms, &cur.title, now) {
                        self.execute_block(cur.tab_id, action, &mut events);
                    }
                }
            }
            TickOutcome::Analyzing { trigger: Some(url) } => {
                self.begin_dispatch(url, &mut events).await;
            }
            TickOutcome::GapDropped { elapsed_ms } => {
                log::debug!("dropped implausible tick gap of {elapsed_ms}ms");
            }
            _ => {}
        }

        if self.cache.tick(now) {
            let payload = self.cache.flush_payload(now);
            if let Err(e) = self.store.set_one(keys::CACHE, payload).await {
                log::warn!("cache flush failed, keeping in-memory state: {e}");
                self.cache.flush_failed();
            }
        }

        if self.persist.due(now) {
            self.persist.mark(now);
            self.persist_runtime().await;
        }

        events
    }

    async fn begin_dispatch(&mut self, url: String, events: &mut Vec<Event>) {
        let now = self.clock.now_ms();

        // Overrides are authoritative and free.
        if let Some(state) = self.overrides.get(&url) {
            let record = Dispatcher::manual_record(&url, state, now);
            self.apply_terminal(&url, record, events);
            return;
        }

        let today = self.clock.date_key();
        self.quota.roll(&today);
        if self.quota.exhausted() {
            events.push(Event::QuotaExhausted {
                date_key: today,
                at: Utc::now(),
            });
            let domain = urls::domain_of(&url);
            let record = self
                .dispatcher
                .quota_fallback(&url, &domain, &self.user_blocked, now);
            self.apply_terminal(&url, record, events);
            return;
        }

        if self.inflight.pending_url().is_some() {
            // One dispatch at a time; the tracker's own guard makes this a
            // target-switched-mid-flight case.
            return;
        }

        // Count the call and persist the counter with its date key before
        // the request goes out, so a crash mid-call cannot exceed quota.
        self.quota.consume();
        self.persist_quota().await;

        let (title, tab_id) = self
            .tracker
            .current()
            .map(|c| (c.title.clone(), c.tab_id))
            .unwrap_or_default();
        let request = OracleRequest {
            title,
            url: url.clone(),
            domain: urls::domain_of(&url),
            content: None,
        };
        log::debug!("dispatching classification for {url}");
        let handle = self.dispatcher.spawn_classify(request);
        self.inflight.begin(url, tab_id, handle);
    }

    async fn finish_classification(
        &mut self,
        url: String,
        record: ClassificationRecord,
        events: &mut Vec<Event>,
    ) {
        let now = self.clock.now_ms();
        // Only oracle verdicts are worth a 7-day cache entry; synthesized
        // failure records stay session-local.
        if record.source == SOURCE_ORACLE {
            self.cache.add(&url, record.clone(), now);
        }
        self.apply_terminal(&url, record, events);
    }

    /// Apply a terminal classification: update the session if it still
    /// tracks this URL (late responses are not displayed) and re-evaluate
    /// enforcement.
    fn apply_terminal(&mut self, url: &str, record: ClassificationRecord, events: &mut Vec<Event>) {
        let now = self.clock.now_ms();
        let key = urls::normalize(url);
        let still_tracked = self
            .tracker
            .current()
            .is_some_and(|c| urls::normalize(&c.url) == key);

        if still_tracked {
            self.tracker.apply_classification(&record);
            if record.is_productive {
                self.enforcement.note_productive(url);
            }
            let has_productive_override =
                matches!(self.overrides.get(url), Some(OverrideState::Productive));
            self.enforcement.observe_target(
                Some(url),
                record.is_productive,
                has_productive_override,
                now,
            );
        }

        events.push(Event::ClassificationResolved {
            url: url.to_string(),
            is_productive: record.is_productive,
            score: record.score,
            source: record.source,
            at: Utc::now(),
        });
    }

    fn execute_block(&mut self, tab_id: i64, action: BlockAction, events: &mut Vec<Event>) {
        let target = format!(
            "{}?from={}",
            self.config.enforcement.block_page,
            urlencoding::encode(&action.url)
        );
        if let Err(e) = self.navigator.redirect(tab_id, &target) {
            log::warn!("block redirect for {} failed: {e}", action.url);
        }
        self.tracker.mark_blocked();
        events.push(Event::TargetBlocked {
            tab_id,
            url: action.url,
            accumulated_ms: action.accumulated_ms,
            at: Utc::now(),
        });
    }

    // ── Exposed surface ──────────────────────────────────────────────

    pub fn current_target(&self) -> Option<SessionState> {
        self.tracker.current().cloned()
    }

    pub fn status_icon(&self) -> StatusIcon {
        status::project(self.tracker.current())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.cache.len())
    }

    pub fn quota(&self) -> &DailyQuota {
        &self.quota
    }

    pub fn enforcement_enabled(&self) -> bool {
        self.enforcement.enabled()
    }

    pub fn block_registry_size(&self) -> usize {
        self.enforcement.registry().len()
    }

    /// Point-in-time snapshot event for polling UIs.
    pub fn snapshot(&self) -> Option<Event> {
        self.tracker.current().map(|c| Event::StateSnapshot {
            url: c.url.clone(),
            display: c.display,
            is_productive: c.is_productive,
            score: c.score,
            at: Utc::now(),
        })
    }

    pub async fn reset_stats(&mut self) -> Vec<Event> {
        self.stats.reset();
        self.persist_runtime().await;
        vec![Event::StatsReset { at: Utc::now() }]
    }

    pub async fn clear_cache(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        self.cache.clear(now);
        vec![Event::CacheCleared { at: Utc::now() }]
    }

    pub async fn set_enforcement(&mut self, enabled: bool) -> Vec<Event> {
        let now = self.clock.now_ms();
        self.enforcement.set_enabled(enabled);
        if let Some(cur) = self.tracker.current().cloned() {
            let has_productive_override =
                matches!(self.overrides.get(&cur.url), Some(OverrideState::Productive));
            let target = (!cur.is_analyzing).then_some(cur.url.as_str());
            self.enforcement
                .observe_target(target, cur.is_productive, has_productive_override, now);
        }
        self.persist_runtime().await;
        vec![Event::EnforcementChanged {
            enabled,
            at: Utc::now(),
        }]
    }

    /// Set a manual override. Applies immediately when the URL is the
    /// current target.
    pub async fn set_override(&mut self, url: &str, state: OverrideState) -> Vec<Event> {
        let mut events = Vec::new();
        self.overrides.set(url, state);
        let now = self.clock.now_ms();
        let record = Dispatcher::manual_record(url, state, now);
        self.apply_terminal(url, record, &mut events);
        self.persist_runtime().await;
        events
    }

    /// Remove a manual override; the next lookup for the URL falls through
    /// to cache/oracle resolution as if it never existed.
    pub async fn remove_override(&mut self, url: &str) -> Vec<Event> {
        self.overrides.remove(url);
        self.persist_runtime().await;
        Vec::new()
    }

    pub async fn set_user_blocked_domains(&mut self, domains: Vec<String>) {
        self.user_blocked = domains;
        self.persist_runtime().await;
    }

    // ── Persistence ──────────────────────────────────────────────────

    async fn persist_quota(&mut self) {
        if let Err(e) = self.store.set_one(keys::QUOTA, self.quota.to_value()).await {
            log::warn!("quota persist failed: {e}");
        }
    }

    async fn persist_runtime(&mut self) {
        let entries: HashMap<String, Value> = HashMap::from([
            (keys::ENFORCEMENT.to_string(), self.enforcement.to_value()),
            (keys::STATS.to_string(), self.stats.to_value()),
            (keys::OVERRIDES.to_string(), self.overrides.to_value()),
            (
                keys::USER_BLOCKED.to_string(),
                serde_json::to_value(&self.user_blocked).unwrap_or(Value::Null),
            ),
        ]);
        if let Err(e) = self.store.set(entries).await {
            log::warn!("runtime persist failed, in-memory state stays authoritative: {e}");
        }
    }
}
