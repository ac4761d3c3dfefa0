//! Session tracking.
//!
//! Holds the single "current target" being observed. A target change builds
//! a brand-new [`SessionState`] -- never an in-place mutation -- so a fast
//! double-navigation can't pair a stale domain with a new URL.
//!
//! Dwell advances only on qualifying ticks (window focused AND tab
//! visible). A tick whose elapsed gap is negative or implausibly large is
//! dropped and the timer resynchronized instead of charged to any bucket;
//! system sleep would otherwise bill hours to whatever page was open.

use serde::{Deserialize, Serialize};

use crate::cache::ClassificationRecord;

/// What the UI should show for the tracked target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayState {
    Pending,
    Productive,
    NonProductive,
    Blocked,
}

/// The current target. Exactly one live instance at a time; replaced
/// wholesale whenever the tracked tab or its URL changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub tab_id: i64,
    pub url: String,
    pub domain: String,
    pub title: String,
    pub started_at_ms: u64,
    pub last_tick_at_ms: Option<u64>,
    pub is_analyzing: bool,
    pub is_productive: bool,
    pub score: u8,
    pub categories: Vec<String>,
    pub explanation: String,
    pub display: DisplayState,
}

/// Dwell accrued while waiting for classification. Oracle latency lands
/// here, not in the productive/non-productive buckets.
#[derive(Debug, Clone)]
struct AnalysisTimer {
    url: String,
    accumulated_ms: u64,
    dispatched: bool,
}

/// Outcome of one tracker tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is being tracked.
    NoTarget,
    /// Window unfocused or tab hidden; the tick timer was parked.
    NotQualifying,
    /// First qualifying tick after a park or target change.
    Resynced,
    /// Elapsed gap failed the plausibility guard; dropped.
    GapDropped { elapsed_ms: u64 },
    /// Target is awaiting classification. `trigger` carries the URL when
    /// this tick crossed the dispatch threshold (at most once per target).
    Analyzing { trigger: Option<String> },
    /// Qualifying dwell on a classified target.
    Dwell { elapsed_ms: u64 },
}

pub struct SessionTracker {
    current: Option<SessionState>,
    analysis: Option<AnalysisTimer>,
    window_focused: bool,
    tab_visible: bool,
    max_gap_ms: u64,
    trigger_ms: u64,
}

impl SessionTracker {
    pub fn new(max_gap_ms: u64, trigger_ms: u64) -> Self {
        Self {
            current: None,
            analysis: None,
            window_focused: true,
            tab_visible: true,
            max_gap_ms,
            trigger_ms,
        }
    }

    pub fn current(&self) -> Option<&SessionState> {
        self.current.as_ref()
    }

    /// Replace the tracked target. `cached` is the cache/override resolution
    /// the owner already performed for the new URL.
    pub fn set_target(
        &mut self,
        tab_id: i64,
        url: String,
        title: String,
        cached: Option<&ClassificationRecord>,
        now_ms: u64,
    ) {
        let domain = crate::urls::domain_of(&url);
        let state = match cached {
            Some(record) => SessionState {
                tab_id,
                url: url.clone(),
                domain,
                title,
                started_at_ms: now_ms,
                last_tick_at_ms: None,
                is_analyzing: false,
                is_productive: record.is_productive,
                score: record.score,
                categories: record.categories.clone(),
                explanation: record.explanation.clone(),
                display: if record.is_productive {
                    DisplayState::Productive
                } else {
                    DisplayState::NonProductive
                },
            },
            None => SessionState {
                tab_id,
                url: url.clone(),
                domain,
                title,
                started_at_ms: now_ms,
                last_tick_at_ms: None,
                is_analyzing: true,
                is_productive: false,
                score: 0,
                categories: Vec::new(),
                explanation: String::new(),
                display: DisplayState::Pending,
            },
        };
        self.analysis = state.is_analyzing.then(|| AnalysisTimer {
            url,
            accumulated_ms: 0,
            dispatched: false,
        });
        self.current = Some(state);
    }

    pub fn clear_target(&mut self) {
        self.current = None;
        self.analysis = None;
    }

    pub fn update_title(&mut self, title: String) {
        if let Some(cur) = self.current.as_mut() {
            cur.title = title;
        }
    }

    pub fn set_window_focused(&mut self, focused: bool) {
        self.window_focused = focused;
    }

    pub fn set_tab_visible(&mut self, visible: bool) {
        self.tab_visible = visible;
    }

    /// Apply a terminal classification to the tracked target.
    pub fn apply_classification(&mut self, record: &ClassificationRecord) {
        if let Some(cur) = self.current.as_mut() {
            cur.is_analyzing = false;
            cur.is_productive = record.is_productive;
            cur.score = record.score;
            cur.categories = record.categories.clone();
            cur.explanation = record.explanation.clone();
            cur.display = if record.is_productive {
                DisplayState::Productive
            } else {
                DisplayState::NonProductive
            };
        }
        self.analysis = None;
    }

    /// The target was redirected away by enforcement.
    pub fn mark_blocked(&mut self) {
        if let Some(cur) = self.current.as_mut() {
            cur.display = DisplayState::Blocked;
        }
    }

    /// Advance dwell accounting by one tick.
    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        let Some(cur) = self.current.as_mut() else {
            return TickOutcome::NoTarget;
        };

        if !self.window_focused || !self.tab_visible {
            // Park the timer; the next qualifying tick resynchronizes
            // rather than charging the away time.
            cur.last_tick_at_ms = None;
            return TickOutcome::NotQualifying;
        }

        let Some(last) = cur.last_tick_at_ms else {
            cur.last_tick_at_ms = Some(now_ms);
            return TickOutcome::Resynced;
        };

        if now_ms < last {
            cur.last_tick_at_ms = Some(now_ms);
            return TickOutcome::GapDropped { elapsed_ms: 0 };
        }
        let elapsed_ms = now_ms - last;
        cur.last_tick_at_ms = Some(now_ms);
        if elapsed_ms > self.max_gap_ms {
            return TickOutcome::GapDropped { elapsed_ms };
        }

        if cur.is_analyzing {
            let trigger_ms = self.trigger_ms;
            let trigger = self.analysis.as_mut().and_then(|timer| {
                timer.accumulated_ms += elapsed_ms;
                (!timer.dispatched && timer.accumulated_ms >= trigger_ms).then(|| {
                    timer.dispatched = true;
                    timer.url.clone()
                })
            });
            return TickOutcome::Analyzing { trigger };
        }

        TickOutcome::Dwell { elapsed_ms }
    }
}
