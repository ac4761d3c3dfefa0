//! Host input events and emitted core events.
//!
//! The host (browser shell, desktop agent, test harness) pushes [`HostEvent`]s
//! into the manager; every observable state change the core makes comes back
//! out as an [`Event`]. Both are closed unions -- adding a variant is a
//! compile-time-checked change at every match site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::DisplayState;

/// Push notifications from the host event source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostEvent {
    TabActivated {
        tab_id: i64,
        url: String,
        title: String,
    },
    TabUpdated {
        tab_id: i64,
        url: Option<String>,
        title: Option<String>,
    },
    WindowFocusChanged {
        focused: bool,
    },
    TabVisibilityChanged {
        visible: bool,
    },
}

/// Every state change in the core produces an Event.
/// UI layers poll for these; they are also the unit tests' observation point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The tracked target was replaced (tab switch or in-tab navigation).
    TargetChanged {
        tab_id: i64,
        url: String,
        domain: String,
        at: DateTime<Utc>,
    },
    /// A cache miss armed the analysis timer for the new target.
    AnalysisStarted {
        url: String,
        at: DateTime<Utc>,
    },
    /// The target reached a terminal classification (oracle, cache,
    /// override, fallback or error-derived).
    ClassificationResolved {
        url: String,
        is_productive: bool,
        score: u8,
        source: String,
        at: DateTime<Utc>,
    },
    /// The daily oracle budget ran out; fallback policy applied.
    QuotaExhausted {
        date_key: String,
        at: DateTime<Utc>,
    },
    /// Enforcement redirected the tab away from the target.
    TargetBlocked {
        tab_id: i64,
        url: String,
        accumulated_ms: u64,
        at: DateTime<Utc>,
    },
    /// Enforcement was switched on or off.
    EnforcementChanged {
        enabled: bool,
        at: DateTime<Utc>,
    },
    StatsReset {
        at: DateTime<Utc>,
    },
    CacheCleared {
        at: DateTime<Utc>,
    },
    /// Point-in-time view of the tracked target.
    StateSnapshot {
        url: String,
        display: DisplayState,
        is_productive: bool,
        score: u8,
        at: DateTime<Utc>,
    },
}
