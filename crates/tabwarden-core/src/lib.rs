//! # Tabwarden Core Library
//!
//! This library provides the core logic for Tabwarden: it classifies the
//! browsing target currently being observed as productive or not, tracks
//! dwell time per classification, and can enforce a blocking policy after
//! sustained non-productive dwell. The CLI binary and any GUI shell are
//! thin layers over this crate.
//!
//! ## Architecture
//!
//! - **Session Manager**: A caller-ticked aggregate -- the host pushes tab
//!   and focus events and invokes `tick()` about once a second
//! - **Classification Cache**: TTL-bounded URL map with debounced
//!   persistence through a single-flight store adapter
//! - **Classification Dispatcher**: Calls the external oracle under a daily
//!   quota and local timeout; every outcome becomes a terminal verdict
//! - **Enforcement**: Per-URL accumulated unproductive dwell with blocking
//!   and manual overrides
//!
//! ## Key Components
//!
//! - [`SessionManager`]: Aggregate root and exposed API surface
//! - [`ClassificationCache`]: URL classification storage
//! - [`EnforcementEngine`]: Blocking state machine
//! - [`ClassificationOracle`]: Trait for the external classification service

pub mod cache;
pub mod clock;
pub mod dispatch;
pub mod enforcement;
pub mod error;
pub mod events;
pub mod manager;
pub mod oracle;
pub mod overrides;
pub mod quota;
pub mod session;
pub mod stats;
pub mod status;
pub mod storage;
pub mod timing;
pub mod urls;

pub use cache::{ClassificationCache, ClassificationRecord};
pub use clock::{Clock, FakeClock, SystemClock};
pub use dispatch::Dispatcher;
pub use enforcement::{EnforcementEngine, EnforcementPhase, Navigator};
pub use error::{ConfigError, CoreError, OracleError, StoreError};
pub use events::{Event, HostEvent};
pub use manager::SessionManager;
pub use oracle::{ClassificationOracle, HttpOracle, OracleReply, OracleRequest};
pub use overrides::OverrideState;
pub use quota::DailyQuota;
pub use session::{DisplayState, SessionState};
pub use stats::StatsSnapshot;
pub use status::StatusIcon;
pub use storage::{Config, KeyValueStore, MemoryStore, SqliteStore, StoreAdapter};
