//! TOML-based application configuration.
//!
//! Stores the core tunables:
//! - Cache TTL, flush debounce and sweep cadence
//! - Dwell tick gap guard and analysis trigger threshold
//! - Oracle endpoint, timeout, daily quota and productivity threshold
//! - Enforcement block delay and block page
//! - Domain allow/deny lists and the user's manual block list
//!
//! Configuration is stored at `~/.config/tabwarden/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;

/// Classification cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of a cached classification before it reads as a miss.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,
    /// Coalescing window for persisting cache writes.
    #[serde(default = "default_flush_debounce_ms")]
    pub flush_debounce_ms: u64,
    /// Cadence of the full TTL sweep.
    #[serde(default = "default_sweep_interval_min")]
    pub sweep_interval_min: u64,
}

/// Dwell tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Expected tick cadence for the owner loop.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Ticks with a larger elapsed gap are dropped and resynchronized
    /// (system sleep would otherwise charge hours to one bucket).
    #[serde(default = "default_max_tick_gap_ms")]
    pub max_tick_gap_ms: u64,
    /// Dwell on an unclassified target before the oracle is consulted.
    #[serde(default = "default_analysis_trigger_ms")]
    pub analysis_trigger_ms: u64,
}

/// Classification oracle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,
    /// Daily ceiling on oracle calls.
    #[serde(default = "default_daily_quota")]
    pub daily_quota: u32,
    /// Scores at or above this classify as productive.
    #[serde(default = "default_productivity_threshold")]
    pub productivity_threshold: u8,
    /// When the quota is exhausted, non-blocklisted domains default to
    /// productive at the threshold score. Tunable policy, not an invariant.
    #[serde(default = "default_true")]
    pub quota_default_productive: bool,
}

/// Enforcement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Accumulated non-productive dwell on one URL before blocking.
    #[serde(default = "default_block_delay_ms")]
    pub block_delay_ms: u64,
    /// Page the tab is redirected to; the original URL is appended
    /// percent-encoded as `?from=`.
    #[serde(default = "default_block_page")]
    pub block_page: String,
}

/// Domain lists consulted before cache and oracle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainsConfig {
    /// Substring matches classify productive without any oracle call.
    #[serde(default)]
    pub always_productive: Vec<String>,
    /// Substring matches classify non-productive without any oracle call.
    #[serde(default)]
    pub always_non_productive: Vec<String>,
    /// The user's manual block list; used by the quota fallback.
    #[serde(default)]
    pub user_blocked: Vec<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/tabwarden/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub enforcement: EnforcementConfig,
    #[serde(default)]
    pub domains: DomainsConfig,
}

// Default functions
fn default_ttl_days() -> u64 {
    7
}
fn default_flush_debounce_ms() -> u64 {
    2_000
}
fn default_sweep_interval_min() -> u64 {
    30
}
fn default_tick_interval_ms() -> u64 {
    1_000
}
fn default_max_tick_gap_ms() -> u64 {
    2 * 60 * 1000
}
fn default_analysis_trigger_ms() -> u64 {
    5_000
}
fn default_endpoint() -> String {
    "http://127.0.0.1:8787/classify".to_string()
}
fn default_oracle_timeout_ms() -> u64 {
    10_000
}
fn default_daily_quota() -> u32 {
    300
}
fn default_productivity_threshold() -> u8 {
    50
}
fn default_block_delay_ms() -> u64 {
    30_000
}
fn default_block_page() -> String {
    "about:blank#blocked".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
            flush_debounce_ms: default_flush_debounce_ms(),
            sweep_interval_min: default_sweep_interval_min(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_tick_gap_ms: default_max_tick_gap_ms(),
            analysis_trigger_ms: default_analysis_trigger_ms(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_oracle_timeout_ms(),
            daily_quota: default_daily_quota(),
            productivity_threshold: default_productivity_threshold(),
            quota_default_productive: default_true(),
        }
    }
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            block_delay_ms: default_block_delay_ms(),
            block_page: default_block_page(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            tracking: TrackingConfig::default(),
            oracle: OracleConfig::default(),
            enforcement: EnforcementConfig::default(),
            domains: DomainsConfig::default(),
        }
    }
}

impl Config {
    /// Path to the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/tabwarden"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, falling back to defaults when the file is absent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Save to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, raw).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    pub fn ttl_ms(&self) -> u64 {
        self.cache.ttl_days * 24 * 60 * 60 * 1000
    }

    pub fn sweep_interval_ms(&self) -> u64 {
        self.cache.sweep_interval_min * 60 * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_documented_values() {
        let c = Config::default();
        assert_eq!(c.cache.ttl_days, 7);
        assert_eq!(c.cache.flush_debounce_ms, 2_000);
        assert_eq!(c.tracking.analysis_trigger_ms, 5_000);
        assert_eq!(c.tracking.max_tick_gap_ms, 120_000);
        assert_eq!(c.oracle.daily_quota, 300);
        assert_eq!(c.oracle.productivity_threshold, 50);
        assert_eq!(c.enforcement.block_delay_ms, 30_000);
        assert!(!c.enforcement.enabled);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c: Config = toml::from_str(
            r#"
            [oracle]
            daily_quota = 50

            [domains]
            always_productive = ["docs.rs"]
            "#,
        )
        .unwrap();
        assert_eq!(c.oracle.daily_quota, 50);
        assert_eq!(c.oracle.timeout_ms, 10_000);
        assert_eq!(c.domains.always_productive, vec!["docs.rs".to_string()]);
        assert_eq!(c.cache.ttl_days, 7);
    }

    #[test]
    fn roundtrips_through_toml() {
        let mut c = Config::default();
        c.enforcement.enabled = true;
        c.domains.user_blocked = vec!["x.com".to_string()];
        let raw = toml::to_string_pretty(&c).unwrap();
        let back: Config = toml::from_str(&raw).unwrap();
        assert!(back.enforcement.enabled);
        assert_eq!(back.domains.user_blocked, vec!["x.com".to_string()]);
    }
}
