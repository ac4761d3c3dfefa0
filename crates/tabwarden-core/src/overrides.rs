//! Manual classification overrides.
//!
//! A set override outranks cache and oracle results on every lookup for
//! that URL. Removing it makes the next lookup fall through to the normal
//! resolution path as if it never existed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::urls;

/// User-set classification for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideState {
    Productive,
    NonProductive,
}

#[derive(Debug, Clone, Default)]
pub struct OverrideRegistry {
    entries: HashMap<String, OverrideState>,
}

impl OverrideRegistry {
    pub fn get(&self, url: &str) -> Option<OverrideState> {
        self.entries.get(&urls::normalize(url)).copied()
    }

    pub fn set(&mut self, url: &str, state: OverrideState) {
        self.entries.insert(urls::normalize(url), state);
    }

    pub fn remove(&mut self, url: &str) -> Option<OverrideState> {
        self.entries.remove(&urls::normalize(url))
    }

    pub fn entries(&self) -> &HashMap<String, OverrideState> {
        &self.entries
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.entries).unwrap_or(Value::Null)
    }

    pub fn restore(&mut self, value: Value) {
        if let Ok(entries) = serde_json::from_value(value) {
            self.entries = entries;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_through_normalized_keys() {
        let mut reg = OverrideRegistry::default();
        reg.set("https://Example.com/a", OverrideState::Productive);
        assert_eq!(
            reg.get("https://example.COM/a"),
            Some(OverrideState::Productive)
        );
        assert_eq!(
            reg.remove("https://example.com/a"),
            Some(OverrideState::Productive)
        );
        assert_eq!(reg.get("https://example.com/a"), None);
    }

    #[test]
    fn roundtrips_through_value() {
        let mut reg = OverrideRegistry::default();
        reg.set("https://example.com/", OverrideState::NonProductive);
        let mut back = OverrideRegistry::default();
        back.restore(reg.to_value());
        assert_eq!(
            back.get("https://example.com/"),
            Some(OverrideState::NonProductive)
        );
    }
}
