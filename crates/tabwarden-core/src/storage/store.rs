//! Key-value store backends.
//!
//! The external contract is minimal: `get(keys) -> mapping` and
//! `set(partial mapping) -> ack`. No transactions, no compare-and-swap.
//! [`SqliteStore`] is the production backend; [`MemoryStore`] backs tests
//! and supports scripted failures.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::Value;

use crate::error::StoreError;

/// The slow external key-value store the adapter serializes access to.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the subset of `keys` that exist. Missing keys are simply
    /// absent from the result, not errors.
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>, StoreError>;

    /// Merge `entries` into the store. Keys not named are left untouched.
    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError>;
}

/// SQLite-backed store using a single `kv` table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut out = HashMap::new();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        for key in keys {
            let raw: Option<String> = stmt
                .query_row(params![key], |row| row.get(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(StoreError::from(other)),
                })?;
            if let Some(raw) = raw {
                match serde_json::from_str(&raw) {
                    Ok(value) => {
                        out.insert(key.clone(), value);
                    }
                    Err(e) => {
                        // A corrupt row reads as a miss, not a crash.
                        log::warn!("discarding malformed value for key {key}: {e}");
                    }
                }
            }
        }
        Ok(out)
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().expect("store mutex poisoned");
        let tx = conn.transaction()?;
        for (key, value) in &entries {
            let raw = serde_json::to_string(value)
                .map_err(|e| StoreError::Backend(format!("serialize {key}: {e}")))?;
            tx.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, raw],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// In-memory store for tests. `fail_next(n)` makes the next `n` operations
/// fail, exercising the adapter's retry path.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
    failures_remaining: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next `n` operations to fail.
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Direct snapshot of a stored value, bypassing the trait.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.data
            .lock()
            .expect("memory store mutex poisoned")
            .get(key)
            .cloned()
    }

    fn maybe_fail(&self) -> Result<(), StoreError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Backend("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>, StoreError> {
        self.maybe_fail()?;
        let data = self.data.lock().expect("memory store mutex poisoned");
        Ok(keys
            .iter()
            .filter_map(|k| data.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        self.maybe_fail()?;
        let mut data = self.data.lock().expect("memory store mutex poisoned");
        data.extend(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn sqlite_roundtrip_and_partial_get() {
        let store = SqliteStore::open_memory().unwrap();
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), json!({"x": 1}));
        entries.insert("b".to_string(), json!(true));
        store.set(entries).await.unwrap();

        let got = store.get(&keys(&["a", "missing"])).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["a"], json!({"x": 1}));
    }

    #[tokio::test]
    async fn sqlite_set_overwrites_named_keys_only() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .set(HashMap::from([
                ("a".to_string(), json!(1)),
                ("b".to_string(), json!(2)),
            ]))
            .await
            .unwrap();
        store
            .set(HashMap::from([("a".to_string(), json!(10))]))
            .await
            .unwrap();

        let got = store.get(&keys(&["a", "b"])).await.unwrap();
        assert_eq!(got["a"], json!(10));
        assert_eq!(got["b"], json!(2));
    }

    #[tokio::test]
    async fn sqlite_malformed_row_reads_as_miss() {
        let store = SqliteStore::open_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO kv (key, value) VALUES ('bad', 'not json {')",
                [],
            )
            .unwrap();
        }
        let got = store.get(&keys(&["bad"])).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn sqlite_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        {
            let store = SqliteStore::open(path.clone()).unwrap();
            store
                .set(HashMap::from([("k".to_string(), json!("v"))]))
                .await
                .unwrap();
        }
        let reopened = SqliteStore::open(path).unwrap();
        let got = reopened.get(&keys(&["k"])).await.unwrap();
        assert_eq!(got["k"], json!("v"));
    }

    #[tokio::test]
    async fn memory_store_failure_injection_is_consumed() {
        let store = MemoryStore::new();
        store.fail_next(1);
        assert!(store.get(&keys(&["a"])).await.is_err());
        assert!(store.get(&keys(&["a"])).await.is_ok());
    }
}
