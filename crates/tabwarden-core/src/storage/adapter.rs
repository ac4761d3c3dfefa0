//! Persistent store adapter.
//!
//! Serializes every read and write through a single FIFO so at most one
//! backend operation runs at a time -- two overlapping writes can otherwise
//! produce a torn merge of unrelated keys. Each operation retries with
//! exponential backoff and random jitter; after the attempts are exhausted
//! the caller gets the failure and in-memory state stays authoritative for
//! the rest of the session.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::storage::store::KeyValueStore;

/// Retry behavior for a single queued operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per operation (first try included).
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `base * 2^n * jitter`.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay for a 0-indexed attempt, jittered by [0.8, 1.2].
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * 2f64.powi(attempt as i32);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis((base * jitter) as u64)
    }
}

/// FIFO, retrying front for a [`KeyValueStore`].
///
/// The tokio mutex is fair: waiters acquire in request order, which is what
/// gives queued operations their program-order side effects. Retries happen
/// inside the held slot, so a struggling operation never interleaves with
/// the next one in the queue.
pub struct StoreAdapter {
    store: Box<dyn KeyValueStore>,
    queue: Mutex<()>,
    policy: RetryPolicy,
}

impl StoreAdapter {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self::with_policy(store, RetryPolicy::default())
    }

    pub fn with_policy(store: Box<dyn KeyValueStore>, policy: RetryPolicy) -> Self {
        Self {
            store,
            queue: Mutex::new(()),
            policy,
        }
    }

    /// Queued read.
    pub async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>, StoreError> {
        let _slot = self.queue.lock().await;
        let mut last_error = String::new();
        for attempt in 0..self.policy.max_attempts {
            match self.store.get(keys).await {
                Ok(values) => return Ok(values),
                Err(e) => last_error = self.note_failure(attempt, e).await,
            }
        }
        Err(self.exhausted(last_error))
    }

    /// Queued write of a partial mapping.
    pub async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        let _slot = self.queue.lock().await;
        let mut last_error = String::new();
        for attempt in 0..self.policy.max_attempts {
            match self.store.set(entries.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = self.note_failure(attempt, e).await,
            }
        }
        Err(self.exhausted(last_error))
    }

    /// Convenience for single-key writes.
    pub async fn set_one(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.set(HashMap::from([(key.to_string(), value)])).await
    }

    async fn note_failure(&self, attempt: u32, error: StoreError) -> String {
        let message = error.to_string();
        if attempt + 1 < self.policy.max_attempts {
            let delay = self.policy.delay_for(attempt);
            log::debug!(
                "store operation failed (attempt {}): {message}; retrying in {delay:?}",
                attempt + 1
            );
            tokio::time::sleep(delay).await;
        }
        message
    }

    fn exhausted(&self, last_error: String) -> StoreError {
        log::warn!(
            "store operation failed after {} attempts: {last_error}",
            self.policy.max_attempts
        );
        StoreError::RetriesExhausted {
            attempts: self.policy.max_attempts,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::MemoryStore;
    use serde_json::json;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn retries_until_the_backend_recovers() {
        let store = MemoryStore::new();
        store.fail_next(2);
        let adapter = StoreAdapter::with_policy(Box::new(store), fast_policy(5));

        adapter.set_one("k", json!(1)).await.unwrap();
        let got = adapter.get(&["k".to_string()]).await.unwrap();
        assert_eq!(got["k"], json!(1));
    }

    #[tokio::test]
    async fn exhausted_retries_surface_without_panicking() {
        let store = MemoryStore::new();
        store.fail_next(10);
        let adapter = StoreAdapter::with_policy(Box::new(store), fast_policy(3));

        let err = adapter.set_one("k", json!(1)).await.unwrap_err();
        match err {
            StoreError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn writes_apply_in_enqueue_order() {
        let store = MemoryStore::new();
        let adapter = std::sync::Arc::new(StoreAdapter::with_policy(
            Box::new(store),
            fast_policy(1),
        ));

        let mut handles = Vec::new();
        for i in 0..8u32 {
            let adapter = adapter.clone();
            handles.push(tokio::spawn(async move {
                adapter.set_one("seq", json!(i)).await.unwrap();
                adapter
                    .set_one(&format!("mark-{i}"), json!(i))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        // Every task's pair landed intact rather than as a torn merge.
        let keys: Vec<String> = (0..8).map(|i| format!("mark-{i}")).collect();
        let got = adapter.get(&keys).await.unwrap();
        assert_eq!(got.len(), 8);
    }
}
