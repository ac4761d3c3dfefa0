//! Classification dispatch.
//!
//! Resolution order for a triggered target: manual override, daily quota,
//! then the oracle. The oracle call runs as a spawned task held in a
//! single-slot [`SingleFlight`]; the owner's tick harvests completion. The
//! timeout is a local deadline -- it stops the wait, and the abandoned
//! response is never displayed.
//!
//! Oracle failures do not propagate as errors. Every outcome (success,
//! timeout, transport/parse failure, quota fallback) becomes a terminal
//! record so the target always leaves the "pending" state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::cache::{ClassificationRecord, SOURCE_MANUAL, SOURCE_ORACLE, SOURCE_QUOTA};
use crate::oracle::{ClassificationOracle, OracleRequest};
use crate::overrides::OverrideState;
use crate::urls;

/// Source tag for locally synthesized failure verdicts.
pub const SOURCE_FAILURE: &str = "Failure";

/// Normalize an oracle score to 0..=100.
///
/// Fractional scores in [0,1] scale by 100 and round; everything else
/// clamps. Non-finite input reads as 0.
pub fn normalize_score(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    let scaled = if (0.0..=1.0).contains(&raw) {
        raw * 100.0
    } else {
        raw
    };
    scaled.round().clamp(0.0, 100.0) as u8
}

#[derive(Clone)]
pub struct Dispatcher {
    oracle: Arc<dyn ClassificationOracle>,
    timeout_ms: u64,
    productivity_threshold: u8,
    quota_default_productive: bool,
}

impl Dispatcher {
    pub fn new(
        oracle: Arc<dyn ClassificationOracle>,
        timeout_ms: u64,
        productivity_threshold: u8,
        quota_default_productive: bool,
    ) -> Self {
        Self {
            oracle,
            timeout_ms,
            productivity_threshold,
            quota_default_productive,
        }
    }

    /// Terminal record for a manual override. Bypasses cache and oracle.
    pub fn manual_record(url: &str, state: OverrideState, now_ms: u64) -> ClassificationRecord {
        let productive = state == OverrideState::Productive;
        ClassificationRecord {
            normalized_url: urls::normalize(url),
            is_productive: productive,
            score: if productive { 100 } else { 0 },
            categories: vec!["Manual Override".to_string()],
            explanation: "Classified by manual override".to_string(),
            created_at_ms: now_ms,
            source: SOURCE_MANUAL.to_string(),
        }
    }

    /// Deterministic fallback when the daily quota is exhausted.
    ///
    /// A domain on the user's block list classifies non-productive; anything
    /// else defaults productive at the threshold score so an unavailable
    /// oracle cannot cause false blocking.
    pub fn quota_fallback(
        &self,
        url: &str,
        domain: &str,
        user_blocked: &[String],
        now_ms: u64,
    ) -> ClassificationRecord {
        if urls::domain_matches(domain, user_blocked) {
            return ClassificationRecord {
                normalized_url: urls::normalize(url),
                is_productive: false,
                score: 0,
                categories: vec!["User Blocked".to_string()],
                explanation: "Daily analysis quota reached; domain is on your block list"
                    .to_string(),
                created_at_ms: now_ms,
                source: SOURCE_QUOTA.to_string(),
            };
        }
        let productive = self.quota_default_productive;
        ClassificationRecord {
            normalized_url: urls::normalize(url),
            is_productive: productive,
            score: if productive {
                self.productivity_threshold
            } else {
                0
            },
            categories: vec!["Quota Fallback".to_string()],
            explanation: "Daily analysis quota reached".to_string(),
            created_at_ms: now_ms,
            source: SOURCE_QUOTA.to_string(),
        }
    }

    /// Spawn the oracle call under the local timeout.
    pub fn spawn_classify(&self, request: OracleRequest) -> JoinHandle<ClassificationRecord> {
        let oracle = self.oracle.clone();
        let timeout = Duration::from_millis(self.timeout_ms);
        let threshold = self.productivity_threshold;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, oracle.classify(&request)).await {
                Ok(Ok(reply)) => {
                    let score = normalize_score(reply.score);
                    ClassificationRecord {
                        normalized_url: urls::normalize(&request.url),
                        is_productive: score >= threshold,
                        score,
                        categories: reply.categories,
                        explanation: reply.explanation,
                        created_at_ms: 0, // stamped by the cache on insert
                        source: SOURCE_ORACLE.to_string(),
                    }
                }
                Ok(Err(e)) => {
                    log::warn!("oracle call for {} failed: {e}", request.url);
                    failure_record(&request.url, e.to_string())
                }
                Err(_) => {
                    log::warn!("oracle call for {} timed out", request.url);
                    failure_record(&request.url, "Analysis timed out".to_string())
                }
            }
        })
    }
}

/// Terminal non-productive verdict carrying a failure explanation.
pub fn failure_record(url: &str, explanation: String) -> ClassificationRecord {
    ClassificationRecord {
        normalized_url: urls::normalize(url),
        is_productive: false,
        score: 0,
        categories: vec!["Analysis Failed".to_string()],
        explanation,
        created_at_ms: 0,
        source: SOURCE_FAILURE.to_string(),
    }
}

/// The one outstanding classification, if any.
///
/// Holding the task here (rather than a boolean flag mutated from many call
/// sites) is what suppresses re-entrant dispatch for a pending target.
struct InFlight {
    url: String,
    tab_id: i64,
    handle: JoinHandle<ClassificationRecord>,
}

#[derive(Default)]
pub struct SingleFlight {
    slot: Option<InFlight>,
}

impl SingleFlight {
    /// Occupy the slot. Returns false when a dispatch is already
    /// outstanding; callers check `pending_url` before spawning.
    pub fn begin(&mut self, url: String, tab_id: i64, handle: JoinHandle<ClassificationRecord>) -> bool {
        if self.slot.is_some() {
            return false;
        }
        self.slot = Some(InFlight {
            url,
            tab_id,
            handle,
        });
        true
    }

    pub fn pending_url(&self) -> Option<&str> {
        self.slot.as_ref().map(|s| s.url.as_str())
    }

    /// Collect the finished task, if it finished. Never blocks on a task
    /// still running.
    pub async fn harvest(&mut self) -> Option<(String, i64, ClassificationRecord)> {
        if !self.slot.as_ref().is_some_and(|s| s.handle.is_finished()) {
            return None;
        }
        let flight = self.slot.take()?;
        match flight.handle.await {
            Ok(record) => Some((flight.url, flight.tab_id, record)),
            Err(e) => {
                let record = failure_record(&flight.url, format!("Analysis task failed: {e}"));
                Some((flight.url, flight.tab_id, record))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::oracle::OracleReply;
    use async_trait::async_trait;

    #[test]
    fn fractional_scores_scale_to_percent() {
        assert_eq!(normalize_score(0.82), 82);
        assert_eq!(normalize_score(0.0), 0);
        assert_eq!(normalize_score(1.0), 100);
    }

    #[test]
    fn out_of_range_scores_clamp() {
        assert_eq!(normalize_score(130.0), 100);
        assert_eq!(normalize_score(-4.0), 0);
        assert_eq!(normalize_score(67.4), 67);
        assert_eq!(normalize_score(f64::NAN), 0);
    }

    #[test]
    fn manual_records_pin_the_score() {
        let rec = Dispatcher::manual_record("https://X.com/a", OverrideState::Productive, 5);
        assert!(rec.is_productive);
        assert_eq!(rec.score, 100);
        assert_eq!(rec.source, SOURCE_MANUAL);
        assert_eq!(rec.normalized_url, "https://x.com/a");

        let rec = Dispatcher::manual_record("https://x.com/a", OverrideState::NonProductive, 5);
        assert!(!rec.is_productive);
        assert_eq!(rec.score, 0);
    }

    struct ScriptedOracle {
        reply: Result<OracleReply, OracleError>,
    }

    #[async_trait]
    impl ClassificationOracle for ScriptedOracle {
        async fn classify(&self, _request: &OracleRequest) -> Result<OracleReply, OracleError> {
            match &self.reply {
                Ok(r) => Ok(r.clone()),
                Err(_) => Err(OracleError::Transport("connection refused".to_string())),
            }
        }
    }

    struct HangingOracle;

    #[async_trait]
    impl ClassificationOracle for HangingOracle {
        async fn classify(&self, _request: &OracleRequest) -> Result<OracleReply, OracleError> {
            std::future::pending().await
        }
    }

    fn request() -> OracleRequest {
        OracleRequest {
            title: "T".to_string(),
            url: "https://example.com/".to_string(),
            domain: "example.com".to_string(),
            content: None,
        }
    }

    fn dispatcher(oracle: Arc<dyn ClassificationOracle>) -> Dispatcher {
        Dispatcher::new(oracle, 50, 50, true)
    }

    #[tokio::test]
    async fn success_normalizes_and_derives_productivity() {
        let d = dispatcher(Arc::new(ScriptedOracle {
            reply: Ok(OracleReply {
                score: 0.82,
                categories: vec!["Reference".to_string()],
                explanation: "docs".to_string(),
            }),
        }));
        let rec = d.spawn_classify(request()).await.unwrap();
        assert_eq!(rec.score, 82);
        assert!(rec.is_productive);
        assert_eq!(rec.source, SOURCE_ORACLE);
    }

    #[tokio::test]
    async fn oracle_error_becomes_a_terminal_record() {
        let d = dispatcher(Arc::new(ScriptedOracle {
            reply: Err(OracleError::Transport(String::new())),
        }));
        let rec = d.spawn_classify(request()).await.unwrap();
        assert!(!rec.is_productive);
        assert_eq!(rec.source, SOURCE_FAILURE);
        assert!(rec.explanation.contains("connection refused"));
    }

    #[tokio::test]
    async fn timeout_becomes_a_terminal_record() {
        let d = dispatcher(Arc::new(HangingOracle));
        let rec = d.spawn_classify(request()).await.unwrap();
        assert!(!rec.is_productive);
        assert_eq!(rec.explanation, "Analysis timed out");
    }

    #[tokio::test]
    async fn quota_fallback_respects_the_user_block_list() {
        let d = dispatcher(Arc::new(HangingOracle));
        let blocked = vec!["x.com".to_string()];

        let rec = d.quota_fallback("https://x.com/feed", "x.com", &blocked, 0);
        assert!(!rec.is_productive);
        assert_eq!(rec.categories, vec!["User Blocked".to_string()]);

        let rec = d.quota_fallback("https://other.com/", "other.com", &blocked, 0);
        assert!(rec.is_productive);
        assert_eq!(rec.score, 50);
        assert_eq!(rec.source, SOURCE_QUOTA);
    }

    #[tokio::test]
    async fn single_flight_refuses_a_second_dispatch() {
        let d = dispatcher(Arc::new(HangingOracle));
        let mut flight = SingleFlight::default();
        assert!(flight.begin(
            "https://example.com/".to_string(),
            1,
            d.spawn_classify(request())
        ));
        assert!(!flight.begin(
            "https://example.com/".to_string(),
            1,
            d.spawn_classify(request())
        ));
        assert_eq!(flight.pending_url(), Some("https://example.com/"));
    }

    #[tokio::test]
    async fn harvest_returns_none_while_running_then_the_record() {
        let d = dispatcher(Arc::new(ScriptedOracle {
            reply: Ok(OracleReply {
                score: 90.0,
                categories: vec![],
                explanation: String::new(),
            }),
        }));
        let mut flight = SingleFlight::default();
        flight.begin(
            "https://example.com/".to_string(),
            1,
            d.spawn_classify(request()),
        );
        // Give the task a moment to run to completion.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (url, tab_id, rec) = flight.harvest().await.expect("task finished");
        assert_eq!(url, "https://example.com/");
        assert_eq!(tab_id, 1);
        assert_eq!(rec.score, 90);
        assert!(flight.harvest().await.is_none());
    }
}
