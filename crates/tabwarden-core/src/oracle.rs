//! Classification oracle interface.
//!
//! The oracle judges a page; how it judges is not this crate's business.
//! [`HttpOracle`] is the production client. Malformed JSON and non-success
//! statuses surface as [`OracleError`] values -- the dispatcher converts
//! every one of them into a terminal classification, never a panic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// What the oracle is asked about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    pub title: String,
    pub url: String,
    pub domain: String,
    /// Extracted page content, when a scraper supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The oracle's raw verdict. Scores arrive either fractional in [0,1] or
/// on a 0-100 scale; the dispatcher normalizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleReply {
    pub score: f64,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

/// External classification service.
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    async fn classify(&self, request: &OracleRequest) -> Result<OracleReply, OracleError>;
}

/// HTTP client for the classification service.
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOracle {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl ClassificationOracle for HttpOracle {
    async fn classify(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| OracleError::Malformed(e.to_string()))
    }
}
