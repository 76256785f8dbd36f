//! Retrieval collaborator boundary.
//!
//! The backend answers one question at a time and leaves a structured
//! evidence log on disk as a side artifact. The core treats
//! `evidence_log_path` as opaque and never interprets `mode` semantics.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::error::DeepReportError;

#[derive(Serialize)]
struct RetrievalRequest<'a> {
    question: &'a str,
    mode: &'a str,
    deep_research: bool,
}

/// One answered question plus the path of its evidence log.
#[derive(Debug, Clone, Deserialize)]
pub struct Retrieved {
    pub answer: String,
    pub evidence_log_path: String,
}

#[async_trait]
pub trait RetrievalClient: Send + Sync {
    async fn lookup(&self, question: &str) -> Result<Retrieved, DeepReportError>;
}

/// HTTP client for the retrieval service.
pub struct HttpRetrievalClient {
    http: reqwest::Client,
    url: String,
    mode: String,
}

impl HttpRetrievalClient {
    pub fn new(config: &RetrievalConfig) -> Result<Self, DeepReportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(DeepReportError::Retrieval)?;

        Ok(Self {
            http,
            url: config.url.clone(),
            mode: config.mode.clone(),
        })
    }
}

#[async_trait]
impl RetrievalClient for HttpRetrievalClient {
    async fn lookup(&self, question: &str) -> Result<Retrieved, DeepReportError> {
        debug!(url = %self.url, mode = %self.mode, "sending retrieval request");

        let request = RetrievalRequest {
            question,
            mode: &self.mode,
            deep_research: true,
        };

        let retrieved = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(DeepReportError::Retrieval)?
            .error_for_status()
            .map_err(DeepReportError::Retrieval)?
            .json::<Retrieved>()
            .await
            .map_err(DeepReportError::Retrieval)?;

        Ok(retrieved)
    }
}
