//! HTTP client for the term sheet intake API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use termsheet_core::{FieldRecord, PortfolioSummary, TermsheetPair};
use thiserror::Error;
use tracing::info;

use crate::poller::TermsheetSource;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-trader statistics as reported by `/trader_stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TraderStats {
    pub total_documents: u64,
    pub validation_rate: f64,
    pub total_unvalidated_fields: u64,
}

impl From<&PortfolioSummary> for TraderStats {
    fn from(p: &PortfolioSummary) -> Self {
        Self {
            total_documents: p.total_documents as u64,
            validation_rate: p.validation_rate,
            total_unvalidated_fields: p.unvalidated_fields as u64,
        }
    }
}

/// Client for the intake service's read endpoints.
#[derive(Clone)]
pub struct IntakeClient {
    client: reqwest::Client,
    base_url: String,
}

impl IntakeClient {
    /// `base_url` like `http://localhost:5000`; a trailing slash is dropped.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Term sheet / reference pairs submitted by one trader.
    pub async fn fetch_validations(&self, email: &str) -> Result<Vec<TermsheetPair>, SyncError> {
        let url = format!("{}/get_term", self.base_url);
        info!(url = %url, email, "fetching term sheet pairs");
        let pairs: Vec<TermsheetPair> = self.get_json(&url, &[("email", email)]).await?;
        info!(count = pairs.len(), "fetched term sheet pairs");
        Ok(pairs)
    }

    /// Every stored term sheet, unpaired.
    pub async fn fetch_termsheets(&self) -> Result<Vec<FieldRecord>, SyncError> {
        let url = format!("{}/termsheets", self.base_url);
        info!(url = %url, "fetching term sheets");
        let sheets: Vec<FieldRecord> = self.get_json(&url, &[]).await?;
        info!(count = sheets.len(), "fetched term sheets");
        Ok(sheets)
    }

    pub async fn trader_stats(&self, email: &str) -> Result<TraderStats, SyncError> {
        let url = format!("{}/trader_stats", self.base_url);
        info!(url = %url, email, "fetching trader stats");
        self.get_json(&url, &[("email", email)]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SyncError> {
        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        // Decode via serde_json so malformed payloads surface as `Json`, not `Http`.
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// One trader's pairs, as a pollable source.
#[derive(Clone)]
pub struct TraderFeed {
    client: IntakeClient,
    email: String,
}

impl TraderFeed {
    pub fn new(client: IntakeClient, email: impl Into<String>) -> Self {
        Self {
            client,
            email: email.into(),
        }
    }
}

#[async_trait]
impl TermsheetSource for TraderFeed {
    async fn fetch(&self) -> Result<Vec<TermsheetPair>, SyncError> {
        self.client.fetch_validations(&self.email).await
    }
}
