//! Hosted backend-as-a-service client.
//!
//! Drafts live under `{url}/drafts/{key}` (upsert via PUT) and final records
//! are POSTed to `{url}/submissions`. Requests carry a bearer API key read
//! from the environment variable named in the backend config.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Response, StatusCode};
use serde::Deserialize;

use crate::config::BackendConfig;
use crate::drafts::{DraftKey, DraftRecord, DraftStore, StoreError};
use crate::submit::{Submission, SubmissionReceipt, SubmissionSink};

const USER_AGENT: &str = concat!("backoffice-wizards/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the hosted draft store and submission endpoint
#[derive(Debug, Clone)]
pub struct HostedBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReceiptResponse {
    id: String,
    #[serde(default)]
    accepted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(alias = "error")]
    message: String,
}

impl HostedBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build from config; the API key is optional so local backends work without one
    pub fn from_config(config: &BackendConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| StoreError::Network("backend.url is not configured".to_string()))?;
        let api_key = env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(var = %config.api_key_env, "no API key set for hosted backend");
        }
        Self::new(url, api_key, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn draft_url(&self, key: &DraftKey) -> String {
        format!("{}/drafts/{}", self.base_url, key)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Response, StoreError> {
        builder.send().await.map_err(network_error)
    }
}

fn network_error(err: reqwest::Error) -> StoreError {
    if err.is_decode() {
        StoreError::Serialization(err.to_string())
    } else {
        StoreError::Network(err.to_string())
    }
}

/// Map a non-success response to a store error
async fn status_error(response: Response) -> StoreError {
    let status = response.status();
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return StoreError::Unauthorized;
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.message)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
    StoreError::Http {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl DraftStore for HostedBackend {
    fn name(&self) -> &str {
        "hosted"
    }

    async fn upsert_draft(&self, record: &DraftRecord) -> Result<(), StoreError> {
        let response = self
            .send(
                self.request(reqwest::Method::PUT, &self.draft_url(&record.key))
                    .json(record),
            )
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    async fn fetch_draft(&self, key: &DraftKey) -> Result<Option<DraftRecord>, StoreError> {
        let response = self
            .send(self.request(reqwest::Method::GET, &self.draft_url(key)))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.json().await.map_err(network_error)?)),
            _ => Err(status_error(response).await),
        }
    }

    async fn delete_draft(&self, key: &DraftKey) -> Result<bool, StoreError> {
        let response = self
            .send(self.request(reqwest::Method::DELETE, &self.draft_url(key)))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(status_error(response).await),
        }
    }

    async fn list_drafts(&self) -> Result<Vec<DraftRecord>, StoreError> {
        let url = format!("{}/drafts", self.base_url);
        let response = self.send(self.request(reqwest::Method::GET, &url)).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        response.json().await.map_err(network_error)
    }
}

#[async_trait]
impl SubmissionSink for HostedBackend {
    fn name(&self) -> &str {
        "hosted"
    }

    async fn finalize_submission(
        &self,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, StoreError> {
        let url = format!("{}/submissions", self.base_url);
        let response = self
            .send(self.request(reqwest::Method::POST, &url).json(submission))
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let receipt: ReceiptResponse = response.json().await.map_err(network_error)?;
        Ok(SubmissionReceipt {
            id: receipt.id,
            accepted_at: receipt.accepted_at.unwrap_or_else(Utc::now),
        })
    }
}
