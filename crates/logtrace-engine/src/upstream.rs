//! The hosted AI inference endpoint.

use crate::config::AiConfig;
use async_trait::async_trait;
use logtrace_common::protocol::{AiResponseEnvelope, AnalyzeRequest};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Longest `Retry-After` honored; larger hints are clamped.
pub const MAX_RETRY_AFTER_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EndpointError {
    #[error("endpoint rejected credentials (HTTP {0})")]
    Unauthorized(u16),
    #[error("endpoint reports no credits left")]
    PaymentRequired,
    #[error("endpoint rate limit hit")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    InvalidResponse(String),
    #[error("analysis failed: {0}")]
    Unsuccessful(String),
}

impl EndpointError {
    /// Classifies an HTTP status the endpoint answered with.
    pub fn from_status(status: u16, body: &str, retry_after_secs: Option<u64>) -> Self {
        let message = body.trim().chars().take(200).collect::<String>();
        match status {
            401 | 403 => EndpointError::Unauthorized(status),
            402 => EndpointError::PaymentRequired,
            429 => EndpointError::RateLimited {
                retry_after_secs: retry_after_secs.map(|s| s.min(MAX_RETRY_AFTER_SECS)),
            },
            400..=499 => EndpointError::Rejected { status, message },
            _ => EndpointError::Server { status, message },
        }
    }

    /// Only transient service failures are retried. Auth, credit, rate and
    /// request-shape errors are final.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            EndpointError::Server { .. }
                | EndpointError::Network(_)
                | EndpointError::Timeout
                | EndpointError::InvalidResponse(_)
                | EndpointError::Unsuccessful(_)
        )
    }
}

#[async_trait(?Send)]
pub trait AiEndpoint {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AiResponseEnvelope, EndpointError>;
}

/// JSON POST client for the hosted endpoint.
#[derive(Debug, Clone)]
pub struct HttpAiEndpoint {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpAiEndpoint {
    pub fn new(config: &AiConfig) -> Result<Self, EndpointError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EndpointError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn transport_error(e: reqwest::Error) -> EndpointError {
    if e.is_timeout() {
        EndpointError::Timeout
    } else {
        EndpointError::Network(e.to_string())
    }
}

#[async_trait(?Send)]
impl AiEndpoint for HttpAiEndpoint {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AiResponseEnvelope, EndpointError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        debug!(status, url = %self.url, "AI endpoint answered");

        if !response.status().is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(EndpointError::from_status(status, &body, retry_after_secs));
        }

        let body = response.text().await.map_err(transport_error)?;
        serde_json::from_str(&body).map_err(|e| EndpointError::InvalidResponse(e.to_string()))
    }
}
