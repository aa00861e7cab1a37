// Gateway client for the upstream rates API
// One POST per call, no retries: a failed attempt is final for that request.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::transform::OutboundRatesPayload;

pub const DEFAULT_RATES_URL: &str = "https://dev.gondwana-collection.com/Web-Store/Rates/Rates.php";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Error, Debug)]
pub enum GatewayError {
    // Covers connection failures and the request timeout
    #[error("Network error: {0}")]
    NetworkError(#[source] reqwest::Error),

    #[error("Remote API returned status code: {0}")]
    NonSuccessStatus(u16),

    #[error("Invalid JSON response from remote API: {0}")]
    InvalidResponseBody(#[source] serde_json::Error),
}

impl GatewayError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::NetworkError(e) if e.is_timeout())
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    // Skips TLS certificate verification toward the upstream
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RATES_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            accept_invalid_certs: true,
        }
    }
}

/// Upstream response, relayed to the caller without interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatesResult(pub Value);

impl RatesResult {
    pub fn into_inner(self) -> Value {
        self.0
    }
}

#[async_trait]
pub trait RatesApi: Send + Sync + 'static {
    async fn fetch_rates(&self, payload: &OutboundRatesPayload) -> Result<RatesResult, GatewayError>;
}

pub struct RatesApiClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl RatesApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.base_url.is_empty() {
            return Err(ClientError::ConfigError(
                "rates URL must not be empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self { config, http })
    }
}

#[async_trait]
impl RatesApi for RatesApiClient {
    async fn fetch_rates(&self, payload: &OutboundRatesPayload) -> Result<RatesResult, GatewayError> {
        let started = Instant::now();
        debug!(url = %self.config.base_url, "Sending rates request");

        let response = self
            .http
            .post(&self.config.base_url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(GatewayError::NetworkError)?;

        let status = response.status();
        if status != StatusCode::OK {
            info!(status = status.as_u16(), "Rates API rejected request");
            return Err(GatewayError::NonSuccessStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(GatewayError::NetworkError)?;
        let value: Value =
            serde_json::from_slice(&body).map_err(GatewayError::InvalidResponseBody)?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rates fetched from upstream"
        );
        Ok(RatesResult(value))
    }
}
