//! HTTP client for thumbnail retrieval

use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Response of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_body_bytes: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            max_body_bytes: 10 * 1024 * 1024,
            user_agent: concat!("clipstash/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Thumbnail downloader
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Fetch a URL with bounded retry
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.fetch_once(url).await {
                Ok(bytes) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Fetch succeeded after retry");
                    }
                    return Ok(bytes);
                }
                Err(e @ FetchError::TooLarge { .. }) => return Err(e),
                Err(e) => {
                    if attempts >= self.config.max_retries.max(1) {
                        warn!(url, attempts, error = %e, "Fetch failed after retries");
                        return Err(FetchError::RequestFailed(format!(
                            "Failed after {} attempts: {}",
                            attempts, e
                        )));
                    }

                    warn!(url, attempts, error = %e, "Fetch failed, retrying");
                    let backoff = self.config.backoff_base.saturating_mul(2u32.pow(attempts - 1));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::RequestFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let limit = self.config.max_body_bytes;
        if let Some(size) = response.content_length().filter(|size| *size > limit) {
            return Err(FetchError::TooLarge {
                size,
                limit: self.config.max_body_bytes,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::RequestFailed(format!("Failed to read body: {}", e)))?;

        if bytes.len() as u64 > self.config.max_body_bytes {
            return Err(FetchError::TooLarge {
                size: bytes.len() as u64,
                limit: self.config.max_body_bytes,
            });
        }

        debug!(url, size = bytes.len(), "Fetch completed");
        Ok(bytes)
    }
}
