//! Retrying byte-stream transfer.
//!
//! `Fetch` performs exactly one attempt; `Downloader` wraps a fetcher with a
//! bounded retry policy (fixed delay, no jitter) whose inter-attempt sleep
//! observes the process-wide cancellation token.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to download {url} after {attempts} attempts, last error: {source}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
    #[error("download of {url} cancelled while waiting to retry")]
    Cancelled { url: String },
}

/// One fetch attempt. Production uses HTTP; tests substitute fakes.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let resp = self.http.get(url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?)
    }
}

/// Bounded-retry wrapper around a `Fetch`.
pub struct Downloader {
    inner: Arc<dyn Fetch>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl Downloader {
    pub fn new(inner: Arc<dyn Fetch>) -> Self {
        Self::with_policy(inner, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }

    pub fn with_policy(inner: Arc<dyn Fetch>, max_attempts: u32, retry_delay: Duration) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be at least 1");
        Self {
            inner,
            max_attempts,
            retry_delay,
        }
    }

    /// Fetch `url`, making up to `max_attempts` attempts with a fixed delay
    /// between them. Returns the first successful payload. A cancellation
    /// during the inter-attempt sleep aborts promptly instead of waiting out
    /// the delay.
    pub async fn fetch(
        &self,
        url: &str,
        shutdown: &CancellationToken,
    ) -> Result<Bytes, DownloadError> {
        let mut last_err = None;
        for attempt in 1..=self.max_attempts {
            match self.inner.fetch(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) => {
                    warn!(url, attempt, error = %err, "download attempt failed");
                    last_err = Some(err);
                }
            }
            if attempt < self.max_attempts {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        return Err(DownloadError::Cancelled { url: url.to_string() });
                    }
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }
        Err(DownloadError::Exhausted {
            url: url.to_string(),
            attempts: self.max_attempts,
            source: last_err.expect("at least one attempt was made"),
        })
    }
}
