//! Asynchronous byte fetching over HTTP

use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// Thin async HTTP client for retrieving raw bytes from a URL.
///
/// Used both for the one-time artifact download at startup and for the
/// classify-by-url request path. The connection is released on every exit
/// path; no retries are performed.
#[derive(Debug, Clone)]
pub struct ByteFetcher {
    client: reqwest::Client,
}

impl ByteFetcher {
    /// Create a fetcher with the given per-request timeout
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// GET `url` and read the entire response body into memory
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("GET {url} returned HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("failed reading body of {url}: {e}")))?;

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
