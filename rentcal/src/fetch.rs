//! Feed fetching over HTTP.
//!
//! Feed hosts are third-party and unreliable, so every request is bounded
//! by a timeout. Retries are deliberately not done here: retrying below
//! the orchestrator would hide failures from the per-source statistics.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::timeout;

use rentcal_core::{SyncError, SyncResult};

/// Retrieves raw calendar text for one feed URL.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> SyncResult<String>;
}

pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> SyncResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("rentcal/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Fetch(e.to_string()))?;

        Ok(HttpFetcher {
            client,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> SyncResult<String> {
        let response = timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| SyncError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| SyncError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus(status.as_u16()));
        }

        timeout(self.timeout, response.text())
            .await
            .map_err(|_| SyncError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| SyncError::Fetch(e.to_string()))
    }
}
