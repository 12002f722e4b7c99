//! Feature Fetcher
//!
//! Network side of the repository: retrieves a payload for one
//! `(host, client key)` pair.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::FetchError;
use crate::sdk::FeatureApiResponse;

/// Source of feature payloads.
#[async_trait]
pub trait FeatureFetcher: Send + Sync {
    async fn fetch(&self, host: &str, client_key: &str) -> Result<FeatureApiResponse, FetchError>;
}

/// Payload endpoint for a host and client key.
pub fn features_url(host: &str, client_key: &str) -> String {
    format!("{}/api/features/{}", host.trim_end_matches('/'), client_key)
}

// == HTTP Fetcher ==
/// Fetches payloads from `GET {host}/api/features/{clientKey}`.
///
/// Any non-2xx status and any body that is not a feature payload count as
/// a failed fetch. No retries: the next caller-initiated load tries again.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeatureFetcher for HttpFetcher {
    async fn fetch(&self, host: &str, client_key: &str) -> Result<FeatureApiResponse, FetchError> {
        let url = features_url(host, client_key);
        debug!(%url, "Fetching features");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
