//! Remote provider directory
//!
//! `GET {endpoint}` with `x-api-key`, answering `{ "success": bool, "data": [...] }`.
//! Non-2xx status, `success: false`, malformed JSON and timeouts are all fetch
//! failures.

use crate::error::{DirectoryError, Result};
use crate::models::ProviderRecord;
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use core_runtime::config::DirectoryConfig;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument};

/// Source of the raw provider list.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn fetch_providers(&self) -> Result<Vec<ProviderRecord>>;
}

#[derive(Debug, Deserialize)]
struct DirectoryEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<Vec<ProviderRecord>>,
    #[serde(default)]
    message: Option<String>,
}

pub struct HttpDirectoryClient {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpDirectoryClient {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            api_key,
            timeout,
        }
    }

    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &DirectoryConfig) -> Self {
        Self::new(
            http_client,
            config.directory_endpoint.clone(),
            config.api_key.clone(),
            config.request_timeout(),
        )
    }

    async fn fetch(&self) -> Result<Vec<ProviderRecord>> {
        let mut request = HttpRequest::get(self.endpoint.clone())
            .accept_json()
            .timeout(self.timeout);
        if let Some(ref key) = self.api_key {
            request = request.api_key(key.clone());
        }

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            return Err(DirectoryError::Fetch(format!(
                "Directory returned HTTP {}: {}",
                response.status,
                response.excerpt()
            )));
        }

        let envelope: DirectoryEnvelope = serde_json::from_slice(&response.body)
            .map_err(|e| DirectoryError::Parse(format!("Invalid directory payload: {}", e)))?;

        if !envelope.success {
            return Err(DirectoryError::Fetch(
                envelope
                    .message
                    .unwrap_or_else(|| "Directory reported failure".to_string()),
            ));
        }

        envelope
            .data
            .ok_or_else(|| DirectoryError::Parse("Directory payload has no data".to_string()))
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_providers(&self) -> Result<Vec<ProviderRecord>> {
        let providers = timeout(self.timeout, self.fetch())
            .await
            .map_err(|_| DirectoryError::Timeout(self.endpoint.clone()))??;

        debug!(count = providers.len(), "Fetched provider directory");
        Ok(providers)
    }
}
