//! `HttpClient` on top of reqwest.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pooled rustls client.
///
/// Sends are retried on transport failures, 5xx and 429 according to the
/// [`RetryPolicy`]. The response of the final attempt is returned whatever
/// its status.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Client whose requests time out after `timeout` unless the request
    /// carries its own.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .pool_max_idle_per_host(4)
            .user_agent(concat!("health-directory-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::Unavailable(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn to_reqwest(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let response = self
            .to_reqwest(request)
            .send()
            .await
            .map_err(|e| classify(&request.url, e))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(&request.url, e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Maps a reqwest failure onto the bridge error kinds. Never includes the
/// request headers, which may hold the API key.
fn classify(url: &str, error: reqwest::Error) -> BridgeError {
    let host = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string());

    if error.is_timeout() {
        BridgeError::Timeout(host)
    } else if error.is_decode() || error.is_body() {
        BridgeError::Decode(format!("{}: {}", host, error))
    } else if error.is_builder() {
        BridgeError::Unavailable(format!("{}: {}", host, error))
    } else {
        BridgeError::Network(format!("{}: {}", host, error))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default()).await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(attempt, attempts, url = %request.url, "HTTP request");
            let outcome = self.send_once(&request).await;
            let last = attempt >= attempts;

            match outcome {
                Ok(response) if response.is_retryable() && !last => {
                    warn!(status = response.status, attempt, "Retryable HTTP status");
                }
                Err(e) if e.is_transient() && !last => {
                    warn!(error = %e, attempt, "HTTP request failed");
                }
                other => return other,
            }

            let backoff = policy.backoff_for(attempt);
            debug!(backoff_ms = backoff.as_millis() as u64, "Retrying");
            sleep(backoff).await;
            attempt += 1;
        }
    }
}
