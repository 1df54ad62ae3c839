//! Nominatim (OpenStreetMap) search client
//!
//! `GET {endpoint}?q={query}&format=json&limit=1&countrycodes={cc}` with an
//! identifying `User-Agent`. The response is an array of places whose
//! coordinates are decimal strings.

use super::{GeocodeHit, Geocoder};
use crate::error::{DirectoryError, Result};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use core_runtime::config::DirectoryConfig;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

pub struct NominatimGeocoder {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    user_agent: String,
    country_code: String,
    timeout: Duration,
}

impl NominatimGeocoder {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        endpoint: impl Into<String>,
        user_agent: impl Into<String>,
        country_code: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            user_agent: user_agent.into(),
            country_code: country_code.into(),
            timeout,
        }
    }

    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &DirectoryConfig) -> Self {
        Self::new(
            http_client,
            config.geocoding_endpoint.clone(),
            config.user_agent.clone(),
            config.country_code.clone(),
            config.request_timeout(),
        )
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}?q={}&format=json&limit=1&countrycodes={}",
            self.endpoint,
            urlencoding::encode(query),
            self.country_code
        )
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn lookup(&self, query: &str) -> Result<Option<GeocodeHit>> {
        let url = self.search_url(query);
        debug!("Geocoding lookup: {}", url);

        let request = HttpRequest::get(url)
            .user_agent(self.user_agent.clone())
            .accept_json()
            .timeout(self.timeout);

        // One attempt only: retries would break the request pacing
        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::none())
            .await?;

        if !response.is_success() {
            return Err(DirectoryError::Geocoding(format!(
                "HTTP {} from geocoding service",
                response.status
            )));
        }

        let places: Vec<NominatimPlace> = serde_json::from_slice(&response.body)
            .map_err(|e| DirectoryError::Parse(format!("Invalid geocoding payload: {}", e)))?;

        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let latitude = place
            .lat
            .trim()
            .parse::<f64>()
            .map_err(|e| DirectoryError::Parse(format!("Invalid latitude '{}': {}", place.lat, e)))?;
        let longitude = place
            .lon
            .trim()
            .parse::<f64>()
            .map_err(|e| DirectoryError::Parse(format!("Invalid longitude '{}': {}", place.lon, e)))?;

        Ok(Some(GeocodeHit {
            latitude,
            longitude,
            display_name: place.display_name,
        }))
    }
}
