//! # Geocoding Resolver
//!
//! Produces coordinates for an address and city, trying in strict order:
//!
//! 1. the [`CoordinateStore`] (valid entry, no network)
//! 2. one remote lookup via the [`Geocoder`], bounded by a timeout
//! 3. the [`FallbackTable`] of known city centers
//!
//! Whatever answer is produced is written back to the store, fallback
//! answers included. The resolver is the only writer of the store.
//!
//! The resolver does not pace itself. Callers running batches must wait
//! between remote lookups, either through a [`RateLimiter`](crate::RateLimiter)
//! or with [`GeocodingResolver::delay`].

use super::{FallbackTable, GeocodeHit, Geocoder};
use crate::cache_key::cache_key;
use crate::coordinate_store::CoordinateStore;
use crate::models::{GeoAccuracy, GeoCoordinates, GeoSource};
use bridge_traits::time::Clock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

pub struct GeocodingResolver {
    store: CoordinateStore,
    geocoder: Arc<dyn Geocoder>,
    fallback: FallbackTable,
    clock: Arc<dyn Clock>,
    country_name: String,
    request_timeout: Duration,
    min_delay: Duration,
}

impl GeocodingResolver {
    pub fn new(
        store: CoordinateStore,
        geocoder: Arc<dyn Geocoder>,
        fallback: FallbackTable,
        clock: Arc<dyn Clock>,
        country_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            geocoder,
            fallback,
            clock,
            country_name: country_name.into(),
            request_timeout: Duration::from_secs(10),
            min_delay: Duration::from_millis(1000),
        }
    }

    /// Upper bound for one remote lookup; a timeout counts as a failed lookup.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Interval slept by [`delay`](Self::delay).
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Resolves coordinates for a location, `None` if every source failed.
    #[instrument(skip(self))]
    pub async fn resolve(&self, address: &str, city: &str) -> Option<GeoCoordinates> {
        let key = cache_key(address, city);

        if let Some(cached) = self.store.get(&key).await {
            debug!(key = %key, "Coordinate cache hit");
            return Some(cached);
        }

        let has_address = !address.trim().is_empty();
        let query = self.query_for(address, city);

        match self.remote_lookup(&query).await {
            Some(hit) => {
                let accuracy = if has_address {
                    GeoAccuracy::Approximate
                } else {
                    GeoAccuracy::CityLevel
                };
                let coordinates = GeoCoordinates::new(
                    hit.latitude,
                    hit.longitude,
                    self.clock.now(),
                    GeoSource::RemoteLookup,
                    accuracy,
                );
                self.store.put(&key, coordinates.clone()).await;
                debug!(key = %key, "Geocoded via remote lookup");
                return Some(coordinates);
            }
            None => debug!(key = %key, "Remote lookup unusable, trying city table"),
        }

        match self.fallback.lookup(city) {
            Some((latitude, longitude)) => {
                let coordinates = GeoCoordinates::new(
                    latitude,
                    longitude,
                    self.clock.now(),
                    GeoSource::FallbackTable,
                    GeoAccuracy::CityLevel,
                );
                self.store.put(&key, coordinates.clone()).await;
                info!(city = city, "Using city center from fallback table");
                Some(coordinates)
            }
            None => {
                warn!(city = city, "Could not geocode location");
                None
            }
        }
    }

    /// Valid cached coordinate for a location, never touching the network.
    pub async fn cached(&self, address: &str, city: &str) -> Option<GeoCoordinates> {
        self.store.get(&cache_key(address, city)).await
    }

    /// Stores a hand-entered exact coordinate for a location.
    pub async fn seed(
        &self,
        address: &str,
        city: &str,
        latitude: f64,
        longitude: f64,
    ) -> GeoCoordinates {
        let coordinates = GeoCoordinates::new(
            latitude,
            longitude,
            self.clock.now(),
            GeoSource::ManuallySeeded,
            GeoAccuracy::Exact,
        );
        self.store
            .put(&cache_key(address, city), coordinates.clone())
            .await;
        coordinates
    }

    /// Whether a coordinate is still within the expiry window.
    pub fn is_valid(&self, coordinates: &GeoCoordinates) -> bool {
        self.store.is_valid(coordinates)
    }

    /// Sleeps the minimum interval callers must leave between remote lookups.
    pub async fn delay(&self) {
        sleep(self.min_delay).await;
    }

    pub async fn coordinate_count(&self) -> usize {
        self.store.len().await
    }

    /// Removes the entries stored under `keys`, returning how many existed.
    pub async fn evict(&self, keys: &HashSet<String>) -> usize {
        let removed = self.store.retain(|key, _| !keys.contains(key)).await;
        if removed > 0 {
            info!(removed = removed, "Evicted coordinates of departed providers");
        }
        removed
    }

    pub async fn prune_expired(&self) -> usize {
        let removed = self.store.prune_expired().await;
        if removed > 0 {
            info!(removed = removed, "Pruned expired coordinates");
        }
        removed
    }

    pub async fn clear(&self) {
        self.store.clear().await;
    }

    fn query_for(&self, address: &str, city: &str) -> String {
        let address = address.trim();
        let city = city.trim();
        if address.is_empty() {
            format!("{}, {}", city, self.country_name)
        } else {
            format!("{}, {}, {}", address, city, self.country_name)
        }
    }

    async fn remote_lookup(&self, query: &str) -> Option<GeocodeHit> {
        match timeout(self.request_timeout, self.geocoder.lookup(query)).await {
            Ok(Ok(Some(hit))) if hit.is_usable() => Some(hit),
            Ok(Ok(Some(hit))) => {
                warn!(query = query, ?hit, "Geocoder returned out-of-range coordinates");
                None
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!(query = query, error = %e, "Geocoding lookup failed");
                None
            }
            Err(_) => {
                warn!(
                    query = query,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Geocoding lookup timed out"
                );
                None
            }
        }
    }
}
