//! # Coordinate Store
//!
//! Durable cache from a location key (see [`cache_key`](crate::cache_key)) to
//! [`GeoCoordinates`], persisted as a single versioned JSON value under
//! [`COORDINATES_KEY`].
//!
//! The store never fails: unreadable, unparsable or outdated data reads as an
//! empty cache, and failed writes are logged at `warn`. Expiry is measured from
//! each coordinate's own timestamp and is independent of the directory cache.

use crate::models::GeoCoordinates;
use bridge_traits::storage::KeyValueStore;
use bridge_traits::time::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Persistence key of the coordinate map
pub const COORDINATES_KEY: &str = "directory.coordinates";

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedCoordinates {
    version: u32,
    entries: HashMap<String, GeoCoordinates>,
}

/// Key-value backed coordinate cache with a fixed expiry window.
pub struct CoordinateStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    expiry: Duration,
}

impl CoordinateStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, expiry: Duration) -> Self {
        Self {
            store,
            clock,
            expiry,
        }
    }

    /// Returns the coordinate for `key` if present and unexpired.
    pub async fn get(&self, key: &str) -> Option<GeoCoordinates> {
        let mut entries = self.load().await;
        match entries.remove(key) {
            Some(coordinates) if self.is_valid(&coordinates) => Some(coordinates),
            Some(_) => {
                debug!(key = key, "Coordinate expired");
                None
            }
            None => None,
        }
    }

    /// Stores `coordinates` under `key`, replacing any previous value.
    pub async fn put(&self, key: &str, coordinates: GeoCoordinates) {
        let Some(mut entries) = self.load_for_write().await else {
            return;
        };
        entries.insert(key.to_string(), coordinates);
        self.save(entries).await;
    }

    /// True while `now - timestamp` is below the expiry window.
    pub fn is_valid(&self, coordinates: &GeoCoordinates) -> bool {
        let age_ms =
            self.clock.unix_timestamp_millis() - coordinates.timestamp.timestamp_millis();
        let expiry_ms = i64::try_from(self.expiry.as_millis()).unwrap_or(i64::MAX);
        age_ms < expiry_ms
    }

    /// Drops the whole map.
    pub async fn clear(&self) {
        if let Err(e) = self.store.remove(COORDINATES_KEY).await {
            warn!(error = %e, "Failed to clear coordinate cache");
        }
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.load().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Keeps only the entries for which `keep` returns true.
    ///
    /// Returns how many entries were removed.
    pub async fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&str, &GeoCoordinates) -> bool,
    {
        let Some(mut entries) = self.load_for_write().await else {
            return 0;
        };

        let before = entries.len();
        entries.retain(|key, coordinates| keep(key, coordinates));
        let removed = before - entries.len();

        if removed > 0 {
            self.save(entries).await;
        }
        removed
    }

    /// Removes expired entries, returning how many were dropped.
    pub async fn prune_expired(&self) -> usize {
        self.retain(|_, coordinates| self.is_valid(coordinates)).await
    }

    async fn load(&self) -> HashMap<String, GeoCoordinates> {
        match self.store.get(COORDINATES_KEY).await {
            Ok(raw) => Self::decode(raw),
            Err(e) => {
                warn!(error = %e, "Coordinate cache unreadable, treating as empty");
                HashMap::new()
            }
        }
    }

    /// Like `load`, but `None` when storage itself failed so a write cannot
    /// clobber entries that were merely unreachable.
    async fn load_for_write(&self) -> Option<HashMap<String, GeoCoordinates>> {
        match self.store.get(COORDINATES_KEY).await {
            Ok(raw) => Some(Self::decode(raw)),
            Err(e) => {
                warn!(error = %e, "Coordinate cache unreadable, skipping write");
                None
            }
        }
    }

    fn decode(raw: Option<String>) -> HashMap<String, GeoCoordinates> {
        let Some(raw) = raw else {
            return HashMap::new();
        };

        match serde_json::from_str::<PersistedCoordinates>(&raw) {
            Ok(persisted) if persisted.version == SCHEMA_VERSION => persisted.entries,
            Ok(persisted) => {
                warn!(
                    version = persisted.version,
                    expected = SCHEMA_VERSION,
                    "Coordinate cache schema mismatch, treating as empty"
                );
                HashMap::new()
            }
            Err(e) => {
                warn!(error = %e, "Coordinate cache corrupt, treating as empty");
                HashMap::new()
            }
        }
    }

    async fn save(&self, entries: HashMap<String, GeoCoordinates>) {
        let count = entries.len();
        let persisted = PersistedCoordinates {
            version: SCHEMA_VERSION,
            entries,
        };

        let raw = match serde_json::to_string(&persisted) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to encode coordinate cache");
                return;
            }
        };

        match self.store.set(COORDINATES_KEY, &raw).await {
            Ok(()) => debug!(entries = count, "Persisted coordinate cache"),
            Err(e) => warn!(error = %e, "Failed to persist coordinate cache"),
        }
    }
}
