//! # Provider Directory Core
//!
//! Fetches the health-care provider directory, reuses previously computed
//! coordinates where they can still be trusted, geocodes only the providers
//! that need it, and degrades to the last known snapshot when the network is
//! unavailable.
//!
//! ## Components
//!
//! - [`CoordinateStore`] - location key to coordinates, 90-day expiry
//! - [`GeocodingResolver`] - cache, remote lookup, then known-city table
//! - [`DirectoryReconciler`] - change detection and coordinate carry-over,
//!   sole owner of the [`SnapshotStore`]
//! - [`SyncOrchestrator`] - fetch, reconcile, geocode, persist
//! - [`query`] - filtering, proximity search and statistics
//!
//! ## Usage
//!
//! ```ignore
//! use core_directory::{query, FilterCriteria, SyncOrchestrator};
//! use core_runtime::config::{CoreConfig, DirectoryConfig};
//!
//! let config = CoreConfig::builder()
//!     .directory(DirectoryConfig::from_env()?)
//!     .build()
//!     .await?;
//!
//! let orchestrator = SyncOrchestrator::from_config(&config);
//! let outcome = orchestrator.sync(false).await?;
//!
//! let nearby = query::filter(
//!     &outcome.records,
//!     &FilterCriteria::new().agreement(true).within(6.37, 2.39, 10.0),
//! );
//! ```

pub mod cache_key;
pub mod coordinate_store;
pub mod directory_client;
pub mod error;
pub mod geocoding;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod rate_limiter;
pub mod reconciler;
pub mod snapshot_store;

#[cfg(test)]
mod test_support;

pub use coordinate_store::{CoordinateStore, COORDINATES_KEY};
pub use directory_client::{DirectoryClient, HttpDirectoryClient};
pub use error::{DirectoryError, Result};
pub use geocoding::{FallbackTable, GeocodeHit, Geocoder, GeocodingResolver, NominatimGeocoder};
pub use models::{
    CacheInfo, GeoAccuracy, GeoCoordinates, GeoSource, GeocodedProviderRecord, ProviderRecord,
    ReconciliationMetadata, Sector, SyncOrigin, SyncOutcome,
};
pub use orchestrator::{SyncOrchestrator, SyncSettings, DEGRADED_MESSAGE, LAST_SYNCED_KEY};
pub use query::{filter, haversine_km, stats, DirectoryStats, FilterCriteria, RadiusFilter};
pub use rate_limiter::{FixedDelayRateLimiter, RateLimiter};
pub use reconciler::DirectoryReconciler;
pub use snapshot_store::{SnapshotStore, RECONCILIATION_KEY, SNAPSHOT_KEY};
