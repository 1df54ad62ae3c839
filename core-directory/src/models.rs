//! Domain models for the provider directory.
//!
//! Wire shapes follow the directory API (`type`, `agreement`, lowercase
//! sector tags). Persisted shapes reuse the same serde derives.

use crate::cache_key::{cache_key, normalize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Provider sector tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Sector {
    Public,
    Private,
    #[default]
    Unknown,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Public => "public",
            Sector::Private => "private",
            Sector::Unknown => "unknown",
        }
    }
}

impl From<Option<String>> for Sector {
    fn from(raw: Option<String>) -> Self {
        match raw.as_deref().map(normalize).as_deref() {
            Some("public" | "publique" | "public sector") => Sector::Public,
            Some("private" | "privé" | "prive" | "privée" | "privee") => Sector::Private,
            _ => Sector::Unknown,
        }
    }
}

impl From<Sector> for String {
    fn from(sector: Sector) -> Self {
        sector.as_str().to_string()
    }
}

/// One health-care provider entry from the remote directory.
///
/// `id` is stable across syncs and joins snapshots with fresh fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default)]
    pub sector: Sector,
    #[serde(default, deserialize_with = "null_as_default")]
    pub agreement: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phones: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub emails: Vec<String>,
}

/// The directory sends `null` for blank optional fields.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ProviderRecord {
    /// Coordinate cache key for this provider's location
    pub fn cache_key(&self) -> String {
        cache_key(&self.address, &self.city)
    }

    /// True if address or city differ once normalized
    pub fn location_differs(&self, other: &ProviderRecord) -> bool {
        self.cache_key() != other.cache_key()
    }
}

/// Where a coordinate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoSource {
    RemoteLookup,
    FallbackTable,
    ManuallySeeded,
}

/// How precise a coordinate is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoAccuracy {
    Exact,
    Approximate,
    CityLevel,
}

/// A geocoded location (WGS84 degrees).
///
/// `timestamp` is the only input to expiry; it is never refreshed when the
/// owning provider changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub source: GeoSource,
    pub accuracy: GeoAccuracy,
}

impl GeoCoordinates {
    pub fn new(
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
        source: GeoSource,
        accuracy: GeoAccuracy,
    ) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            source,
            accuracy,
        }
    }
}

/// A provider with its (optional) coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedProviderRecord {
    #[serde(flatten)]
    pub provider: ProviderRecord,
    #[serde(default)]
    pub coordinates: Option<GeoCoordinates>,
    pub last_updated: DateTime<Utc>,
    /// Distance from the radius filter's center; never persisted
    #[serde(skip)]
    pub distance_km: Option<f64>,
}

impl GeocodedProviderRecord {
    pub fn new(provider: ProviderRecord, last_updated: DateTime<Utc>) -> Self {
        Self {
            provider,
            coordinates: None,
            last_updated,
            distance_km: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.provider.id
    }

    pub fn is_geocoded(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// Bookkeeping from the last reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationMetadata {
    pub total_at_last_pass: usize,
    pub geocoded_at_last_pass: usize,
    pub last_pass_at: DateTime<Utc>,
    pub schema_version: String,
}

/// Where a sync result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOrigin {
    /// Directory cache was fresh, no network call was made
    Cache,
    /// Fresh fetch, reconciled and persisted
    Network,
    /// Fetch failed, last known snapshot returned
    Degraded,
}

/// Result of a successful `sync`
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub records: Vec<GeocodedProviderRecord>,
    pub origin: SyncOrigin,
    /// Human-readable summary or degradation notice
    pub message: Option<String>,
}

impl SyncOutcome {
    pub fn is_degraded(&self) -> bool {
        self.origin == SyncOrigin::Degraded
    }

    pub fn geocoded_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_geocoded()).count()
    }
}

/// Snapshot of cache state for diagnostics and settings screens
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInfo {
    pub coordinate_entries: usize,
    pub snapshot_providers: Option<usize>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_pass: Option<ReconciliationMetadata>,
    pub directory_fresh: bool,
}
