//! # Sync Orchestrator
//!
//! Single entry point for refreshing the provider directory.
//!
//! ## Workflow
//!
//! 1. Unless forced, return the stored snapshot while the directory cache is fresh
//! 2. Fetch the directory; on failure fall back to the stored snapshot
//! 3. Ask the reconciler whether a geocoding pass is needed and merge
//! 4. Geocode providers lacking a valid coordinate, one at a time, paced by
//!    the [`RateLimiter`]
//! 5. Persist snapshot, metadata and the last-synced timestamp
//! 6. Evict coordinate entries nothing refers to anymore
//!
//! A single provider failing to geocode never aborts the batch. The only
//! error surfaced to callers is [`DirectoryError::NoData`]: the fetch failed
//! and no snapshot exists.
//!
//! Overlapping `sync` calls are coalesced: a caller arriving while a sync is
//! running awaits that sync and receives its result.
//!
//! ## Usage
//!
//! ```ignore
//! use core_directory::SyncOrchestrator;
//!
//! let orchestrator = SyncOrchestrator::from_config(&config);
//! let outcome = orchestrator.sync(false).await?;
//! if outcome.is_degraded() {
//!     // show "using last known data"
//! }
//! ```

use crate::coordinate_store::CoordinateStore;
use crate::directory_client::{DirectoryClient, HttpDirectoryClient};
use crate::error::{DirectoryError, Result};
use crate::geocoding::{FallbackTable, GeocodingResolver, NominatimGeocoder};
use crate::models::{CacheInfo, GeocodedProviderRecord, SyncOrigin, SyncOutcome};
use crate::rate_limiter::{FixedDelayRateLimiter, RateLimiter};
use crate::reconciler::DirectoryReconciler;
use crate::snapshot_store::SnapshotStore;
use bridge_traits::storage::KeyValueStore;
use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, TimeZone, Utc};
use core_runtime::config::{CoreConfig, DirectoryConfig};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Persistence key of the last successful directory sync (Unix millis)
pub const LAST_SYNCED_KEY: &str = "directory.last_synced_at";

/// Message attached to degraded results
pub const DEGRADED_MESSAGE: &str = "using last known data";

/// Orchestrator tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Freshness window of the stored snapshot
    pub directory_cache_ttl: Duration,
    /// Run the eviction sweep after a full pass
    pub evict_orphaned_coordinates: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            directory_cache_ttl: Duration::from_secs(24 * 60 * 60),
            evict_orphaned_coordinates: true,
        }
    }
}

impl From<&DirectoryConfig> for SyncSettings {
    fn from(config: &DirectoryConfig) -> Self {
        Self {
            directory_cache_ttl: config.directory_cache_ttl,
            evict_orphaned_coordinates: config.evict_orphaned_coordinates,
        }
    }
}

type SharedSync = Shared<BoxFuture<'static, Result<SyncOutcome>>>;

pub struct SyncOrchestrator {
    inner: Arc<Pipeline>,
    in_flight: Mutex<Option<SharedSync>>,
}

struct Pipeline {
    directory: Arc<dyn DirectoryClient>,
    resolver: Arc<GeocodingResolver>,
    reconciler: Arc<DirectoryReconciler>,
    rate_limiter: Arc<dyn RateLimiter>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        resolver: Arc<GeocodingResolver>,
        reconciler: Arc<DirectoryReconciler>,
        rate_limiter: Arc<dyn RateLimiter>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Pipeline {
                directory,
                resolver,
                reconciler,
                rate_limiter,
                store,
                clock,
                settings,
            }),
            in_flight: Mutex::new(None),
        }
    }

    /// Wires the HTTP directory client, Nominatim, the country's city table
    /// and a fixed-delay limiter from a [`CoreConfig`].
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(config: &CoreConfig, clock: Arc<dyn Clock>) -> Self {
        let directory_config = &config.directory;
        let store = Arc::clone(&config.key_value_store);

        let directory: Arc<dyn DirectoryClient> = Arc::new(HttpDirectoryClient::from_config(
            Arc::clone(&config.http_client),
            directory_config,
        ));
        let geocoder = Arc::new(NominatimGeocoder::from_config(
            Arc::clone(&config.http_client),
            directory_config,
        ));

        let resolver = GeocodingResolver::new(
            CoordinateStore::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                directory_config.coordinate_expiry,
            ),
            geocoder,
            FallbackTable::for_country(&directory_config.country_code),
            Arc::clone(&clock),
            directory_config.country_name.clone(),
        )
        .with_request_timeout(directory_config.request_timeout())
        .with_min_delay(directory_config.rate_limit_delay());

        let reconciler =
            DirectoryReconciler::new(SnapshotStore::new(Arc::clone(&store)), Arc::clone(&clock));

        let rate_limiter: Arc<dyn RateLimiter> = Arc::new(FixedDelayRateLimiter::new(
            directory_config.rate_limit_delay(),
            Arc::clone(&clock),
        ));

        Self::new(
            directory,
            Arc::new(resolver),
            Arc::new(reconciler),
            rate_limiter,
            store,
            clock,
            SyncSettings::from(directory_config),
        )
    }

    /// Refreshes the directory.
    ///
    /// A call made while another sync is running does not start a new one; it
    /// receives the running sync's result, whatever its `force_refresh`.
    pub async fn sync(&self, force_refresh: bool) -> Result<SyncOutcome> {
        let shared = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(running) => {
                    debug!("Sync already running, awaiting its result");
                    running.clone()
                }
                None => {
                    let pipeline = Arc::clone(&self.inner);
                    let fut: SharedSync = async move { pipeline.run(force_refresh).await }
                        .boxed()
                        .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };

        let result = shared.clone().await;

        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|running| running.ptr_eq(&shared)) {
            *slot = None;
        }

        result
    }

    /// Wipes coordinates, snapshot, metadata and the last-synced stamp.
    ///
    /// Waits for a running sync first so its writes cannot land afterwards.
    pub async fn clear_cache(&self) -> Result<()> {
        let running = self.in_flight.lock().await.clone();
        if let Some(running) = running {
            let _ = running.await;
        }

        self.inner.resolver.clear().await;
        self.inner.reconciler.clear().await?;
        self.inner.store.remove(LAST_SYNCED_KEY).await?;

        info!("Directory cache cleared");
        Ok(())
    }

    pub async fn cache_info(&self) -> CacheInfo {
        let last_synced_at = self.inner.last_synced_at().await;
        let snapshot = self.inner.reconciler.snapshot().await;

        CacheInfo {
            coordinate_entries: self.inner.resolver.coordinate_count().await,
            snapshot_providers: snapshot.as_ref().map(Vec::len),
            last_synced_at,
            last_pass: self.inner.reconciler.metadata().await,
            directory_fresh: snapshot.is_some()
                && last_synced_at.is_some_and(|at| self.inner.is_fresh(at)),
        }
    }

    /// Looks a provider up in the stored snapshot.
    pub async fn provider(&self, id: u64) -> Option<GeocodedProviderRecord> {
        self.inner
            .reconciler
            .snapshot()
            .await?
            .into_iter()
            .find(|record| record.id() == id)
    }

    pub fn resolver(&self) -> &GeocodingResolver {
        &self.inner.resolver
    }
}

impl Pipeline {
    #[instrument(skip(self))]
    async fn run(&self, force_refresh: bool) -> Result<SyncOutcome> {
        if !force_refresh {
            if let Some(records) = self.fresh_snapshot().await {
                info!(providers = records.len(), "Directory cache fresh, skipping fetch");
                return Ok(SyncOutcome {
                    records,
                    origin: SyncOrigin::Cache,
                    message: None,
                });
            }
        }

        let fresh = match self.directory.fetch_providers().await {
            Ok(fresh) => fresh,
            Err(e) => return self.degrade(e).await,
        };

        let previous_keys = self.snapshot_keys().await;
        let full_pass = self.reconciler.needs_full_pass(&fresh).await;
        let mut records = self.reconciler.merge(fresh).await;

        if full_pass {
            self.geocode_missing(&mut records).await;
        } else {
            debug!("Directory unchanged, reusing stored coordinates");
        }

        if let Err(e) = self.reconciler.commit(&records).await {
            warn!(error = %e, "Failed to persist directory snapshot");
        }
        self.mark_synced().await;

        if full_pass && self.settings.evict_orphaned_coordinates {
            self.sweep(&previous_keys, &records).await;
        }

        let geocoded = records.iter().filter(|r| r.is_geocoded()).count();
        let summary = format!("{}/{} providers geocoded", geocoded, records.len());
        info!(full_pass = full_pass, "{}", summary);

        Ok(SyncOutcome {
            records,
            origin: SyncOrigin::Network,
            message: Some(summary),
        })
    }

    /// Resolves every record without a valid coordinate, strictly in sequence.
    async fn geocode_missing(&self, records: &mut [GeocodedProviderRecord]) {
        let mut remote_lookups = 0usize;
        let mut resolved = 0usize;

        for record in records.iter_mut() {
            let has_valid = record
                .coordinates
                .as_ref()
                .is_some_and(|c| self.resolver.is_valid(c));
            if has_valid {
                continue;
            }

            let address = record.provider.address.clone();
            let city = record.provider.city.clone();

            if let Some(cached) = self.resolver.cached(&address, &city).await {
                record.coordinates = Some(cached);
                resolved += 1;
                continue;
            }

            self.rate_limiter.acquire().await;
            remote_lookups += 1;

            record.coordinates = self.resolver.resolve(&address, &city).await;
            if record.coordinates.is_some() {
                resolved += 1;
            }
        }

        info!(
            resolved = resolved,
            remote_lookups = remote_lookups,
            "Geocoding pass finished"
        );
    }

    /// Drops expired coordinates and those of providers that left the
    /// directory since the previous snapshot.
    ///
    /// An empty fetch, or one that lost more than half of the previously
    /// known locations, keeps departed coordinates: such a list is more
    /// likely a backend fault than a real closure wave.
    async fn sweep(&self, previous_keys: &HashSet<String>, records: &[GeocodedProviderRecord]) {
        self.resolver.prune_expired().await;

        let current: HashSet<String> = records.iter().map(|r| r.provider.cache_key()).collect();
        let departed: HashSet<String> = previous_keys.difference(&current).cloned().collect();
        if departed.is_empty() {
            return;
        }

        if records.is_empty() || departed.len() * 2 > previous_keys.len() {
            warn!(
                departed = departed.len(),
                previous = previous_keys.len(),
                "Directory shrank sharply, keeping departed coordinates"
            );
            return;
        }

        self.resolver.evict(&departed).await;
    }

    async fn snapshot_keys(&self) -> HashSet<String> {
        self.reconciler
            .snapshot()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| r.provider.cache_key())
            .collect()
    }

    async fn degrade(&self, cause: DirectoryError) -> Result<SyncOutcome> {
        match self.reconciler.snapshot().await {
            Some(records) => {
                warn!(error = %cause, providers = records.len(), "Fetch failed, {}", DEGRADED_MESSAGE);
                Ok(SyncOutcome {
                    records,
                    origin: SyncOrigin::Degraded,
                    message: Some(DEGRADED_MESSAGE.to_string()),
                })
            }
            None => {
                warn!(error = %cause, "Fetch failed and no snapshot is stored");
                Err(DirectoryError::NoData(cause.to_string()))
            }
        }
    }

    async fn fresh_snapshot(&self) -> Option<Vec<GeocodedProviderRecord>> {
        let last = self.last_synced_at().await?;
        if !self.is_fresh(last) {
            debug!(last_synced_at = %last, "Directory cache stale");
            return None;
        }
        self.reconciler.snapshot().await
    }

    fn is_fresh(&self, last_synced_at: DateTime<Utc>) -> bool {
        let age_ms = self.clock.millis_since(last_synced_at.timestamp_millis());
        let ttl_ms = i64::try_from(self.settings.directory_cache_ttl.as_millis()).unwrap_or(i64::MAX);
        // A stamp from the future means the clock was set back; refetch.
        (0..ttl_ms).contains(&age_ms)
    }

    async fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        let raw = match self.store.get(LAST_SYNCED_KEY).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Last-synced timestamp unreadable");
                return None;
            }
        };

        let millis = raw.trim().parse::<i64>().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    async fn mark_synced(&self) {
        let now = self.clock.unix_timestamp_millis().to_string();
        if let Err(e) = self.store.set(LAST_SYNCED_KEY, &now).await {
            warn!(error = %e, "Failed to persist last-synced timestamp");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::{GeocodeHit, Geocoder};
    use crate::models::{GeoSource, ProviderRecord, Sector};
    use crate::test_support::{ManualClock, MemoryStore};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticDirectory {
        providers: std::sync::Mutex<Vec<ProviderRecord>>,
        calls: AtomicUsize,
    }

    impl StaticDirectory {
        fn set_providers(&self, providers: Vec<ProviderRecord>) {
            *self.providers.lock().unwrap() = providers;
        }
    }

    #[async_trait]
    impl DirectoryClient for StaticDirectory {
        async fn fetch_providers(&self) -> Result<Vec<ProviderRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.providers.lock().unwrap().clone())
        }
    }

    struct FixedGeocoder;

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn lookup(&self, _query: &str) -> Result<Option<GeocodeHit>> {
            Ok(Some(GeocodeHit {
                latitude: 6.4,
                longitude: 2.4,
                display_name: None,
            }))
        }
    }

    #[derive(Default)]
    struct CountingLimiter {
        acquired: AtomicUsize,
    }

    #[async_trait]
    impl RateLimiter for CountingLimiter {
        async fn acquire(&self) {
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn provider(id: u64, address: &str, city: &str) -> ProviderRecord {
        ProviderRecord {
            id,
            name: format!("Provider {}", id),
            provider_type: "clinique".to_string(),
            address: address.to_string(),
            city: city.to_string(),
            sector: Sector::Public,
            agreement: false,
            phones: vec![],
            emails: vec![],
        }
    }

    struct Harness {
        orchestrator: SyncOrchestrator,
        directory: Arc<StaticDirectory>,
        limiter: Arc<CountingLimiter>,
        clock: Arc<ManualClock>,
    }

    fn harness(providers: Vec<ProviderRecord>) -> Harness {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let clock = Arc::new(ManualClock::new());
        let directory = Arc::new(StaticDirectory {
            providers: std::sync::Mutex::new(providers),
            calls: AtomicUsize::new(0),
        });
        let limiter = Arc::new(CountingLimiter::default());

        let resolver = GeocodingResolver::new(
            CoordinateStore::new(kv.clone(), clock.clone(), Duration::from_secs(90 * 86_400)),
            Arc::new(FixedGeocoder),
            FallbackTable::benin(),
            clock.clone(),
            "Benin",
        );
        let reconciler = DirectoryReconciler::new(SnapshotStore::new(kv.clone()), clock.clone());

        let orchestrator = SyncOrchestrator::new(
            directory.clone(),
            Arc::new(resolver),
            Arc::new(reconciler),
            limiter.clone(),
            kv,
            clock.clone(),
            SyncSettings::default(),
        );

        Harness {
            orchestrator,
            directory,
            limiter,
            clock,
        }
    }

    #[tokio::test]
    async fn test_co_located_providers_share_one_paced_lookup() {
        let h = harness(vec![
            provider(1, "Avenue Steinmetz", "Cotonou"),
            provider(2, "avenue  steinmetz", "COTONOU"),
            provider(3, "Route de Kandi", "Parakou"),
        ]);

        let outcome = h.orchestrator.sync(false).await.unwrap();

        assert_eq!(outcome.origin, SyncOrigin::Network);
        assert_eq!(outcome.geocoded_count(), 3);
        assert_eq!(h.limiter.acquired.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.message.as_deref(), Some("3/3 providers geocoded"));
    }

    #[tokio::test]
    async fn test_stale_directory_cache_refetches_without_geocoding() {
        let h = harness(vec![provider(1, "Rue 1", "Cotonou")]);
        h.orchestrator.sync(false).await.unwrap();

        h.clock.advance(ChronoDuration::hours(25));
        let outcome = h.orchestrator.sync(false).await.unwrap();

        assert_eq!(outcome.origin, SyncOrigin::Network);
        assert_eq!(h.directory.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.limiter.acquired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_carried_coordinate_is_regeocoded_on_full_pass() {
        let h = harness(vec![provider(1, "Rue 1", "Cotonou")]);
        h.orchestrator.sync(false).await.unwrap();

        // A new provider forces a full pass after provider 1's coordinate expired
        h.clock.advance(ChronoDuration::days(120));
        h.directory
            .set_providers(vec![provider(1, "Rue 1", "Cotonou"), provider(2, "Rue 2", "Cotonou")]);

        let outcome = h.orchestrator.sync(false).await.unwrap();

        let coords = outcome.records[0].coordinates.as_ref().unwrap();
        assert_eq!(coords.source, GeoSource::RemoteLookup);
        assert_eq!(coords.timestamp, h.clock.now());
        assert_eq!(h.limiter.acquired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_provider_lookup_and_cache_info() {
        let h = harness(vec![provider(1, "Rue 1", "Cotonou"), provider(2, "", "Abomey")]);

        let info = h.orchestrator.cache_info().await;
        assert!(!info.directory_fresh);
        assert_eq!(info.snapshot_providers, None);

        h.orchestrator.sync(false).await.unwrap();

        let info = h.orchestrator.cache_info().await;
        assert!(info.directory_fresh);
        assert_eq!(info.snapshot_providers, Some(2));
        assert_eq!(info.coordinate_entries, 2);
        assert_eq!(info.last_synced_at, Some(h.clock.now()));
        assert_eq!(info.last_pass.map(|m| m.total_at_last_pass), Some(2));

        assert_eq!(h.orchestrator.provider(2).await.map(|r| r.id()), Some(2));
        assert!(h.orchestrator.provider(99).await.is_none());
    }

    #[tokio::test]
    async fn test_clock_set_back_makes_directory_cache_stale() {
        let h = harness(vec![provider(1, "Rue 1", "Cotonou")]);
        h.orchestrator.sync(false).await.unwrap();

        h.clock.advance(ChronoDuration::hours(-3));
        let outcome = h.orchestrator.sync(false).await.unwrap();

        assert_eq!(outcome.origin, SyncOrigin::Network);
        assert_eq!(h.directory.calls.load(Ordering::SeqCst), 2);
        assert!(h.orchestrator.cache_info().await.directory_fresh);
    }

    #[tokio::test]
    async fn test_sweep_keeps_coordinates_shared_with_remaining_provider() {
        let h = harness(vec![
            provider(1, "Rue 1", "Cotonou"),
            provider(2, "Rue 1", "Cotonou"),
            provider(3, "Rue 3", "Cotonou"),
        ]);
        h.orchestrator.sync(false).await.unwrap();

        h.directory
            .set_providers(vec![provider(2, "Rue 1", "Cotonou"), provider(3, "Rue 3", "Cotonou")]);
        h.orchestrator.sync(true).await.unwrap();

        assert_eq!(h.orchestrator.cache_info().await.coordinate_entries, 2);
    }
}
