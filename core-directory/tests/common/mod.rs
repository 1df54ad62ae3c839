//! Shared fakes for directory integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::storage::KeyValueStore;
use bridge_traits::time::Clock;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use core_directory::{
    CoordinateStore, DirectoryClient, DirectoryError, DirectoryReconciler, FallbackTable,
    GeocodeHit, Geocoder, GeocodingResolver, ProviderRecord, RateLimiter, Result, Sector,
    SnapshotStore, SyncOrchestrator, SyncSettings,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const COORDINATE_EXPIRY: Duration = Duration::from_secs(90 * 24 * 3600);

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    broken: AtomicBool,
}

impl MemoryStore {
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn check(&self) -> BridgeResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(BridgeError::StorageError("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> BridgeResult<Option<String>> {
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.check()?;
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> BridgeResult<()> {
        self.check()?;
        self.values.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        self.check()?;
        let mut keys: Vec<String> = self.values.lock().unwrap().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: ChronoDuration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Remote directory
// ---------------------------------------------------------------------------

pub struct FakeDirectory {
    response: Mutex<Result<Vec<ProviderRecord>>>,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeDirectory {
    pub fn new(providers: Vec<ProviderRecord>) -> Self {
        Self {
            response: Mutex::new(Ok(providers)),
            calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    pub fn set_providers(&self, providers: Vec<ProviderRecord>) {
        *self.response.lock().unwrap() = Ok(providers);
    }

    pub fn fail_with(&self, error: DirectoryError) {
        *self.response.lock().unwrap() = Err(error);
    }

    /// Makes the next fetches wait until the returned handle is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn fetch_providers(&self) -> Result<Vec<ProviderRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.response.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// Geocoding
// ---------------------------------------------------------------------------

/// Answers every query with a distinct coordinate near Cotonou unless told
/// to fail.
#[derive(Default)]
pub struct FakeGeocoder {
    queries: Mutex<Vec<String>>,
    unreachable: AtomicBool,
    failing: Mutex<Vec<String>>,
}

impl FakeGeocoder {
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Queries containing `fragment` fail
    pub fn fail_queries_containing(&self, fragment: &str) {
        self.failing.lock().unwrap().push(fragment.to_string());
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn lookup(&self, query: &str) -> Result<Option<GeocodeHit>> {
        let call = {
            let mut queries = self.queries.lock().unwrap();
            queries.push(query.to_string());
            queries.len()
        };

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Bridge("network unreachable".to_string()));
        }
        if self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| query.contains(fragment.as_str()))
        {
            return Err(DirectoryError::Geocoding("HTTP 503".to_string()));
        }

        Ok(Some(GeocodeHit {
            latitude: 6.35 + call as f64 * 0.001,
            longitude: 2.38 + call as f64 * 0.001,
            display_name: Some(query.to_string()),
        }))
    }
}

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CountingRateLimiter {
    acquired: AtomicUsize,
}

impl CountingRateLimiter {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimiter for CountingRateLimiter {
    async fn acquire(&self) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub fn provider(id: u64, address: &str, city: &str) -> ProviderRecord {
    ProviderRecord {
        id,
        name: format!("Provider {}", id),
        provider_type: "pharmacie".to_string(),
        address: address.to_string(),
        city: city.to_string(),
        sector: Sector::Private,
        agreement: id % 2 == 1,
        phones: vec![format!("+229 90 00 00 {:02}", id)],
        emails: vec![],
    }
}

pub fn resolver(
    store: Arc<dyn KeyValueStore>,
    geocoder: Arc<dyn Geocoder>,
    clock: Arc<dyn Clock>,
) -> GeocodingResolver {
    GeocodingResolver::new(
        CoordinateStore::new(store, clock.clone(), COORDINATE_EXPIRY),
        geocoder,
        FallbackTable::benin(),
        clock,
        "Benin",
    )
    .with_request_timeout(Duration::from_secs(2))
}

pub struct TestDirectory {
    pub orchestrator: SyncOrchestrator,
    pub store: Arc<MemoryStore>,
    pub directory: Arc<FakeDirectory>,
    pub geocoder: Arc<FakeGeocoder>,
    pub limiter: Arc<CountingRateLimiter>,
    pub clock: Arc<ManualClock>,
}

impl TestDirectory {
    pub fn new(providers: Vec<ProviderRecord>) -> Self {
        let store = Arc::new(MemoryStore::default());
        Self::with_store(providers, store)
    }

    pub fn with_store(providers: Vec<ProviderRecord>, store: Arc<MemoryStore>) -> Self {
        let clock = Arc::new(ManualClock::new());
        let directory = Arc::new(FakeDirectory::new(providers));
        let geocoder = Arc::new(FakeGeocoder::default());
        let limiter = Arc::new(CountingRateLimiter::default());

        let orchestrator = SyncOrchestrator::new(
            directory.clone(),
            Arc::new(resolver(store.clone(), geocoder.clone(), clock.clone())),
            Arc::new(DirectoryReconciler::new(
                SnapshotStore::new(store.clone()),
                clock.clone(),
            )),
            limiter.clone(),
            store.clone(),
            clock.clone(),
            SyncSettings::default(),
        );

        Self {
            orchestrator,
            store,
            directory,
            geocoder,
            limiter,
            clock,
        }
    }

    /// Reconciler over the same persisted state, for inspection
    pub fn reconciler(&self) -> DirectoryReconciler {
        DirectoryReconciler::new(SnapshotStore::new(self.store.clone()), self.clock.clone())
    }
}
