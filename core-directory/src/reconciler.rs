//! # Directory Reconciler
//!
//! Decides whether the stored snapshot's coordinates can be trusted for a
//! freshly fetched directory, and merges stored coordinates onto fresh records.
//!
//! A full geocoding pass is needed when any of these hold:
//! - no snapshot is stored
//! - no reconciliation metadata is stored
//! - the provider count differs from the last pass
//! - a fresh id is missing from the snapshot
//! - an id present in both changed its address or city
//!
//! The reconciler is the only writer of the [`SnapshotStore`].

use crate::error::Result;
use crate::models::{GeocodedProviderRecord, ProviderRecord, ReconciliationMetadata};
use crate::snapshot_store::SnapshotStore;
use bridge_traits::time::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Schema tag written into reconciliation metadata
pub const METADATA_SCHEMA_VERSION: &str = "1";

pub struct DirectoryReconciler {
    snapshots: SnapshotStore,
    clock: Arc<dyn Clock>,
}

impl DirectoryReconciler {
    pub fn new(snapshots: SnapshotStore, clock: Arc<dyn Clock>) -> Self {
        Self { snapshots, clock }
    }

    pub async fn needs_full_pass(&self, fresh: &[ProviderRecord]) -> bool {
        let snapshot = self.snapshots.load_snapshot().await;
        let metadata = self.snapshots.load_metadata().await;
        let reason = full_pass_reason(snapshot.as_deref(), metadata.as_ref(), fresh);

        match reason {
            Some(reason) => {
                debug!(reason = reason, "Full geocoding pass required");
                true
            }
            None => false,
        }
    }

    /// Attaches stored coordinates to fresh records by id.
    ///
    /// Coordinates are not checked for expiry here. A record whose address or
    /// city changed gets no coordinate so that it is geocoded again.
    pub async fn merge(&self, fresh: Vec<ProviderRecord>) -> Vec<GeocodedProviderRecord> {
        let snapshot = self.snapshots.load_snapshot().await.unwrap_or_default();
        merge_with(&snapshot, fresh, self.clock.now())
    }

    /// Persists the merged list and fresh metadata describing it.
    pub async fn commit(
        &self,
        records: &[GeocodedProviderRecord],
    ) -> Result<ReconciliationMetadata> {
        let metadata = ReconciliationMetadata {
            total_at_last_pass: records.len(),
            geocoded_at_last_pass: records.iter().filter(|r| r.is_geocoded()).count(),
            last_pass_at: self.clock.now(),
            schema_version: METADATA_SCHEMA_VERSION.to_string(),
        };
        self.snapshots.save(records, &metadata).await?;
        Ok(metadata)
    }

    pub async fn snapshot(&self) -> Option<Vec<GeocodedProviderRecord>> {
        self.snapshots.load_snapshot().await
    }

    pub async fn metadata(&self) -> Option<ReconciliationMetadata> {
        self.snapshots.load_metadata().await
    }

    pub async fn clear(&self) -> Result<()> {
        self.snapshots.clear().await
    }
}

fn full_pass_reason(
    snapshot: Option<&[GeocodedProviderRecord]>,
    metadata: Option<&ReconciliationMetadata>,
    fresh: &[ProviderRecord],
) -> Option<&'static str> {
    let Some(snapshot) = snapshot else {
        return Some("no snapshot");
    };
    let Some(metadata) = metadata else {
        return Some("no reconciliation metadata");
    };
    if fresh.len() != metadata.total_at_last_pass {
        return Some("provider count changed");
    }

    let cached: HashMap<u64, &ProviderRecord> =
        snapshot.iter().map(|r| (r.id(), &r.provider)).collect();

    for record in fresh {
        match cached.get(&record.id) {
            None => return Some("new provider"),
            Some(previous) if previous.location_differs(record) => {
                return Some("provider relocated")
            }
            Some(_) => {}
        }
    }

    None
}

fn merge_with(
    snapshot: &[GeocodedProviderRecord],
    fresh: Vec<ProviderRecord>,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<GeocodedProviderRecord> {
    let cached: HashMap<u64, &GeocodedProviderRecord> =
        snapshot.iter().map(|r| (r.id(), r)).collect();

    fresh
        .into_iter()
        .map(|provider| {
            let coordinates = cached
                .get(&provider.id)
                .filter(|previous| !previous.provider.location_differs(&provider))
                .and_then(|previous| previous.coordinates.clone());

            GeocodedProviderRecord {
                provider,
                coordinates,
                last_updated: now,
                distance_km: None,
            }
        })
        .collect()
}
