//! Directory Snapshot Store
//!
//! Persists the full geocoded provider list and the reconciliation metadata
//! under two fixed keys. Reads never fail (absent or outdated data is `None`);
//! writes report storage errors so the caller can log them.

use crate::error::Result;
use crate::models::{GeocodedProviderRecord, ReconciliationMetadata};
use bridge_traits::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Persistence key of the provider snapshot
pub const SNAPSHOT_KEY: &str = "directory.snapshot";

/// Persistence key of the reconciliation metadata
pub const RECONCILIATION_KEY: &str = "directory.reconciliation";

const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PersistedSnapshot {
    version: u32,
    records: Vec<GeocodedProviderRecord>,
}

pub struct SnapshotStore {
    store: Arc<dyn KeyValueStore>,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load_snapshot(&self) -> Option<Vec<GeocodedProviderRecord>> {
        let raw = self.read(SNAPSHOT_KEY).await?;
        match serde_json::from_str::<PersistedSnapshot>(&raw) {
            Ok(snapshot) if snapshot.version == SCHEMA_VERSION => Some(snapshot.records),
            Ok(snapshot) => {
                warn!(version = snapshot.version, "Snapshot schema mismatch, ignoring");
                None
            }
            Err(e) => {
                warn!(error = %e, "Snapshot corrupt, ignoring");
                None
            }
        }
    }

    /// Metadata is only checked for presence of a schema tag, not for its value.
    pub async fn load_metadata(&self) -> Option<ReconciliationMetadata> {
        let raw = self.read(RECONCILIATION_KEY).await?;
        match serde_json::from_str::<ReconciliationMetadata>(&raw) {
            Ok(metadata) if !metadata.schema_version.is_empty() => Some(metadata),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Reconciliation metadata corrupt, ignoring");
                None
            }
        }
    }

    /// Writes the snapshot first, then the metadata describing it.
    pub async fn save(
        &self,
        records: &[GeocodedProviderRecord],
        metadata: &ReconciliationMetadata,
    ) -> Result<()> {
        let snapshot = serde_json::to_string(&PersistedSnapshot {
            version: SCHEMA_VERSION,
            records: records.to_vec(),
        })?;
        self.store.set(SNAPSHOT_KEY, &snapshot).await?;

        let metadata_raw = serde_json::to_string(metadata)?;
        self.store.set(RECONCILIATION_KEY, &metadata_raw).await?;

        debug!(
            providers = records.len(),
            geocoded = metadata.geocoded_at_last_pass,
            "Persisted directory snapshot"
        );
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.store
            .remove_many(&[SNAPSHOT_KEY, RECONCILIATION_KEY])
            .await?;
        Ok(())
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = key, error = %e, "Snapshot storage unreadable");
                None
            }
        }
    }
}
