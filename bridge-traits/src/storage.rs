//! Key-Value Storage Abstraction
//!
//! Provides a platform-agnostic async string key-value store. Callers persist
//! structured data by serializing it to JSON under a fixed key; the store has
//! no notion of sub-key updates, so the unit of consistency is one value.

use async_trait::async_trait;

use crate::error::Result;

/// Async key-value storage trait
///
/// Abstracts platform-specific persistent storage:
/// - iOS: UserDefaults / file-backed AsyncStorage
/// - Android: SharedPreferences / DataStore
/// - Desktop: SQLite-backed table (see `bridge-desktop`)
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::KeyValueStore;
///
/// async fn remember(store: &dyn KeyValueStore) -> Result<()> {
///     store.set("directory.last_synced_at", "1718000000000").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value, `Ok(None)` if the key does not exist
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// List all stored keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Check if a key exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Remove several keys
    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}
