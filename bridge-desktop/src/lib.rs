//! Desktop hosts (macOS, Windows, Linux) for the bridge traits.
//!
//! [`ReqwestHttpClient`] serves the directory and geocoding calls and
//! [`SqliteKeyValueStore`] keeps the cached directory in a single SQLite
//! table under the platform data directory.
//!
//! ```ignore
//! let http = Arc::new(ReqwestHttpClient::new()?);
//! let store = Arc::new(SqliteKeyValueStore::new(SqliteKeyValueStore::default_path()).await?);
//! ```
//!
//! `core-runtime` wires both in automatically when built with its
//! `desktop-shims` feature.

mod http;
mod kv_store;

pub use http::ReqwestHttpClient;
pub use kv_store::SqliteKeyValueStore;
