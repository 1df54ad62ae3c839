//! Capabilities the provider directory core needs from its host.
//!
//! The core never opens sockets, files or databases itself. A host (the
//! desktop shims in `bridge-desktop`, or a mobile shell) hands it:
//!
//! - an [`HttpClient`](http::HttpClient) for the directory API and the
//!   geocoding service
//! - a [`KeyValueStore`](storage::KeyValueStore) for the cached directory,
//!   coordinates and reconciliation records
//! - optionally a [`Clock`](time::Clock) and a [`LoggerSink`](time::LoggerSink)
//!
//! Every trait is `Send + Sync` and used behind an `Arc`. Failures are
//! reported as [`BridgeError`](error::BridgeError); the core treats
//! [`is_transient`](error::BridgeError::is_transient) failures as "try again
//! next sync" and never as data loss.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::KeyValueStore;
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
