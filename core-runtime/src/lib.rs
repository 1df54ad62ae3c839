//! Process-level plumbing shared by the directory crates.
//!
//! [`logging`] installs the tracing subscriber (pretty, compact or JSON,
//! with optional forwarding to a host [`LoggerSink`](bridge_traits::time::LoggerSink)).
//! [`config`] assembles the host bridges and the directory settings into a
//! [`CoreConfig`](config::CoreConfig), falling back to the desktop shims when
//! the `desktop-shims` feature is on.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
