//! Workspace umbrella crate.
//!
//! Host applications can depend on `health-directory-workspace` and enable the
//! `desktop-shims` feature to get the provider directory core together with the
//! desktop bridge defaults, without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_directory as directory;

#[cfg(feature = "desktop-shims")]
pub use core_runtime as runtime;
