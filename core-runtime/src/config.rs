//! # Core Configuration Module
//!
//! Provides configuration management for the provider directory core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding the host bridges and the directory settings the core needs.
//! It enforces fail-fast validation so that missing bridges or nonsensical
//! settings are reported before any sync runs.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Directory fetch and geocoding lookups (desktop default: reqwest)
//! - `KeyValueStore` - Coordinate and snapshot persistence (desktop default: SQLite)
//! - `DirectoryConfig` - Endpoints, API key and cache windows
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for the
//! two bridges are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, DirectoryConfig};
//!
//! let directory = DirectoryConfig::new("https://api.example.bj/providers")
//!     .with_api_key("secret");
//!
//! let config = CoreConfig::builder()
//!     .directory(directory)
//!     .build()
//!     .await?;
//! ```
//!
//! ## Error Handling
//!
//! Missing bridges without `desktop-shims` produce
//! [`Error::CapabilityMissing`](crate::error::Error::CapabilityMissing) with a
//! message describing what the host has to inject.

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, KeyValueStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default public geocoding endpoint (Nominatim search API)
pub const DEFAULT_GEOCODING_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";

/// Default user agent sent with geocoding lookups
pub const DEFAULT_USER_AGENT: &str = concat!("health-directory-core/", env!("CARGO_PKG_VERSION"));

const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_DIRECTORY_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_COORDINATE_EXPIRY: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Settings for the provider directory and its geocoding pipeline.
///
/// Directory freshness (hours) and coordinate expiry (months) are separate
/// windows: refetching the provider list is cheap, re-geocoding is rate-limited.
///
/// # Example
///
/// ```no_run
/// use core_runtime::config::DirectoryConfig;
/// use std::time::Duration;
///
/// let config = DirectoryConfig::new("https://api.example.bj/providers")
///     .with_api_key("secret")
///     .with_rate_limit_delay_ms(1500)
///     .with_directory_cache_ttl(Duration::from_secs(6 * 3600));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Remote provider directory endpoint
    pub directory_endpoint: String,

    /// Static key sent as `x-api-key` on directory fetches
    pub api_key: Option<String>,

    /// Geocoding search endpoint
    pub geocoding_endpoint: String,

    /// User agent for geocoding lookups (public endpoints reject anonymous clients)
    pub user_agent: String,

    /// ISO 3166-1 alpha-2 code restricting geocoding results
    pub country_code: String,

    /// Country name appended to geocoding queries
    pub country_name: String,

    /// Minimum delay between consecutive remote geocoding lookups
    pub rate_limit_delay_ms: u64,

    /// Upper bound for any single remote call
    pub request_timeout_ms: u64,

    /// Freshness window of the directory snapshot
    pub directory_cache_ttl: Duration,

    /// Lifetime of a stored coordinate, measured from its own timestamp
    pub coordinate_expiry: Duration,

    /// Drop expired and unreferenced coordinates after a full geocoding pass
    pub evict_orphaned_coordinates: bool,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("directory_endpoint", &self.directory_endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("geocoding_endpoint", &self.geocoding_endpoint)
            .field("user_agent", &self.user_agent)
            .field("country_code", &self.country_code)
            .field("country_name", &self.country_name)
            .field("rate_limit_delay_ms", &self.rate_limit_delay_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("directory_cache_ttl", &self.directory_cache_ttl)
            .field("coordinate_expiry", &self.coordinate_expiry)
            .field(
                "evict_orphaned_coordinates",
                &self.evict_orphaned_coordinates,
            )
            .finish()
    }
}

impl DirectoryConfig {
    /// Creates a configuration for the given directory endpoint with defaults
    /// for everything else (Benin, Nominatim, 1 s pacing, 24 h / 90 d windows).
    pub fn new(directory_endpoint: impl Into<String>) -> Self {
        Self {
            directory_endpoint: directory_endpoint.into(),
            api_key: None,
            geocoding_endpoint: DEFAULT_GEOCODING_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            country_code: "bj".to_string(),
            country_name: "Benin".to_string(),
            rate_limit_delay_ms: DEFAULT_RATE_LIMIT_DELAY_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            directory_cache_ttl: DEFAULT_DIRECTORY_CACHE_TTL,
            coordinate_expiry: DEFAULT_COORDINATE_EXPIRY,
            evict_orphaned_coordinates: true,
        }
    }

    /// Reads the configuration from `DIRECTORY_*` environment variables.
    ///
    /// `DIRECTORY_ENDPOINT` is required. Optional: `DIRECTORY_API_KEY`,
    /// `DIRECTORY_GEOCODING_ENDPOINT`, `DIRECTORY_USER_AGENT`,
    /// `DIRECTORY_COUNTRY_CODE`, `DIRECTORY_COUNTRY_NAME`,
    /// `DIRECTORY_RATE_LIMIT_MS`, `DIRECTORY_REQUEST_TIMEOUT_MS`,
    /// `DIRECTORY_CACHE_TTL_SECS`, `DIRECTORY_COORDINATE_EXPIRY_DAYS`,
    /// `DIRECTORY_EVICT_ORPHANS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("DIRECTORY_ENDPOINT")
            .ok_or_else(|| Error::Config("DIRECTORY_ENDPOINT is not set".to_string()))?;

        let mut config = Self::new(endpoint);

        if let Some(key) = lookup("DIRECTORY_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(endpoint) = lookup("DIRECTORY_GEOCODING_ENDPOINT") {
            config.geocoding_endpoint = endpoint;
        }
        if let Some(agent) = lookup("DIRECTORY_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(code) = lookup("DIRECTORY_COUNTRY_CODE") {
            config.country_code = code.to_lowercase();
        }
        if let Some(name) = lookup("DIRECTORY_COUNTRY_NAME") {
            config.country_name = name;
        }
        if let Some(raw) = lookup("DIRECTORY_RATE_LIMIT_MS") {
            config.rate_limit_delay_ms = parse_number("DIRECTORY_RATE_LIMIT_MS", &raw)?;
        }
        if let Some(raw) = lookup("DIRECTORY_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_number("DIRECTORY_REQUEST_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("DIRECTORY_CACHE_TTL_SECS") {
            config.directory_cache_ttl =
                Duration::from_secs(parse_number("DIRECTORY_CACHE_TTL_SECS", &raw)?);
        }
        if let Some(raw) = lookup("DIRECTORY_COORDINATE_EXPIRY_DAYS") {
            let days = parse_number("DIRECTORY_COORDINATE_EXPIRY_DAYS", &raw)?;
            config.coordinate_expiry = Duration::from_secs(days * 24 * 60 * 60);
        }
        if let Some(raw) = lookup("DIRECTORY_EVICT_ORPHANS") {
            config.evict_orphaned_coordinates = match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(Error::Config(format!(
                        "DIRECTORY_EVICT_ORPHANS must be a boolean, got '{}'",
                        other
                    )))
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the API key for directory fetches
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the geocoding endpoint
    pub fn with_geocoding_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.geocoding_endpoint = endpoint.into();
        self
    }

    /// Sets the geocoding user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the operating country (code for result restriction, name for queries)
    pub fn with_country(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.country_code = code.into().to_lowercase();
        self.country_name = name.into();
        self
    }

    /// Sets the minimum delay between remote geocoding lookups
    pub fn with_rate_limit_delay_ms(mut self, delay_ms: u64) -> Self {
        self.rate_limit_delay_ms = delay_ms;
        self
    }

    /// Sets the per-request timeout
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Sets the directory snapshot freshness window
    pub fn with_directory_cache_ttl(mut self, ttl: Duration) -> Self {
        self.directory_cache_ttl = ttl;
        self
    }

    /// Sets the coordinate expiry window
    pub fn with_coordinate_expiry(mut self, expiry: Duration) -> Self {
        self.coordinate_expiry = expiry;
        self
    }

    /// Enables or disables the post-pass eviction sweep
    pub fn with_orphan_eviction(mut self, enabled: bool) -> Self {
        self.evict_orphaned_coordinates = enabled;
        self
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("Directory endpoint", &self.directory_endpoint),
            ("Geocoding endpoint", &self.geocoding_endpoint),
        ] {
            if url.trim().is_empty() {
                return Err(Error::Config(format!("{} cannot be empty", name)));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }

        if let Some(ref key) = self.api_key {
            if key.trim().is_empty() {
                return Err(Error::Config("API key cannot be empty".to_string()));
            }
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config(
                "Geocoding user agent cannot be empty".to_string(),
            ));
        }

        if self.country_code.len() != 2 || !self.country_code.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(Error::Config(format!(
                "Country code must be a two-letter ISO code, got '{}'",
                self.country_code
            )));
        }

        if self.rate_limit_delay_ms > 60_000 {
            return Err(Error::Config(
                "Rate limit delay exceeds maximum of 60 seconds (60,000ms)".to_string(),
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(Error::Config(
                "Request timeout must be greater than 0ms".to_string(),
            ));
        }

        if self.directory_cache_ttl.is_zero() {
            return Err(Error::Config(
                "Directory cache TTL must be greater than zero".to_string(),
            ));
        }

        if self.coordinate_expiry < self.directory_cache_ttl {
            return Err(Error::Config(
                "Coordinate expiry must not be shorter than the directory cache TTL".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_number(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| Error::Config(format!("{} must be a non-negative integer: {}", name, e)))
}

/// Core configuration for the provider directory core.
///
/// Holds the bridges and settings required to construct the directory
/// service. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client for directory and geocoding requests
    pub http_client: Arc<dyn HttpClient>,

    /// Persistence substrate for coordinates and snapshots
    pub key_value_store: Arc<dyn KeyValueStore>,

    /// Directory and geocoding settings
    pub directory: DirectoryConfig,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("key_value_store", &"KeyValueStore { ... }")
            .field("directory", &self.directory)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.directory.validate()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient",
        message: "HttpClient implementation is required for directory fetches and geocoding. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Mobile: inject the platform networking stack."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn key_value_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "KeyValueStore",
        message: "KeyValueStore implementation is required for coordinate and snapshot caching. \
                 Desktop: enable the 'desktop-shims' feature to use the default SqliteKeyValueStore. \
                 Mobile: inject AsyncStorage/SharedPreferences/UserDefaults-backed storage."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(directory: &DirectoryConfig) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(directory.request_timeout()).map_err(
        |source| Error::DefaultBridge {
            capability: "HttpClient",
            source,
        },
    )?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_directory: &DirectoryConfig) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
async fn provide_default_key_value_store(
    store_path: Option<PathBuf>,
) -> Result<Arc<dyn KeyValueStore>> {
    use bridge_desktop::SqliteKeyValueStore;

    let path = store_path.unwrap_or_else(SqliteKeyValueStore::default_path);
    let store = SqliteKeyValueStore::new(path)
        .await
        .map_err(|source| Error::DefaultBridge {
            capability: "KeyValueStore",
            source,
        })?;
    let store: Arc<dyn KeyValueStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
async fn provide_default_key_value_store(
    _store_path: Option<PathBuf>,
) -> Result<Arc<dyn KeyValueStore>> {
    Err(key_value_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Building is async because the default SQLite store has to be opened.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    key_value_store: Option<Arc<dyn KeyValueStore>>,
    store_path: Option<PathBuf>,
    directory: Option<DirectoryConfig>,
}

impl CoreConfigBuilder {
    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the reqwest-based default is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the key-value store implementation.
    ///
    /// If not provided, a SQLite store is opened when the `desktop-shims`
    /// feature is enabled.
    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.key_value_store = Some(store);
        self
    }

    /// Sets the database file for the default SQLite store.
    ///
    /// Ignored when a store is injected.
    pub fn store_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Sets the directory settings (required).
    pub fn directory(mut self, directory: DirectoryConfig) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the directory settings are missing or invalid
    /// - [`Error::CapabilityMissing`] if a bridge is missing and no default exists
    pub async fn build(self) -> Result<CoreConfig> {
        let directory = self
            .directory
            .ok_or_else(|| Error::Config("Directory configuration is required".to_string()))?;
        directory.validate()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(&directory)?,
        };

        let key_value_store = match self.key_value_store {
            Some(store) => store,
            None => provide_default_key_value_store(self.store_path).await?,
        };

        let config = CoreConfig {
            http_client,
            key_value_store,
            directory,
        };
        config.validate()?;

        Ok(config)
    }
}
