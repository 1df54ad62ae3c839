//! # Geocoding
//!
//! Turns an address and city into coordinates.
//!
//! - [`Geocoder`] - one remote lookup for a free-text query
//! - [`NominatimGeocoder`] - OpenStreetMap Nominatim implementation
//! - [`FallbackTable`] - static city centers for the operating country
//! - [`GeocodingResolver`] - cache, then remote lookup, then fallback table

mod fallback;
mod nominatim;
mod resolver;

pub use fallback::FallbackTable;
pub use nominatim::NominatimGeocoder;
pub use resolver::GeocodingResolver;

use crate::error::Result;
use async_trait::async_trait;

/// Best candidate returned by a remote lookup
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: Option<String>,
}

impl GeocodeHit {
    /// Latitude and longitude are finite and within WGS84 bounds
    pub fn is_usable(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Remote geocoding lookup.
///
/// Implementations restrict results to their operating country and return the
/// single best match. `Ok(None)` means the service answered with no result.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Option<GeocodeHit>>;
}
