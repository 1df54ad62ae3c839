//! Filtering and statistics over a provider list.
//!
//! Providers without coordinates stay visible to every filter except the
//! radius filter, which needs a location to measure from.

use crate::cache_key::normalize;
use crate::models::{GeocodedProviderRecord, Sector};
use serde::Serialize;
use std::collections::BTreeMap;

/// Mean Earth radius used by [`haversine_km`]
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Center point and radius for proximity search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusFilter {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

/// Conjunction of optional filters; an empty criteria set matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    /// Case-insensitive substring of name, type, address or city
    pub search: Option<String>,
    pub provider_type: Option<String>,
    pub city: Option<String>,
    pub sector: Option<Sector>,
    pub agreement: Option<bool>,
    pub radius: Option<RadiusFilter>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn provider_type(mut self, provider_type: impl Into<String>) -> Self {
        self.provider_type = Some(provider_type.into());
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn sector(mut self, sector: Sector) -> Self {
        self.sector = Some(sector);
        self
    }

    pub fn agreement(mut self, agreement: bool) -> Self {
        self.agreement = Some(agreement);
        self
    }

    pub fn within(mut self, latitude: f64, longitude: f64, radius_km: f64) -> Self {
        self.radius = Some(RadiusFilter {
            latitude,
            longitude,
            radius_km,
        });
        self
    }

    fn matches(&self, record: &GeocodedProviderRecord) -> bool {
        let provider = &record.provider;

        if let Some(search) = self.search.as_deref().map(normalize).filter(|s| !s.is_empty()) {
            let hit = [
                &provider.name,
                &provider.provider_type,
                &provider.address,
                &provider.city,
            ]
            .iter()
            .any(|field| normalize(field).contains(&search));
            if !hit {
                return false;
            }
        }

        if let Some(ref provider_type) = self.provider_type {
            if normalize(&provider.provider_type) != normalize(provider_type) {
                return false;
            }
        }

        if let Some(ref city) = self.city {
            if normalize(&provider.city) != normalize(city) {
                return false;
            }
        }

        if self.sector.is_some_and(|sector| sector != provider.sector) {
            return false;
        }

        if self
            .agreement
            .is_some_and(|agreement| agreement != provider.agreement)
        {
            return false;
        }

        true
    }
}

/// Applies `criteria` to `records`.
///
/// With a radius filter, ungeocoded records are excluded, each match carries
/// `distance_km` and the result is sorted nearest first. Otherwise input
/// order is kept and `distance_km` is cleared.
pub fn filter(
    records: &[GeocodedProviderRecord],
    criteria: &FilterCriteria,
) -> Vec<GeocodedProviderRecord> {
    let matching = records.iter().filter(|record| criteria.matches(record));

    let Some(radius) = criteria.radius else {
        return matching
            .cloned()
            .map(|mut record| {
                record.distance_km = None;
                record
            })
            .collect();
    };

    let mut within: Vec<GeocodedProviderRecord> = matching
        .filter_map(|record| {
            let coordinates = record.coordinates.as_ref()?;
            let distance = haversine_km(
                radius.latitude,
                radius.longitude,
                coordinates.latitude,
                coordinates.longitude,
            );
            (distance <= radius.radius_km).then(|| {
                let mut record = record.clone();
                record.distance_km = Some(distance);
                record
            })
        })
        .collect();

    within.sort_by(|a, b| {
        let a = a.distance_km.unwrap_or(f64::INFINITY);
        let b = b.distance_km.unwrap_or(f64::INFINITY);
        a.total_cmp(&b)
    });
    within
}

/// Great-circle distance in kilometers between two WGS84 points.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Counts over a provider list.
///
/// Type and city buckets are keyed on the normalized spelling, the same one
/// [`filter`] matches on, so `Cotonou` and `COTONOU ` count together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    pub total: usize,
    pub geocoded: usize,
    pub agreement: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_city: BTreeMap<String, usize>,
    pub by_sector: BTreeMap<Sector, usize>,
}

pub fn stats(records: &[GeocodedProviderRecord]) -> DirectoryStats {
    records
        .iter()
        .fold(DirectoryStats::default(), |mut stats, record| {
            let provider = &record.provider;

            stats.total += 1;
            if record.is_geocoded() {
                stats.geocoded += 1;
            }
            if provider.agreement {
                stats.agreement += 1;
            }
            *stats
                .by_type
                .entry(normalize(&provider.provider_type))
                .or_default() += 1;
            *stats
                .by_city
                .entry(normalize(&provider.city))
                .or_default() += 1;
            *stats.by_sector.entry(provider.sector).or_default() += 1;

            stats
        })
}
