//! Location keys for the coordinate cache.
//!
//! Providers sharing a normalized address and city share one cache entry.

/// Trim, lowercase and collapse whitespace runs to a single space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Coordinate cache key: `normalize(address) + "|" + normalize(city)`.
pub fn cache_key(address: &str, city: &str) -> String {
    format!("{}|{}", normalize(address), normalize(city))
}
