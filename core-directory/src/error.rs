use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors surfaced by the directory core.
///
/// Payloads are plain strings so the error is `Clone`; overlapping `sync`
/// calls share a single result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("No provider data available: {0}")]
    NoData(String),

    #[error("Directory fetch failed: {0}")]
    Fetch(String),

    #[error("Geocoding failed: {0}")]
    Geocoding(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Bridge error: {0}")]
    Bridge(String),
}

impl From<BridgeError> for DirectoryError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Timeout(what) => DirectoryError::Timeout(what),
            BridgeError::StorageError(msg) => DirectoryError::Storage(msg),
            BridgeError::Decode(msg) => DirectoryError::Parse(msg),
            other => DirectoryError::Bridge(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(err: serde_json::Error) -> Self {
        DirectoryError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_mapping() {
        assert_eq!(
            DirectoryError::from(BridgeError::Timeout("geocode".to_string())),
            DirectoryError::Timeout("geocode".to_string())
        );
        assert_eq!(
            DirectoryError::from(BridgeError::StorageError("locked".to_string())),
            DirectoryError::Storage("locked".to_string())
        );
        assert!(matches!(
            DirectoryError::from(BridgeError::Network("offline".to_string())),
            DirectoryError::Bridge(_)
        ));
        assert!(matches!(
            DirectoryError::from(BridgeError::Decode("eof".to_string())),
            DirectoryError::Parse(_)
        ));
    }
}
