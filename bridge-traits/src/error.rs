use thiserror::Error;

/// Failure reported by a host bridge.
///
/// Messages carry the key, URL or host detail needed to act on the failure;
/// they never carry request bodies or credentials.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host cannot provide the capability at all (no network stack,
    /// database could not be opened, client could not be built).
    #[error("Bridge capability unavailable: {0}")]
    Unavailable(String),

    /// Transport-level failure: DNS, connect, TLS, reset.
    #[error("Network error: {0}")]
    Network(String),

    /// A response arrived but its body could not be decoded.
    #[error("Undecodable response: {0}")]
    Decode(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Network(_) | BridgeError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
