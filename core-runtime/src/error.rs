use bridge_traits::BridgeError;
use thiserror::Error;

/// Setup failures. Each one is a host misconfiguration, none is retryable.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No implementation was injected and no platform default is compiled in.
    #[error("{capability} not provided: {message}")]
    CapabilityMissing {
        capability: &'static str,
        message: String,
    },

    /// A platform default exists but could not be created.
    #[error("Default {capability} failed to start: {source}")]
    DefaultBridge {
        capability: &'static str,
        #[source]
        source: BridgeError,
    },

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
