use crate::source::Address;
use thiserror::Error as ThisError;

/// Failure of a single read or write against a coil source.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The coil does not exist on this device/model.
    #[error("Coil {0} not found")]
    NotFound(Address),

    /// Read failed but may succeed if attempted again.
    #[error("Transient coil error: {0}")]
    Transient(String),

    /// Malformed response or other unrecoverable failure.
    #[error("Fatal coil error: {0}")]
    Fatal(String),
}

#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    #[error("Failed to update coil {address}: {source}")]
    RefreshFailed {
        address: Address,
        #[source]
        source: FetchError,
    },

    #[error("Failed to write coil {address}: {source}")]
    WriteFailed {
        address: Address,
        #[source]
        source: FetchError,
    },

    #[error("Failed to start coil source: {0}")]
    StartFailed(#[source] FetchError),

    #[error("Coordinator was shut down")]
    Cancelled,
}

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Connection type {0} is not supported")]
    UnsupportedConnection(String),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
