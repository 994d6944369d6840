use socprod_core::CoreError;
use socprod_types::PeerId;
use thiserror::Error;

/// Errors that can occur during synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid time range: from {from} is after to {to}")]
    InvalidTimeRange { from: u64, to: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unexpected response from {0}")]
    UnexpectedResponse(PeerId),

    #[error("Chain error: {0}")]
    Chain(#[from] CoreError),
}
