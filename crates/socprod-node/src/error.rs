use socprod_consensus::ConsensusError;
use socprod_core::CoreError;
use socprod_network::NetworkError;
use socprod_storage::StorageError;
use socprod_sync::SyncError;
use socprod_types::Hash;
use thiserror::Error;

/// Node errors.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Chain error: {0}")]
    Chain(#[from] CoreError),

    #[error("Verification error: {0}")]
    Verification(#[from] ConsensusError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("No pending transactions to propose")]
    NothingToPropose,

    #[error("Unknown block: {0}")]
    UnknownBlock(Hash),

    #[error("Node has stopped")]
    Stopped,
}
