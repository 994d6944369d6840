use socprod_types::Hash;
use thiserror::Error;

/// Structural defects that cause a block to be rejected outright.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Malformed {
    #[error("block hash mismatch: stored {stored}, computed {computed}")]
    HashMismatch { stored: Hash, computed: Hash },

    #[error("merkle root mismatch: header {header}, computed {computed}")]
    MerkleRootMismatch { header: Hash, computed: Hash },

    #[error("block carries no transactions")]
    Empty,

    #[error("too many transactions: max {max}, got {got}")]
    TooManyTransactions { max: usize, got: usize },

    #[error("duplicate transaction {0}")]
    DuplicateTransaction(Hash),

    #[error("invalid transaction {hash}: {reason}")]
    InvalidTransaction { hash: Hash, reason: String },

    #[error("height mismatch: parent at {parent}, block at {got}")]
    HeightMismatch { parent: u64, got: u64 },

    #[error("only the shared genesis block may have height 0")]
    Genesis,
}

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Malformed entity: {0}")]
    MalformedEntity(#[from] Malformed),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] socprod_types::TypesError),

    #[error("Block not found: {0}")]
    BlockNotFound(Hash),

    #[error("Block {0} is not a pending candidate")]
    NotCandidate(Hash),

    #[error("Block {0} has no local body")]
    BodyUnavailable(Hash),

    #[error("Merkle error: {0}")]
    Merkle(#[from] socprod_crypto::MerkleError),

    #[error("Corrupt chain store: {0}")]
    CorruptStore(String),

    #[error("Transaction pool full: {0} pending")]
    PoolFull(usize),

    #[error("Storage error: {0}")]
    Storage(#[from] socprod_storage::StorageError),
}
