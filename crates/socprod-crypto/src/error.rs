use socprod_types::Hash;
use thiserror::Error;

/// Errors that can occur in Merkle store operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MerkleError {
    #[error("Transaction {0} is not part of this Merkle store")]
    NotFound(Hash),

    #[error("Merkle proof invalid")]
    InvalidProof,
}
