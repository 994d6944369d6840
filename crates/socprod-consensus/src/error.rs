use socprod_core::CoreError;
use socprod_types::Hash;
use thiserror::Error;

/// Errors that can occur in verification.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Block {0} is not a pending candidate")]
    UnknownCandidate(Hash),

    #[error("Block {block} rejected: {reason}")]
    Rejected { block: Hash, reason: String },

    #[error("Chain error: {0}")]
    Chain(#[from] CoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConsensusError::Rejected {
            block: Hash::ZERO,
            reason: "unknown author".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rejected"));
        assert!(msg.contains("unknown author"));
    }
}
