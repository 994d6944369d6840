use crate::hash::Hash;
use crate::peer::PeerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statement that `voter` approves the candidate block `block_hash`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationVote {
    pub block_hash: Hash,
    pub voter: PeerId,
}

impl VerificationVote {
    pub fn new(block_hash: Hash, voter: PeerId) -> Self {
        Self { block_hash, voter }
    }
}

impl fmt::Display for VerificationVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vote({} by {})", self.block_hash.short(), self.voter)
    }
}
