use crate::error::ConsensusError;
use serde::{Deserialize, Serialize};

/// Whether this node takes part in verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Stores blocks and casts verification votes.
    #[default]
    Full,
    /// Relays and tracks, never votes.
    Gossip,
}

impl NodeMode {
    pub fn votes(&self) -> bool {
        matches!(self, NodeMode::Full)
    }
}

/// Verification parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Distinct approving peers needed to finalize a block
    pub threshold: usize,
    /// Seconds a candidate may stay pending before it is discarded
    pub candidate_timeout_secs: u64,
    /// Blocks for which early votes are buffered
    pub vote_buffer_capacity: usize,
    /// Recently closed blocks remembered to ignore late votes
    pub closed_cache_size: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            candidate_timeout_secs: 120,
            vote_buffer_capacity: 1024,
            closed_cache_size: 4096,
        }
    }
}

impl VerificationConfig {
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.threshold == 0 {
            return Err(ConsensusError::InvalidConfig(
                "threshold must be at least 1".into(),
            ));
        }
        if self.candidate_timeout_secs == 0 {
            return Err(ConsensusError::InvalidConfig(
                "candidate_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}
