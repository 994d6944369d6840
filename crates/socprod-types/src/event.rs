use crate::hash::Hash;
use serde::{Deserialize, Serialize};

/// Why a candidate block left the pending set without finalizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscardReason {
    /// Finality was not reached within the verification window.
    TimedOut,
    /// The candidate failed validation after it was registered.
    Invalid,
}

/// Snapshot of how complete the local chain is relative to peers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Height of the local canonical head
    pub local_height: u64,
    /// Highest head height announced by any peer
    pub target_height: u64,
    /// Canonical blocks whose transactions are not held locally
    pub missing_bodies: u64,
    /// Blocks the active strategy will not fetch (budget or window)
    pub gap: u64,
}

/// State changes published to subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    BlockFinalized {
        hash: Hash,
        height: u64,
    },
    ForkAdopted {
        old_head: Hash,
        new_head: Hash,
        /// Height of the last block shared by both chains
        fork_height: u64,
        /// Blocks dropped from the canonical view, oldest first
        orphaned: Vec<Hash>,
    },
    CandidateDiscarded {
        hash: Hash,
        reason: DiscardReason,
    },
    SyncProgress(SyncProgress),
}
