use serde::{Deserialize, Serialize};

/// Chain manager limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Maximum transactions in one block
    pub max_block_transactions: usize,
    /// Candidates with an unknown parent held for retry
    pub orphan_pool_size: usize,
    /// Finalized blocks held while their parent is still unfinalized
    pub detached_pool_size: usize,
    /// Discarded hashes remembered so re-receipt is ignored. Only the most
    /// recent `discarded_cache_size` discards are remembered; an older
    /// discarded block that is received again is treated as a new candidate
    /// and goes through verification from scratch.
    pub discarded_cache_size: usize,
    /// Merkle stores of finalized blocks kept in memory
    pub merkle_cache_size: usize,
    /// Transactions held in the pool before submissions are refused
    pub max_pending_transactions: usize,
    /// Pending transactions that trigger a block proposal
    pub block_batch_size: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_block_transactions: 256,
            orphan_pool_size: 64,
            detached_pool_size: 64,
            discarded_cache_size: 1024,
            merkle_cache_size: 128,
            max_pending_transactions: 10_000,
            block_batch_size: 10,
        }
    }
}
