use crate::hash::Hash;
use crate::peer::PeerId;
use crate::transaction::Transaction;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed per-block overhead added to size estimates.
pub const BLOCK_OVERHEAD_BYTES: usize = 256;

/// Proposer name carried by the genesis block.
pub const GENESIS_PROPOSER: &str = "genesis";

/// Block header. Every field is covered by the block hash.
#[derive(
    Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct BlockHeader {
    /// Block height (parent height + 1)
    pub height: u64,
    /// Hash of the parent block
    pub parent_hash: Hash,
    /// Merkle root over the content hashes of the block's transactions
    pub merkle_root: Hash,
    /// Unix timestamp (seconds) of the newest transaction in the block
    pub timestamp: u64,
    /// Peer that assembled the block
    pub proposer: PeerId,
}

impl BlockHeader {
    pub fn new(
        height: u64,
        parent_hash: Hash,
        merkle_root: Hash,
        timestamp: u64,
        proposer: PeerId,
    ) -> Self {
        Self {
            height,
            parent_hash,
            merkle_root,
            timestamp,
            proposer,
        }
    }

    /// Compute the hash of this header
    pub fn compute_hash(&self) -> Hash {
        let proposer = self.proposer.as_str().as_bytes();
        Hash::compute_multi(&[
            &self.height.to_le_bytes(),
            self.parent_hash.as_bytes(),
            self.merkle_root.as_bytes(),
            &self.timestamp.to_le_bytes(),
            &(proposer.len() as u32).to_le_bytes(),
            proposer,
        ])
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

/// A batch of transactions proposed by one peer, together with the hash
/// computed when it was sealed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub hash: Hash,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Seal a header and its transactions, computing the block hash.
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        let hash = header.compute_hash();
        Self {
            header,
            hash,
            transactions,
        }
    }

    /// The genesis block shared by every node.
    pub fn genesis() -> Self {
        Self::new(
            BlockHeader::new(0, Hash::ZERO, Hash::ZERO, 0, PeerId::from(GENESIS_PROPOSER)),
            Vec::new(),
        )
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    /// True if the stored hash matches the header.
    pub fn verify_hash(&self) -> bool {
        self.header.compute_hash() == self.hash
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Estimated storage footprint: encoded transactions plus a fixed
    /// per-block overhead.
    pub fn estimated_size(&self) -> usize {
        BLOCK_OVERHEAD_BYTES
            + self
                .transactions
                .iter()
                .map(Transaction::encoded_len)
                .sum::<usize>()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block(#{} {} txs={} by {})",
            self.header.height,
            self.hash.short(),
            self.transactions.len(),
            self.header.proposer
        )
    }
}
