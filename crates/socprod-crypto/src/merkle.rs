use crate::error::MerkleError;
use crate::hash::hash_pair;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use socprod_types::{Hash, Transaction};
use std::collections::HashMap;

/// Binary Merkle tree over a block's transaction content hashes.
///
/// Leaves keep insertion order. When a level has an odd number of nodes the
/// last one is paired with itself. An empty store has root `Hash::ZERO` and a
/// single-leaf store has the leaf as its root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleStore {
    /// `levels[0]` are the leaves, the last level holds the root.
    levels: Vec<Vec<Hash>>,
    positions: HashMap<Hash, usize>,
}

impl MerkleStore {
    /// Build a store from an ordered sequence of transactions.
    pub fn build(transactions: &[Transaction]) -> Self {
        Self::from_leaves(transactions.iter().map(|tx| tx.content_hash).collect())
    }

    /// Build a store from leaf hashes, e.g. when reloading from disk.
    pub fn from_leaves(leaves: Vec<Hash>) -> Self {
        let mut positions = HashMap::with_capacity(leaves.len());
        for (index, leaf) in leaves.iter().enumerate() {
            positions.entry(*leaf).or_insert(index);
        }

        let mut levels = vec![leaves];
        while levels.last().map_or(false, |level| level.len() > 1) {
            let current = &levels[levels.len() - 1];
            let next: Vec<Hash> = current
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&pair[0])))
                .collect();
            levels.push(next);
        }

        Self { levels, positions }
    }

    /// Get the root hash.
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    pub fn leaves(&self) -> &[Hash] {
        &self.levels[0]
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    pub fn contains(&self, leaf: &Hash) -> bool {
        self.positions.contains_key(leaf)
    }

    /// Produce an inclusion proof for a transaction.
    pub fn prove(&self, transaction: &Transaction) -> Result<MerkleProof, MerkleError> {
        self.prove_hash(&transaction.content_hash)
    }

    /// Produce an inclusion proof for a leaf hash.
    pub fn prove_hash(&self, leaf: &Hash) -> Result<MerkleProof, MerkleError> {
        let index = *self
            .positions
            .get(leaf)
            .ok_or(MerkleError::NotFound(*leaf))?;
        self.proof_at(index).ok_or(MerkleError::NotFound(*leaf))
    }

    /// Produce an inclusion proof for the leaf at `index`.
    pub fn proof_at(&self, index: usize) -> Option<MerkleProof> {
        let leaf = *self.levels[0].get(index)?;
        let mut siblings = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut position = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = if position % 2 == 0 {
                level.get(position + 1).unwrap_or(&level[position])
            } else {
                &level[position - 1]
            };
            siblings.push(*sibling);
            position /= 2;
        }

        Some(MerkleProof {
            leaf,
            index: index as u64,
            siblings,
        })
    }
}

/// Merkle inclusion proof: the sibling path from a leaf to the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct MerkleProof {
    pub leaf: Hash,
    pub index: u64,
    pub siblings: Vec<Hash>,
}

impl MerkleProof {
    /// Verify this proof against an expected root.
    pub fn verify(&self, root: &Hash) -> bool {
        &self.compute_root() == root
    }

    /// Compute the root from this proof.
    pub fn compute_root(&self) -> Hash {
        let mut current = self.leaf;
        let mut index = self.index;

        for sibling in &self.siblings {
            current = if index % 2 == 0 {
                hash_pair(&current, sibling)
            } else {
                hash_pair(sibling, &current)
            };
            index /= 2;
        }

        current
    }

    /// Get proof size (number of siblings)
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

/// Check that `transaction` belongs to the block whose Merkle root is `root`.
pub fn verify(root: &Hash, transaction: &Transaction, proof: &MerkleProof) -> bool {
    proof.leaf == transaction.content_hash && proof.verify(root)
}
