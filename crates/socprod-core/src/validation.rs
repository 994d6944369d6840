//! Structural block validation.

use crate::error::Malformed;
use socprod_crypto::MerkleStore;
use socprod_types::{Block, BlockHeader, Transaction};
use std::collections::HashSet;

/// Validate a block received from a peer and return its Merkle store.
///
/// Parent linkage is checked by the chain manager, which knows the parent.
pub fn validate_block(block: &Block, max_transactions: usize) -> Result<MerkleStore, Malformed> {
    if block.header.is_genesis() {
        return Err(Malformed::Genesis);
    }

    let computed = block.header.compute_hash();
    if computed != block.hash {
        return Err(Malformed::HashMismatch {
            stored: block.hash,
            computed,
        });
    }

    validate_body(&block.header, &block.transactions, max_transactions)
}

/// Validate a transaction list against the header that commits to it.
pub fn validate_body(
    header: &BlockHeader,
    transactions: &[Transaction],
    max_transactions: usize,
) -> Result<MerkleStore, Malformed> {
    if transactions.is_empty() {
        return Err(Malformed::Empty);
    }
    if transactions.len() > max_transactions {
        return Err(Malformed::TooManyTransactions {
            max: max_transactions,
            got: transactions.len(),
        });
    }

    let mut seen = HashSet::with_capacity(transactions.len());
    for tx in transactions {
        tx.validate().map_err(|e| Malformed::InvalidTransaction {
            hash: tx.content_hash,
            reason: e.to_string(),
        })?;
        if !seen.insert(tx.content_hash) {
            return Err(Malformed::DuplicateTransaction(tx.content_hash));
        }
    }

    let merkle = MerkleStore::build(transactions);
    if merkle.root() != header.merkle_root {
        return Err(Malformed::MerkleRootMismatch {
            header: header.merkle_root,
            computed: merkle.root(),
        });
    }
    Ok(merkle)
}
