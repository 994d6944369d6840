//! Transaction pool management.
//!
//! Holds submitted transactions until a local proposal includes them. The
//! pool deduplicates by content hash, remembers what was recently finalized
//! and puts the transactions of a discarded proposal back at the front.

use crate::error::CoreError;
use lru::LruCache;
use socprod_types::{Block, Hash, Transaction};
use std::collections::{HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;

/// Outcome of adding a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Added,
    AlreadyPending,
    AlreadyIncluded,
}

/// Transaction pool state.
pub struct TransactionPool {
    max_pending: usize,
    /// Waiting for a proposal, FIFO
    queue: VecDeque<Transaction>,
    queued: HashSet<Hash>,
    /// Included in a pending candidate
    in_flight: HashMap<Hash, Vec<Transaction>>,
    in_flight_hashes: HashSet<Hash>,
    /// Recently finalized transaction hashes
    included: LruCache<Hash, ()>,
}

impl TransactionPool {
    pub fn new(max_pending: usize) -> Self {
        let included = NonZeroUsize::new(max_pending.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            max_pending,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            in_flight: HashMap::new(),
            in_flight_hashes: HashSet::new(),
            included: LruCache::new(included),
        }
    }

    /// Add a transaction to the pool after structural validation.
    pub fn add(&mut self, tx: Transaction) -> Result<PoolStatus, CoreError> {
        tx.validate()?;

        let hash = tx.content_hash;
        if self.included.contains(&hash) {
            return Ok(PoolStatus::AlreadyIncluded);
        }
        if self.queued.contains(&hash) || self.in_flight_hashes.contains(&hash) {
            return Ok(PoolStatus::AlreadyPending);
        }
        if self.queue.len() >= self.max_pending {
            return Err(CoreError::PoolFull(self.queue.len()));
        }

        self.queued.insert(hash);
        self.queue.push_back(tx);
        Ok(PoolStatus::Added)
    }

    /// The oldest `max` waiting transactions, left in the pool.
    pub fn peek_batch(&self, max: usize) -> Vec<Transaction> {
        self.queue.iter().take(max).cloned().collect()
    }

    /// Move transactions into the in-flight set of a pending candidate, local
    /// or remote.
    pub fn mark_proposed(&mut self, block_hash: Hash, transactions: &[Transaction]) {
        let hashes: HashSet<Hash> = transactions.iter().map(|tx| tx.content_hash).collect();
        self.queue.retain(|tx| !hashes.contains(&tx.content_hash));
        for hash in &hashes {
            self.queued.remove(hash);
        }
        self.in_flight_hashes.extend(hashes);
        self.in_flight.insert(block_hash, transactions.to_vec());
    }

    /// Drop everything a finalized block contains.
    pub fn on_finalized(&mut self, block: &Block) {
        self.in_flight.remove(&block.hash);
        let hashes: HashSet<Hash> = block.transactions.iter().map(|tx| tx.content_hash).collect();
        if hashes.is_empty() {
            return;
        }
        self.queue.retain(|tx| !hashes.contains(&tx.content_hash));
        for hash in hashes {
            self.queued.remove(&hash);
            self.in_flight_hashes.remove(&hash);
            self.included.put(hash, ());
        }
    }

    /// Put the transactions of a discarded candidate back in front.
    /// Returns how many were re-queued.
    pub fn on_discarded(&mut self, block_hash: &Hash) -> usize {
        let Some(transactions) = self.in_flight.remove(block_hash) else {
            return 0;
        };

        let mut requeued = 0;
        for tx in transactions.into_iter().rev() {
            let hash = tx.content_hash;
            self.in_flight_hashes.remove(&hash);
            if self.included.contains(&hash) || !self.queued.insert(hash) {
                continue;
            }
            self.queue.push_front(tx);
            requeued += 1;
        }
        requeued
    }

    /// Transactions waiting for a proposal.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight_hashes.len()
    }
}
