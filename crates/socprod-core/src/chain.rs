//! Chain state management.
//!
//! The chain manager owns every block the node knows about: pending
//! candidates, the tree of finalized blocks and the canonical chain through
//! it. Other components refer to blocks by hash and mutate chain state only
//! through the operations here.

use crate::config::ChainConfig;
use crate::error::{CoreError, Malformed};
use crate::fork::{ForkChoice, Tip};
use crate::orphan::OrphanPool;
use crate::validation::{validate_block, validate_body};
use lru::LruCache;
use socprod_crypto::{MerkleProof, MerkleStore};
use socprod_storage::{BlockDB, ChainWrite};
use socprod_types::{
    Block, BlockHeader, DiscardReason, Hash, LedgerEvent, PeerId, Transaction,
    BLOCK_OVERHEAD_BYTES,
};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a block currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Candidate,
    /// Finalized and attached to the block tree.
    Finalized { canonical: bool },
    /// Finalized, waiting for its parent to finalize.
    AwaitingParent,
    /// Candidate whose parent is unknown.
    Orphaned,
    Discarded,
}

/// Result of [`ChainManager::receive_candidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Registered,
    Orphaned { missing_parent: Hash },
    /// Already held in some state; nothing changed.
    Known,
    /// Previously discarded; re-receipt is ignored.
    Discarded,
}

/// Result of [`ChainManager::finalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Finalized { height: u64 },
    AlreadyFinalized,
    AwaitingParent { parent: Hash },
}

/// Result of importing synced headers or blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: usize,
    pub already_known: usize,
    /// Set when an item's parent was unknown; later items were skipped.
    pub awaiting_parent: Option<Hash>,
}

struct Candidate {
    block: Block,
    merkle: MerkleStore,
}

type Body = (Vec<Transaction>, MerkleStore);

struct Detached {
    header: BlockHeader,
    body: Option<Body>,
    announce: bool,
}

struct CanonicalChange {
    fork_height: u64,
    suffix: Vec<Hash>,
    orphaned: Vec<Hash>,
}

fn body_size(transactions: &[Transaction]) -> u64 {
    (BLOCK_OVERHEAD_BYTES + transactions.iter().map(Transaction::encoded_len).sum::<usize>())
        as u64
}

fn cache_size(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

/// Candidates, finalized block tree and canonical chain of one node.
pub struct ChainManager {
    config: ChainConfig,
    store: BlockDB,
    genesis: Hash,
    /// Finalized headers, canonical or not
    headers: HashMap<Hash, BlockHeader>,
    /// Canonical chain, indexed by height
    canonical: Vec<Hash>,
    /// Finalized blocks whose transactions are held locally
    bodies: HashSet<Hash>,
    body_bytes: u64,
    merkle_cache: LruCache<Hash, Arc<MerkleStore>>,
    candidates: HashMap<Hash, Candidate>,
    discarded: LruCache<Hash, DiscardReason>,
    orphans: OrphanPool<Block>,
    detached: OrphanPool<Detached>,
    /// Finalized blocks pushed out of `detached`, keyed to their parent, to
    /// be fetched again once the parent is finalized
    dropped: LruCache<Hash, Hash>,
    registered: Vec<Hash>,
    events: Vec<LedgerEvent>,
}

impl ChainManager {
    /// Open the chain on top of `store`, writing genesis into an empty
    /// store or replaying the canonical chain from height 0.
    pub fn open(store: BlockDB, config: ChainConfig) -> Result<Self, CoreError> {
        let genesis = Block::genesis();
        let mut chain = Self {
            merkle_cache: LruCache::new(cache_size(config.merkle_cache_size)),
            discarded: LruCache::new(cache_size(config.discarded_cache_size)),
            orphans: OrphanPool::new(config.orphan_pool_size),
            detached: OrphanPool::new(config.detached_pool_size),
            dropped: LruCache::new(cache_size(config.detached_pool_size)),
            config,
            store,
            genesis: genesis.hash,
            headers: HashMap::new(),
            canonical: Vec::new(),
            bodies: HashSet::new(),
            body_bytes: 0,
            candidates: HashMap::new(),
            registered: Vec::new(),
            events: Vec::new(),
        };

        let hashes = chain.store.canonical_hashes()?;
        if hashes.is_empty() {
            let mut write = ChainWrite::new();
            write.header(&genesis.hash, &genesis.header)?;
            write.body(&genesis.hash, &[], &[])?;
            write.canonical(0, &genesis.hash).head(&genesis.hash);
            chain.store.commit(write)?;

            chain.headers.insert(genesis.hash, genesis.header);
            chain.canonical.push(genesis.hash);
            chain.bodies.insert(genesis.hash);
            info!(genesis = %genesis.hash, "Initialized chain store");
        } else {
            chain.replay(&hashes)?;
        }

        Ok(chain)
    }

    fn replay(&mut self, hashes: &[Hash]) -> Result<(), CoreError> {
        if hashes[0] != self.genesis {
            return Err(CoreError::CorruptStore(format!(
                "genesis mismatch: stored {}, expected {}",
                hashes[0], self.genesis
            )));
        }

        for (height, hash) in hashes.iter().enumerate() {
            let header = self.store.get_header(hash)?.ok_or_else(|| {
                CoreError::CorruptStore(format!("missing header at height {}", height))
            })?;
            if header.compute_hash() != *hash || header.height != height as u64 {
                return Err(CoreError::CorruptStore(format!(
                    "header mismatch at height {}",
                    height
                )));
            }
            if height > 0 && header.parent_hash != hashes[height - 1] {
                return Err(CoreError::CorruptStore(format!(
                    "broken parent link at height {}",
                    height
                )));
            }

            if let Some(transactions) = self.store.get_body(hash)? {
                if MerkleStore::build(&transactions).root() != header.merkle_root {
                    return Err(CoreError::CorruptStore(format!(
                        "merkle root mismatch at height {}",
                        height
                    )));
                }
                if height > 0 {
                    self.body_bytes += body_size(&transactions);
                }
                self.bodies.insert(*hash);
            }

            self.headers.insert(*hash, header);
            self.canonical.push(*hash);
        }

        let (height, head) = self.head();
        if self.store.get_chain_head()? != Some(head) {
            warn!(head = %head, "Stored head pointer disagrees with canonical index");
        }
        info!(
            height,
            head = %head,
            bodies = self.bodies.len(),
            "Replayed canonical chain"
        );
        Ok(())
    }

    // Candidates

    /// Assemble a candidate on top of the current head.
    pub fn propose(
        &mut self,
        proposer: PeerId,
        transactions: Vec<Transaction>,
    ) -> Result<Block, CoreError> {
        let (height, parent) = self.head();
        let timestamp = transactions
            .iter()
            .map(|tx| tx.created_at)
            .max()
            .unwrap_or_default();
        let root = MerkleStore::build(&transactions).root();
        let header = BlockHeader::new(height + 1, parent, root, timestamp, proposer);
        let block = Block::new(header, transactions);

        let merkle = validate_block(&block, self.config.max_block_transactions)?;
        info!(
            height = block.height(),
            hash = %block.hash.short(),
            txs = block.tx_count(),
            "Proposed block"
        );
        if !self.candidates.contains_key(&block.hash) {
            self.register_candidate(block.clone(), merkle);
        }
        Ok(block)
    }

    /// Accept a candidate proposed by a peer.
    pub fn receive_candidate(&mut self, block: Block) -> Result<CandidateOutcome, CoreError> {
        let hash = block.hash;
        if self.discarded.contains(&hash) {
            return Ok(CandidateOutcome::Discarded);
        }
        if self.candidates.contains_key(&hash)
            || self.headers.contains_key(&hash)
            || self.detached.contains(&hash)
            || self.orphans.contains(&hash)
        {
            return Ok(CandidateOutcome::Known);
        }

        let merkle = match validate_block(&block, self.config.max_block_transactions) {
            Ok(merkle) => merkle,
            Err(e) => {
                warn!(hash = %hash.short(), proposer = %block.header.proposer, "Rejected candidate: {}", e);
                return Err(e.into());
            }
        };

        let parent = block.header.parent_hash;
        let parent_height = match self.known_height(&parent) {
            Some(height) => height,
            None => {
                debug!(hash = %hash.short(), parent = %parent.short(), "Queued orphan candidate");
                if let Some((evicted, _)) = self.orphans.insert(hash, parent, block) {
                    debug!(hash = %evicted.short(), "Dropped oldest orphan candidate");
                }
                return Ok(CandidateOutcome::Orphaned {
                    missing_parent: parent,
                });
            }
        };
        if block.header.height != parent_height + 1 {
            return Err(Malformed::HeightMismatch {
                parent: parent_height,
                got: block.header.height,
            }
            .into());
        }

        self.register_candidate(block, merkle);
        Ok(CandidateOutcome::Registered)
    }

    /// Height of a block known as finalized, candidate or awaiting its
    /// parent.
    fn known_height(&self, hash: &Hash) -> Option<u64> {
        self.headers
            .get(hash)
            .map(|header| header.height)
            .or_else(|| self.candidates.get(hash).map(|c| c.block.header.height))
            .or_else(|| self.detached.get(hash).map(|d| d.header.height))
    }

    fn register_candidate(&mut self, block: Block, merkle: MerkleStore) {
        let hash = block.hash;
        debug!(height = block.height(), hash = %hash.short(), "Registered candidate");
        self.candidates.insert(hash, Candidate { block, merkle });
        self.registered.push(hash);
        self.release_orphans(&hash);
    }

    /// Retry orphan candidates that were waiting for `parent`.
    fn release_orphans(&mut self, parent: &Hash) {
        for (hash, block) in self.orphans.take_children(parent) {
            if let Err(e) = self.receive_candidate(block) {
                warn!(hash = %hash.short(), "Dropped orphan candidate: {}", e);
            }
        }
    }

    /// Drop a timed-out or invalid candidate. Returns false if `hash` was not
    /// a pending candidate.
    pub fn discard(&mut self, hash: &Hash, reason: DiscardReason) -> bool {
        if self.candidates.remove(hash).is_none() {
            return false;
        }
        self.discarded.put(*hash, reason);
        self.events.push(LedgerEvent::CandidateDiscarded {
            hash: *hash,
            reason,
        });
        info!(hash = %hash.short(), ?reason, "Discarded candidate");
        true
    }

    // Finality

    /// Finalize a candidate that reached the vote threshold.
    pub fn finalize(&mut self, hash: &Hash) -> Result<FinalizeOutcome, CoreError> {
        if self.headers.contains_key(hash) {
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }
        if let Some(detached) = self.detached.get(hash) {
            return Ok(FinalizeOutcome::AwaitingParent {
                parent: detached.header.parent_hash,
            });
        }

        let candidate = self
            .candidates
            .get(hash)
            .ok_or(CoreError::NotCandidate(*hash))?;
        let parent = candidate.block.header.parent_hash;
        let height = candidate.block.header.height;

        if !self.headers.contains_key(&parent) {
            if let Some(Candidate { block, merkle }) = self.candidates.remove(hash) {
                self.detach(
                    *hash,
                    Detached {
                        header: block.header,
                        body: Some((block.transactions, merkle)),
                        announce: true,
                    },
                );
            }
            return Ok(FinalizeOutcome::AwaitingParent { parent });
        }

        let change = self.commit_finalized(
            hash,
            &candidate.block.header,
            Some((&candidate.block.transactions, &candidate.merkle)),
        )?;
        if let Some(Candidate { block, merkle }) = self.candidates.remove(hash) {
            self.apply_finalized(
                *hash,
                block.header,
                Some((block.transactions, merkle)),
                change,
                true,
            )?;
        }
        Ok(FinalizeOutcome::Finalized { height })
    }

    fn detach(&mut self, hash: Hash, detached: Detached) {
        let parent = detached.header.parent_hash;
        debug!(hash = %hash.short(), parent = %parent.short(), "Finalized block waiting for parent");
        if let Some((evicted, evicted_parent)) = self.detached.insert(hash, parent, detached) {
            warn!(hash = %evicted.short(), "Dropped finalized block waiting for parent");
            self.dropped.put(evicted, evicted_parent);
        }
        self.release_orphans(&hash);
    }

    /// Finalize a block whose data is already owned, attaching it now if
    /// its parent is finalized.
    fn finalize_owned(
        &mut self,
        hash: Hash,
        header: BlockHeader,
        body: Option<Body>,
        announce: bool,
    ) -> Result<(), CoreError> {
        if !self.headers.contains_key(&header.parent_hash) {
            self.detach(
                hash,
                Detached {
                    header,
                    body,
                    announce,
                },
            );
            return Ok(());
        }

        let change = self.commit_finalized(
            &hash,
            &header,
            body.as_ref().map(|(txs, merkle)| (txs.as_slice(), merkle)),
        )?;
        self.apply_finalized(hash, header, body, change, announce)
    }

    /// Persist a finalized block and any canonical index change in one batch.
    fn commit_finalized(
        &self,
        hash: &Hash,
        header: &BlockHeader,
        body: Option<(&[Transaction], &MerkleStore)>,
    ) -> Result<Option<CanonicalChange>, CoreError> {
        let change = self.plan_canonical(hash, header)?;

        let mut write = ChainWrite::new();
        write.header(hash, header)?;
        if let Some((transactions, merkle)) = body {
            write.body(hash, transactions, merkle.leaves())?;
        }
        if let Some(change) = &change {
            for (offset, block) in change.suffix.iter().enumerate() {
                write.canonical(change.fork_height + 1 + offset as u64, block);
            }
            let new_len = change.fork_height + 1 + change.suffix.len() as u64;
            for height in new_len..self.canonical.len() as u64 {
                write.uncanonical(height);
            }
            write.head(hash);
        }
        self.store.commit(write)?;
        Ok(change)
    }

    /// Decide whether a newly finalized block changes the canonical chain.
    fn plan_canonical(
        &self,
        hash: &Hash,
        header: &BlockHeader,
    ) -> Result<Option<CanonicalChange>, CoreError> {
        let (head_height, head_hash) = self.head();
        if header.parent_hash == head_hash {
            return Ok(Some(CanonicalChange {
                fork_height: head_height,
                suffix: vec![*hash],
                orphaned: Vec::new(),
            }));
        }

        let candidate = Tip::new(header.height, *hash);
        if !ForkChoice::prefers(&candidate, &Tip::new(head_height, head_hash)) {
            return Ok(None);
        }

        let mut suffix = vec![*hash];
        let mut cursor = header.parent_hash;
        let fork_height = loop {
            let parent = self
                .headers
                .get(&cursor)
                .ok_or(CoreError::BlockNotFound(cursor))?;
            if self.canonical.get(parent.height as usize) == Some(&cursor) {
                break parent.height;
            }
            suffix.push(cursor);
            cursor = parent.parent_hash;
        };
        suffix.reverse();

        Ok(Some(CanonicalChange {
            fork_height,
            suffix,
            orphaned: self.canonical[fork_height as usize + 1..].to_vec(),
        }))
    }

    fn apply_finalized(
        &mut self,
        hash: Hash,
        header: BlockHeader,
        body: Option<Body>,
        change: Option<CanonicalChange>,
        announce: bool,
    ) -> Result<(), CoreError> {
        let height = header.height;
        if let Some((transactions, merkle)) = body {
            self.body_bytes += body_size(&transactions);
            self.bodies.insert(hash);
            self.merkle_cache.put(hash, Arc::new(merkle));
        }
        self.headers.insert(hash, header);

        if announce {
            info!(height, hash = %hash.short(), "Block finalized");
            self.events
                .push(LedgerEvent::BlockFinalized { hash, height });
        }

        if let Some(change) = change {
            let old_head = self.head_hash();
            self.canonical.truncate(change.fork_height as usize + 1);
            self.canonical.extend(change.suffix);
            if !change.orphaned.is_empty() {
                info!(
                    fork_height = change.fork_height,
                    old_head = %old_head.short(),
                    new_head = %hash.short(),
                    orphaned = change.orphaned.len(),
                    "Adopted fork"
                );
                self.events.push(LedgerEvent::ForkAdopted {
                    old_head,
                    new_head: hash,
                    fork_height: change.fork_height,
                    orphaned: change.orphaned,
                });
            }
        }

        self.release_orphans(&hash);
        self.attach_detached(&hash)
    }

    /// Attach finalized blocks that were waiting for `parent`.
    fn attach_detached(&mut self, parent: &Hash) -> Result<(), CoreError> {
        for (hash, detached) in self.detached.take_children(parent) {
            let Detached {
                header,
                body,
                announce,
            } = detached;
            self.finalize_owned(hash, header, body, announce)?;
        }
        Ok(())
    }

    // Synced history

    /// Import finalized headers announced by peers, in ascending height order.
    pub fn import_headers(
        &mut self,
        headers: Vec<BlockHeader>,
    ) -> Result<ImportOutcome, CoreError> {
        let mut outcome = ImportOutcome::default();
        for header in headers {
            let hash = header.compute_hash();
            if self.headers.contains_key(&hash) || self.detached.contains(&hash) {
                outcome.already_known += 1;
                continue;
            }
            if !self.check_linkage(&header, &mut outcome)? {
                break;
            }

            // The network finalized something we hold as a candidate.
            let body = self
                .candidates
                .remove(&hash)
                .map(|candidate| (candidate.block.transactions, candidate.merkle));
            self.discarded.pop(&hash);
            self.finalize_owned(hash, header, body, false)?;
            outcome.imported += 1;
        }
        Ok(outcome)
    }

    /// Import a complete finalized block fetched from a peer. Re-receipt of
    /// a held block is a no-op.
    pub fn import_block(&mut self, block: Block) -> Result<ImportOutcome, CoreError> {
        let mut outcome = ImportOutcome::default();
        let hash = block.hash;

        if self.headers.contains_key(&hash) {
            if self.attach_body(&hash, block.transactions)? {
                outcome.imported = 1;
            } else {
                outcome.already_known = 1;
            }
            return Ok(outcome);
        }
        if self.detached.contains(&hash) {
            outcome.already_known = 1;
            return Ok(outcome);
        }

        let merkle = validate_block(&block, self.config.max_block_transactions)?;
        if !self.check_linkage(&block.header, &mut outcome)? {
            return Ok(outcome);
        }

        self.candidates.remove(&hash);
        self.discarded.pop(&hash);
        self.finalize_owned(hash, block.header, Some((block.transactions, merkle)), false)?;
        outcome.imported = 1;
        Ok(outcome)
    }

    /// Check a synced header against its parent. Returns false and records
    /// the parent when it is unknown.
    fn check_linkage(
        &self,
        header: &BlockHeader,
        outcome: &mut ImportOutcome,
    ) -> Result<bool, CoreError> {
        if header.is_genesis() {
            return Err(Malformed::Genesis.into());
        }
        let parent_height = self
            .headers
            .get(&header.parent_hash)
            .or_else(|| self.detached.get(&header.parent_hash).map(|d| &d.header))
            .map(|parent| parent.height);
        match parent_height {
            None => {
                outcome.awaiting_parent = Some(header.parent_hash);
                Ok(false)
            }
            Some(parent) if header.height != parent + 1 => Err(Malformed::HeightMismatch {
                parent,
                got: header.height,
            }
            .into()),
            Some(_) => Ok(true),
        }
    }

    /// Attach the transactions of a finalized header-only block. Returns
    /// false if the body was already held.
    pub fn attach_body(
        &mut self,
        hash: &Hash,
        transactions: Vec<Transaction>,
    ) -> Result<bool, CoreError> {
        let header = self
            .headers
            .get(hash)
            .ok_or(CoreError::BlockNotFound(*hash))?;
        if self.bodies.contains(hash) {
            return Ok(false);
        }

        let merkle = validate_body(header, &transactions, self.config.max_block_transactions)?;
        let mut write = ChainWrite::new();
        write.body(hash, &transactions, merkle.leaves())?;
        self.store.commit(write)?;

        self.body_bytes += body_size(&transactions);
        self.bodies.insert(*hash);
        self.merkle_cache.put(*hash, Arc::new(merkle));
        debug!(hash = %hash.short(), txs = transactions.len(), "Attached block body");
        Ok(true)
    }

    // Queries

    /// Height and hash of the canonical head.
    pub fn head(&self) -> (u64, Hash) {
        let hash = self.head_hash();
        (self.canonical.len().saturating_sub(1) as u64, hash)
    }

    pub fn head_hash(&self) -> Hash {
        self.canonical.last().copied().unwrap_or(self.genesis)
    }

    pub fn height(&self) -> u64 {
        self.head().0
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn status(&self, hash: &Hash) -> Option<BlockStatus> {
        if self.headers.contains_key(hash) {
            Some(BlockStatus::Finalized {
                canonical: self.is_canonical(hash),
            })
        } else if self.candidates.contains_key(hash) {
            Some(BlockStatus::Candidate)
        } else if self.detached.contains(hash) {
            Some(BlockStatus::AwaitingParent)
        } else if self.orphans.contains(hash) {
            Some(BlockStatus::Orphaned)
        } else if self.discarded.contains(hash) {
            Some(BlockStatus::Discarded)
        } else {
            None
        }
    }

    pub fn is_finalized(&self, hash: &Hash) -> bool {
        self.headers.contains_key(hash) || self.detached.contains(hash)
    }

    pub fn is_canonical(&self, hash: &Hash) -> bool {
        self.headers
            .get(hash)
            .map_or(false, |h| self.canonical.get(h.height as usize) == Some(hash))
    }

    pub fn is_discarded(&self, hash: &Hash) -> bool {
        self.discarded.contains(hash)
    }

    pub fn candidate(&self, hash: &Hash) -> Option<&Block> {
        self.candidates.get(hash).map(|c| &c.block)
    }

    /// Pending candidates ordered by height, then hash.
    pub fn pending_candidates(&self) -> Vec<&Block> {
        let mut blocks: Vec<&Block> = self.candidates.values().map(|c| &c.block).collect();
        blocks.sort_by(|a, b| a.height().cmp(&b.height()).then(a.hash.cmp(&b.hash)));
        blocks
    }

    /// Finalized header by hash.
    pub fn header(&self, hash: &Hash) -> Option<&BlockHeader> {
        self.headers.get(hash)
    }

    pub fn canonical_hash(&self, height: u64) -> Option<Hash> {
        self.canonical.get(height as usize).copied()
    }

    /// Canonical header at `height`.
    pub fn header_at(&self, height: u64) -> Option<&BlockHeader> {
        self.canonical
            .get(height as usize)
            .and_then(|hash| self.headers.get(hash))
    }

    /// Canonical headers for heights `from..=to`, clipped to the head.
    pub fn canonical_headers(&self, from: u64, to: u64) -> Vec<BlockHeader> {
        (from..=to.min(self.height()))
            .filter_map(|height| self.canonical_hash(height))
            .filter_map(|hash| self.headers.get(&hash).cloned())
            .collect()
    }

    /// A full block, from the candidate set or from storage.
    pub fn block(&self, hash: &Hash) -> Result<Option<Block>, CoreError> {
        if let Some(candidate) = self.candidates.get(hash) {
            return Ok(Some(candidate.block.clone()));
        }
        if !self.bodies.contains(hash) {
            return Ok(None);
        }
        Ok(self.store.get_block(hash)?)
    }

    pub fn has_body(&self, hash: &Hash) -> bool {
        self.bodies.contains(hash)
    }

    /// Canonical blocks whose transactions are not held, oldest first.
    pub fn missing_bodies(&self) -> Vec<(u64, Hash)> {
        self.canonical
            .iter()
            .enumerate()
            .filter(|(_, hash)| !self.bodies.contains(*hash))
            .map(|(height, hash)| (height as u64, *hash))
            .collect()
    }

    /// Finalized bodies held locally, genesis excluded.
    pub fn bodies_held(&self) -> usize {
        self.bodies.len().saturating_sub(1)
    }

    /// Estimated bytes of finalized bodies held locally.
    pub fn body_bytes(&self) -> u64 {
        self.body_bytes
    }

    /// Ancestors that orphaned or detached blocks are waiting for, then
    /// dropped finalized blocks whose parent has since been finalized.
    pub fn missing_parents(&self) -> Vec<Hash> {
        let mut parents = self.orphans.missing_parents();
        for parent in self.detached.missing_parents() {
            if !parents.contains(&parent) && !self.candidates.contains_key(&parent) {
                parents.push(parent);
            }
        }
        for (hash, parent) in self.dropped.iter() {
            if self.headers.contains_key(parent)
                && !self.detached.contains(hash)
                && !parents.contains(hash)
            {
                parents.push(*hash);
            }
        }
        parents.retain(|p| !self.headers.contains_key(p));
        parents
    }

    /// Merkle proof that `tx_hash` is in block `block_hash`.
    pub fn prove(&mut self, block_hash: &Hash, tx_hash: &Hash) -> Result<MerkleProof, CoreError> {
        if let Some(candidate) = self.candidates.get(block_hash) {
            return Ok(candidate.merkle.prove_hash(tx_hash)?);
        }
        if !self.headers.contains_key(block_hash) {
            return Err(CoreError::BlockNotFound(*block_hash));
        }

        let merkle = match self.merkle_cache.get(block_hash) {
            Some(merkle) => Arc::clone(merkle),
            None => {
                let leaves = self
                    .store
                    .get_merkle_leaves(block_hash)?
                    .ok_or(CoreError::BodyUnavailable(*block_hash))?;
                let merkle = Arc::new(MerkleStore::from_leaves(leaves));
                self.merkle_cache.put(*block_hash, Arc::clone(&merkle));
                merkle
            }
        };
        Ok(merkle.prove_hash(tx_hash)?)
    }

    /// Candidates registered since the last call, including orphans that
    /// were registered once their parent arrived.
    pub fn take_registered(&mut self) -> Vec<Hash> {
        std::mem::take(&mut self.registered)
    }

    /// Events produced since the last call.
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}
