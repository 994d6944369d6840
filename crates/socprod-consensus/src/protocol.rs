//! Vote counting finality.
//!
//! A candidate finalizes once `threshold` distinct peers have approved it.
//! Each vote set is closed exactly once, by finality or by discard, and any
//! vote arriving after closure is a no-op.

use crate::config::{NodeMode, VerificationConfig};
use crate::error::ConsensusError;
use crate::validator::TransactionValidator;
use lru::LruCache;
use socprod_core::{validate_block, ChainManager, FinalizeOutcome};
use socprod_types::{DiscardReason, Hash, PeerId, VerificationVote};
use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;
use tracing::{debug, info, warn};

/// Result of counting one vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Counted; threshold not reached yet.
    Pending { votes: usize },
    /// This vote reached the threshold.
    Finalized(FinalizeOutcome),
    /// The peer already voted for this block.
    Duplicate,
    /// The block is not known yet; the vote is replayed when it arrives.
    Buffered,
    /// The block already finalized or was discarded.
    Closed,
}

#[derive(Debug)]
struct VoteSet {
    voters: BTreeSet<PeerId>,
    opened_at: u64,
}

/// Verification state of one node.
pub struct VerificationProtocol {
    config: VerificationConfig,
    mode: NodeMode,
    local: PeerId,
    open: HashMap<Hash, VoteSet>,
    /// Votes that arrived before their block
    early: LruCache<Hash, BTreeSet<PeerId>>,
    closed: LruCache<Hash, ()>,
}

impl VerificationProtocol {
    pub fn new(
        config: VerificationConfig,
        mode: NodeMode,
        local: PeerId,
    ) -> Result<Self, ConsensusError> {
        config.validate()?;
        let buffer = NonZeroUsize::new(config.vote_buffer_capacity).unwrap_or(NonZeroUsize::MIN);
        let closed = NonZeroUsize::new(config.closed_cache_size).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            config,
            mode,
            local,
            open: HashMap::new(),
            early: LruCache::new(buffer),
            closed: LruCache::new(closed),
        })
    }

    pub fn mode(&self) -> NodeMode {
        self.mode
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local
    }

    /// Open the vote set of a newly registered candidate and replay any
    /// votes that arrived before it.
    pub fn track(
        &mut self,
        chain: &mut ChainManager,
        hash: Hash,
        now: u64,
    ) -> Result<Option<VoteOutcome>, ConsensusError> {
        if self.closed.contains(&hash) || self.open.contains_key(&hash) {
            return Ok(None);
        }
        if chain.candidate(&hash).is_none() {
            return Ok(None);
        }

        self.open.insert(
            hash,
            VoteSet {
                voters: BTreeSet::new(),
                opened_at: now,
            },
        );
        debug!(hash = %hash.short(), "Tracking candidate");

        let mut last = None;
        if let Some(voters) = self.early.pop(&hash) {
            debug!(hash = %hash.short(), votes = voters.len(), "Replaying buffered votes");
            for voter in voters {
                let outcome = self.cast_vote(chain, hash, voter)?;
                let done = matches!(outcome, VoteOutcome::Finalized(_) | VoteOutcome::Closed);
                last = Some(outcome);
                if done {
                    break;
                }
            }
        }
        Ok(last)
    }

    /// Count `peer`'s approval of `hash`, finalizing at the threshold.
    pub fn cast_vote(
        &mut self,
        chain: &mut ChainManager,
        hash: Hash,
        peer: PeerId,
    ) -> Result<VoteOutcome, ConsensusError> {
        if self.closed.contains(&hash) {
            return Ok(VoteOutcome::Closed);
        }
        if chain.is_finalized(&hash) || chain.is_discarded(&hash) {
            self.close(&hash);
            return Ok(VoteOutcome::Closed);
        }

        let Some(set) = self.open.get_mut(&hash) else {
            match self.early.get_mut(&hash) {
                Some(voters) => {
                    voters.insert(peer);
                }
                None => {
                    self.early.put(hash, BTreeSet::from([peer]));
                }
            }
            return Ok(VoteOutcome::Buffered);
        };

        if !set.voters.insert(peer.clone()) {
            return Ok(VoteOutcome::Duplicate);
        }
        let votes = set.voters.len();
        if votes < self.config.threshold {
            debug!(hash = %hash.short(), voter = %peer, votes, "Counted vote");
            return Ok(VoteOutcome::Pending { votes });
        }

        self.close(&hash);
        let outcome = chain.finalize(&hash)?;
        info!(hash = %hash.short(), votes, "Verification threshold reached");
        Ok(VoteOutcome::Finalized(outcome))
    }

    /// Validate a candidate locally and, if it passes, vote for it. Returns
    /// the vote to broadcast, or `None` if this node does not vote on it.
    ///
    /// A candidate failing validation is discarded as invalid.
    pub fn local_approve(
        &mut self,
        chain: &mut ChainManager,
        hash: Hash,
        validator: &dyn TransactionValidator,
    ) -> Result<Option<VerificationVote>, ConsensusError> {
        if !self.mode.votes() || self.closed.contains(&hash) || self.has_voted(&hash) {
            return Ok(None);
        }
        let block = chain
            .candidate(&hash)
            .ok_or(ConsensusError::UnknownCandidate(hash))?;

        let verdict = validate_block(block, chain.config().max_block_transactions)
            .map_err(|e| e.to_string())
            .and_then(|_| {
                block.transactions.iter().try_for_each(|tx| {
                    validator
                        .validate(tx)
                        .map_err(|reason| format!("transaction {}: {}", tx.content_hash, reason))
                })
            });
        if let Err(reason) = verdict {
            warn!(hash = %hash.short(), "Refusing to approve candidate: {}", reason);
            self.open.remove(&hash);
            self.close(&hash);
            chain.discard(&hash, DiscardReason::Invalid);
            return Err(ConsensusError::Rejected {
                block: hash,
                reason,
            });
        }

        let vote = VerificationVote::new(hash, self.local.clone());
        self.cast_vote(chain, hash, self.local.clone())?;
        Ok(Some(vote))
    }

    /// Discard candidates whose vote window has expired. Returns the
    /// discarded hashes.
    pub fn sweep(&mut self, chain: &mut ChainManager, now: u64) -> Vec<Hash> {
        let timeout = self.config.candidate_timeout_secs;
        let expired: Vec<Hash> = self
            .open
            .iter()
            .filter(|(_, set)| now.saturating_sub(set.opened_at) >= timeout)
            .map(|(hash, _)| *hash)
            .collect();

        for hash in &expired {
            self.open.remove(hash);
            self.close(hash);
            if chain.discard(hash, DiscardReason::TimedOut) {
                info!(hash = %hash.short(), "Candidate timed out");
            }
        }
        expired
    }

    fn close(&mut self, hash: &Hash) {
        self.open.remove(hash);
        self.early.pop(hash);
        self.closed.put(*hash, ());
    }

    /// Distinct approvals counted so far for an open block.
    pub fn votes(&self, hash: &Hash) -> usize {
        self.open.get(hash).map_or(0, |set| set.voters.len())
    }

    pub fn has_voted(&self, hash: &Hash) -> bool {
        self.open
            .get(hash)
            .map_or(false, |set| set.voters.contains(&self.local))
    }

    /// Our vote for a block that is still open, for re-announcement.
    pub fn local_vote(&self, hash: &Hash) -> Option<VerificationVote> {
        self.has_voted(hash)
            .then(|| VerificationVote::new(*hash, self.local.clone()))
    }

    pub fn is_closed(&self, hash: &Hash) -> bool {
        self.closed.contains(hash)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn buffered_count(&self) -> usize {
        self.early.len()
    }
}
