//! Sync engine.
//!
//! Tracks the chain heads peers announce and plans header and block fetches.
//! Headers are always fetched for the missing range so that parent linkage
//! can be checked; the configured [`SyncStrategy`] decides which bodies
//! follow. The engine never talks to the network itself: it returns
//! requests for the node to send and reports peers that stopped answering.

use crate::config::{SyncConfig, SyncStrategy};
use crate::error::SyncError;
use crate::state::SyncState;
use socprod_core::{ChainManager, ForkChoice, ImportOutcome, Tip};
use socprod_types::{Block, BlockHeader, Hash, PeerId, SyncProgress, BLOCK_OVERHEAD_BYTES};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Ask `peer` for canonical headers in `from_height..=to_height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRequest {
    pub peer: PeerId,
    pub from_height: u64,
    pub to_height: u64,
}

/// Ask `peer` for full blocks by hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
    pub peer: PeerId,
    pub request_id: u64,
    pub hashes: Vec<Hash>,
}

#[derive(Debug)]
struct InFlight {
    peer: PeerId,
    request_id: u64,
    deadline: u64,
}

#[derive(Debug)]
struct PendingHeaders {
    from_height: u64,
    deadline: u64,
}

/// Per-node synchronization state.
pub struct SyncEngine {
    config: SyncConfig,
    peers: BTreeMap<PeerId, SyncState>,
    in_flight: HashMap<Hash, InFlight>,
    header_requests: HashMap<PeerId, PendingHeaders>,
    /// Content asked for explicitly, fetched under every strategy
    requested: BTreeSet<Hash>,
    /// Peers that answered a request without the block
    declined: HashMap<Hash, BTreeSet<PeerId>>,
    reported: BTreeSet<PeerId>,
    next_request_id: u64,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self {
            config,
            peers: BTreeMap::new(),
            in_flight: HashMap::new(),
            header_requests: HashMap::new(),
            requested: BTreeSet::new(),
            declined: HashMap::new(),
            reported: BTreeSet::new(),
            next_request_id: 0,
        })
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.config.strategy
    }

    /// Record a peer's announced head. Returns the height range the local
    /// chain is missing relative to it.
    pub fn observe_peer_head(
        &mut self,
        peer: PeerId,
        height: u64,
        hash: Hash,
        chain: &ChainManager,
    ) -> Option<(u64, u64)> {
        let state = self
            .peers
            .entry(peer.clone())
            .or_insert_with(|| SyncState::new(peer, height, hash));
        state.head_height = height;
        state.head_hash = hash;

        let missing = state.missing_range(chain.height());
        if let Some((from, to)) = missing {
            debug!(peer = %state.peer, from, to, "Peer is ahead");
        }
        missing
    }

    /// Request headers from the peer with the best chain, if that chain is
    /// preferred over the local one. At most one header request is
    /// outstanding at a time.
    pub fn plan_header_requests(&mut self, chain: &ChainManager, now: u64) -> Vec<HeaderRequest> {
        if !self.header_requests.is_empty() {
            return Vec::new();
        }

        let (local_height, local_hash) = chain.head();
        let local = Tip::new(local_height, local_hash);
        let max_failures = self.config.max_fetch_failures;
        let best = self
            .peers
            .values()
            .filter(|state| state.failures < max_failures && !chain.is_finalized(&state.head_hash))
            .map(|state| (Tip::new(state.head_height, state.head_hash), state))
            .filter(|(tip, _)| ForkChoice::prefers(tip, &local))
            .max_by(|(a, _), (b, _)| ForkChoice::compare(a, b));
        let Some((tip, state)) = best else {
            return Vec::new();
        };

        let from_height = state
            .rewind_to
            .unwrap_or_else(|| local_height.saturating_sub(self.config.fork_lookback) + 1)
            .max(1);
        let to_height = tip
            .height
            .min(from_height + self.config.max_headers_per_request - 1);
        let peer = state.peer.clone();

        self.header_requests.insert(
            peer.clone(),
            PendingHeaders {
                from_height,
                deadline: now + self.config.request_timeout_secs,
            },
        );
        debug!(peer = %peer, from_height, to_height, "Requesting headers");
        vec![HeaderRequest {
            peer,
            from_height,
            to_height,
        }]
    }

    /// Import headers a peer sent. When the first header's parent is
    /// unknown the next request from this peer starts further back.
    pub fn on_headers(
        &mut self,
        peer: &PeerId,
        headers: Vec<BlockHeader>,
        chain: &mut ChainManager,
    ) -> Result<ImportOutcome, SyncError> {
        let pending = self.header_requests.remove(peer);
        let first_height = headers.first().map(|header| header.height);

        let outcome = match chain.import_headers(headers) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(peer = %peer, "Rejected headers: {}", e);
                if let Some(state) = self.peers.get_mut(peer) {
                    state.failures += 1;
                }
                return Err(e.into());
            }
        };

        let step = self.config.max_headers_per_request;
        if let Some(state) = self.peers.get_mut(peer) {
            state.failures = 0;
            state.rewind_to = match outcome.awaiting_parent {
                Some(_) => pending
                    .map(|p| p.from_height)
                    .or(first_height)
                    .filter(|from| *from > 1)
                    .map(|from| from.saturating_sub(step).max(1)),
                None => None,
            };
        }

        if outcome.imported > 0 {
            info!(
                peer = %peer,
                imported = outcome.imported,
                height = chain.height(),
                "Imported headers"
            );
        }
        Ok(outcome)
    }

    /// Bodies to request next: the strategy's selection minus what is
    /// already in flight. Parents of orphaned blocks always come first.
    pub fn plan_fetch(&self, chain: &ChainManager) -> Vec<Hash> {
        let (selected, _) = self.select(chain);
        selected
            .into_iter()
            .filter(|hash| !self.in_flight.contains_key(hash))
            .collect()
    }

    /// Strategy selection and the number of missing bodies it leaves out.
    fn select(&self, chain: &ChainManager) -> (Vec<Hash>, u64) {
        let mut plan = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |hash: Hash| {
            if seen.insert(hash) {
                plan.push(hash);
            }
        };

        for parent in chain.missing_parents() {
            push(parent);
        }

        let missing = chain.missing_bodies();
        match self.config.strategy {
            SyncStrategy::Full => missing.iter().for_each(|(_, hash)| push(*hash)),
            SyncStrategy::OnDemand => {}
            SyncStrategy::TimeRange { from, to } => {
                for (_, hash) in &missing {
                    let in_window = chain
                        .header(hash)
                        .map_or(false, |header| (from..=to).contains(&header.timestamp));
                    if in_window {
                        push(*hash);
                    }
                }
            }
            SyncStrategy::SizeLimit {
                max_blocks,
                max_bytes,
            } => {
                let held = chain.bodies_held() as u64;
                let estimate = match held {
                    0 => BLOCK_OVERHEAD_BYTES as u64,
                    n => (chain.body_bytes() / n).max(1),
                };
                let mut blocks_left = max_blocks.saturating_sub(held);
                let mut bytes_left = max_bytes.saturating_sub(chain.body_bytes());
                for (_, hash) in missing.iter().rev() {
                    if blocks_left == 0 || estimate > bytes_left {
                        break;
                    }
                    push(*hash);
                    blocks_left -= 1;
                    bytes_left -= estimate;
                }
            }
        }

        for hash in &self.requested {
            if !chain.has_body(hash) {
                push(*hash);
            }
        }

        let gap = missing
            .iter()
            .filter(|(_, hash)| !seen.contains(hash))
            .count() as u64;
        (plan, gap)
    }

    /// Assign hashes to peers whose head covers them and record the
    /// deadlines. Hashes no peer can serve are left for a later round.
    pub fn dispatch(
        &mut self,
        chain: &ChainManager,
        hashes: Vec<Hash>,
        now: u64,
    ) -> Vec<BlockRequest> {
        let max_failures = self.config.max_fetch_failures;
        let mut batches: BTreeMap<PeerId, Vec<Hash>> = BTreeMap::new();

        for hash in hashes {
            if self.in_flight.contains_key(&hash) {
                continue;
            }
            let height = chain.header(&hash).map(|header| header.height);
            let declined = self.declined.get(&hash);
            let load = |state: &SyncState| {
                state.outstanding + batches.get(&state.peer).map_or(0, Vec::len)
            };
            let peer = self
                .peers
                .values()
                .filter(|state| state.failures < max_failures)
                .filter(|state| height.map_or(true, |h| state.head_height >= h))
                .filter(|state| declined.map_or(true, |d| !d.contains(&state.peer)))
                .min_by(|a, b| load(a).cmp(&load(b)).then_with(|| a.peer.cmp(&b.peer)))
                .map(|state| state.peer.clone());

            match peer {
                Some(peer) => batches.entry(peer).or_default().push(hash),
                None => debug!(hash = %hash.short(), "No peer can serve block"),
            }
        }

        let deadline = now + self.config.request_timeout_secs;
        let mut requests = Vec::new();
        for (peer, hashes) in batches {
            for chunk in hashes.chunks(self.config.max_blocks_per_request) {
                let request_id = self.next_request_id;
                self.next_request_id += 1;
                for hash in chunk {
                    self.in_flight.insert(
                        *hash,
                        InFlight {
                            peer: peer.clone(),
                            request_id,
                            deadline,
                        },
                    );
                }
                if let Some(state) = self.peers.get_mut(&peer) {
                    state.outstanding += chunk.len();
                }
                requests.push(BlockRequest {
                    peer: peer.clone(),
                    request_id,
                    hashes: chunk.to_vec(),
                });
            }
        }
        requests
    }

    /// Hand a fetched block to the chain. Receiving the same block again
    /// is a no-op.
    pub fn on_block_received(
        &mut self,
        peer: &PeerId,
        block: Block,
        chain: &mut ChainManager,
    ) -> Result<ImportOutcome, SyncError> {
        let hash = block.hash;
        self.settle(&hash);
        self.requested.remove(&hash);
        self.declined.remove(&hash);

        match chain.import_block(block) {
            Ok(outcome) => {
                if let Some(state) = self.peers.get_mut(peer) {
                    state.failures = 0;
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!(peer = %peer, hash = %hash.short(), "Rejected fetched block: {}", e);
                if let Some(state) = self.peers.get_mut(peer) {
                    state.failures += 1;
                }
                Err(e.into())
            }
        }
    }

    /// A block response arrived. Hashes of that request the peer did not
    /// deliver are released for another peer. Returns how many.
    pub fn complete_request(&mut self, peer: &PeerId, request_id: u64) -> usize {
        let undelivered: Vec<Hash> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.request_id == request_id && &f.peer == peer)
            .map(|(hash, _)| *hash)
            .collect();
        for hash in &undelivered {
            self.settle(hash);
            self.declined.entry(*hash).or_default().insert(peer.clone());
        }
        undelivered.len()
    }

    fn settle(&mut self, hash: &Hash) {
        if let Some(flight) = self.in_flight.remove(hash) {
            if let Some(state) = self.peers.get_mut(&flight.peer) {
                state.outstanding = state.outstanding.saturating_sub(1);
            }
        }
    }

    /// Expire overdue requests. Each expired request is one failure for
    /// its peer. Returns peers that just reached the failure limit; the
    /// caller decides whether to disconnect them.
    pub fn sweep(&mut self, now: u64) -> Vec<PeerId> {
        let expired: Vec<(Hash, PeerId, u64)> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.deadline <= now)
            .map(|(hash, f)| (*hash, f.peer.clone(), f.request_id))
            .collect();

        let mut failed_requests = BTreeSet::new();
        for (hash, peer, request_id) in expired {
            self.settle(&hash);
            failed_requests.insert((peer, request_id));
        }
        for (peer, _) in failed_requests {
            if let Some(state) = self.peers.get_mut(&peer) {
                state.failures += 1;
            }
        }

        let expired_headers: Vec<PeerId> = self
            .header_requests
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(peer, _)| peer.clone())
            .collect();
        for peer in expired_headers {
            self.header_requests.remove(&peer);
            if let Some(state) = self.peers.get_mut(&peer) {
                state.failures += 1;
            }
        }

        let max_failures = self.config.max_fetch_failures;
        let mut unresponsive = Vec::new();
        for state in self.peers.values() {
            if state.failures >= max_failures && self.reported.insert(state.peer.clone()) {
                warn!(peer = %state.peer, failures = state.failures, "Peer is unresponsive");
                unresponsive.push(state.peer.clone());
            }
        }
        unresponsive
    }

    /// Forget a peer. Its in-flight hashes become plannable again.
    pub fn peer_disconnected(&mut self, peer: &PeerId) {
        if self.peers.remove(peer).is_some() {
            debug!(peer = %peer, "Dropped sync state");
        }
        self.header_requests.remove(peer);
        self.reported.remove(peer);
        self.in_flight.retain(|_, f| &f.peer != peer);
        for declined in self.declined.values_mut() {
            declined.remove(peer);
        }
    }

    /// Ask for a block's content regardless of strategy. Returns false if it
    /// was already requested.
    pub fn request_content(&mut self, hash: Hash) -> bool {
        self.requested.insert(hash)
    }

    pub fn progress(&self, chain: &ChainManager) -> SyncProgress {
        let (_, gap) = self.select(chain);
        let local_height = chain.height();
        let target_height = self
            .peers
            .values()
            .map(|state| state.head_height)
            .fold(local_height, u64::max);
        SyncProgress {
            local_height,
            target_height,
            missing_bodies: chain.missing_bodies().len() as u64,
            gap,
        }
    }

    pub fn peer(&self, peer: &PeerId) -> Option<&SyncState> {
        self.peers.get(peer)
    }

    pub fn peers(&self) -> impl Iterator<Item = &SyncState> {
        self.peers.values()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socprod_core::ChainConfig;
    use socprod_crypto::MerkleStore;
    use socprod_storage::BlockDB;
    use socprod_types::{Transaction, TransactionKind};

    fn new_chain() -> ChainManager {
        ChainManager::open(BlockDB::in_memory(), ChainConfig::default()).unwrap()
    }

    /// Finalize `count` blocks on top of the head. Block `h` carries one
    /// transaction created at `h * 10`.
    fn grow(chain: &mut ChainManager, count: u64, tag: &str) -> Vec<Block> {
        (0..count)
            .map(|_| {
                let height = chain.height() + 1;
                let tx = Transaction::new(
                    TransactionKind::NodeAdded {
                        node_id: format!("{}-{}", tag, height),
                    },
                    height * 10,
                    PeerId::from(tag),
                )
                .unwrap();
                let block = chain.propose(PeerId::from(tag), vec![tx]).unwrap();
                chain.finalize(&block.hash).unwrap();
                block
            })
            .collect()
    }

    fn peer() -> PeerId {
        PeerId::from("peer-1")
    }

    fn engine(strategy: SyncStrategy) -> SyncEngine {
        SyncEngine::new(SyncConfig::with_strategy(strategy)).unwrap()
    }

    /// Sync all headers of `source` into `chain` through `engine`.
    fn sync_headers(engine: &mut SyncEngine, source: &ChainManager, chain: &mut ChainManager) {
        let (height, hash) = source.head();
        engine.observe_peer_head(peer(), height, hash, chain);
        while let Some(request) = engine.plan_header_requests(chain, 0).pop() {
            let headers = source.canonical_headers(request.from_height, request.to_height);
            engine.on_headers(&request.peer, headers, chain).unwrap();
        }
        assert_eq!(chain.head(), source.head());
    }

    fn deliver(engine: &mut SyncEngine, source: &ChainManager, chain: &mut ChainManager, hashes: &[Hash]) {
        for hash in hashes {
            let block = source.block(hash).unwrap().unwrap();
            engine.on_block_received(&peer(), block, chain).unwrap();
        }
    }

    #[test]
    fn test_observe_reports_missing_range() {
        let chain = new_chain();
        let mut engine = engine(SyncStrategy::Full);
        assert_eq!(
            engine.observe_peer_head(peer(), 50, Hash::compute(b"head"), &chain),
            Some((1, 50))
        );
        assert_eq!(
            engine.observe_peer_head(PeerId::from("peer-2"), 0, chain.head_hash(), &chain),
            None
        );
        assert_eq!(engine.peer(&peer()).unwrap().head_height, 50);
    }

    #[test]
    fn test_size_limit_plans_newest_first() {
        let mut source = new_chain();
        grow(&mut source, 50, "src");
        let mut chain = new_chain();
        let mut engine = engine(SyncStrategy::SizeLimit {
            max_blocks: 10,
            max_bytes: u64::MAX,
        });
        sync_headers(&mut engine, &source, &mut chain);

        let plan = engine.plan_fetch(&chain);
        let expected: Vec<Hash> = (41..=50)
            .rev()
            .map(|h| source.canonical_hash(h).unwrap())
            .collect();
        assert_eq!(plan, expected);

        let progress = engine.progress(&chain);
        assert_eq!(progress.gap, 40);
        assert_eq!(progress.missing_bodies, 50);
        assert_eq!(progress.target_height, 50);

        let requests = engine.dispatch(&chain, plan.clone(), 0);
        assert_eq!(requests.iter().map(|r| r.hashes.len()).sum::<usize>(), 10);
        assert!(engine.plan_fetch(&chain).is_empty());

        deliver(&mut engine, &source, &mut chain, &plan);
        assert_eq!(chain.bodies_held(), 10);
        assert!(engine.plan_fetch(&chain).is_empty());
        assert_eq!(engine.progress(&chain).gap, 40);
    }

    #[test]
    fn test_size_limit_byte_ceiling() {
        let mut source = new_chain();
        grow(&mut source, 5, "src");
        let mut chain = new_chain();
        let mut tight = engine(SyncStrategy::SizeLimit {
            max_blocks: 100,
            max_bytes: 1,
        });
        sync_headers(&mut tight, &source, &mut chain);
        // A single block already exceeds the budget.
        assert!(tight.plan_fetch(&chain).is_empty());
        assert_eq!(tight.progress(&chain).gap, 5);

        let mut chain = new_chain();
        let mut roomy = engine(SyncStrategy::SizeLimit {
            max_blocks: 100,
            max_bytes: 2 * BLOCK_OVERHEAD_BYTES as u64 + 100,
        });
        sync_headers(&mut roomy, &source, &mut chain);
        let plan = roomy.plan_fetch(&chain);
        let newest: Vec<Hash> = [5, 4].iter().map(|h| source.canonical_hash(*h).unwrap()).collect();
        assert_eq!(plan, newest);
        assert_eq!(roomy.progress(&chain).gap, 3);
    }

    #[test]
    fn test_full_sync_is_idempotent() {
        let mut source = new_chain();
        grow(&mut source, 5, "src");
        let mut chain = new_chain();
        let mut engine = engine(SyncStrategy::Full);
        sync_headers(&mut engine, &source, &mut chain);

        let plan = engine.plan_fetch(&chain);
        let expected: Vec<Hash> = (1..=5).map(|h| source.canonical_hash(h).unwrap()).collect();
        assert_eq!(plan, expected);

        deliver(&mut engine, &source, &mut chain, &plan);
        let before = chain.body_bytes();
        // The same range again changes nothing.
        deliver(&mut engine, &source, &mut chain, &plan);
        let again = chain.import_headers(source.canonical_headers(1, 5)).unwrap();
        assert_eq!(again.imported, 0);
        assert_eq!(chain.body_bytes(), before);
        assert_eq!(chain.bodies_held(), 5);
        assert!(engine.plan_fetch(&chain).is_empty());
        assert_eq!(engine.progress(&chain).gap, 0);
    }

    #[test]
    fn test_on_demand_waits_for_request() {
        let mut source = new_chain();
        grow(&mut source, 3, "src");
        let mut chain = new_chain();
        let mut engine = engine(SyncStrategy::OnDemand);
        sync_headers(&mut engine, &source, &mut chain);

        assert!(engine.plan_fetch(&chain).is_empty());
        assert_eq!(engine.progress(&chain).gap, 3);

        let wanted = source.canonical_hash(2).unwrap();
        assert!(engine.request_content(wanted));
        assert!(!engine.request_content(wanted));
        assert_eq!(engine.plan_fetch(&chain), vec![wanted]);

        deliver(&mut engine, &source, &mut chain, &[wanted]);
        assert!(chain.has_body(&wanted));
        assert!(engine.plan_fetch(&chain).is_empty());
    }

    #[test]
    fn test_time_range_selects_window() {
        let mut source = new_chain();
        grow(&mut source, 6, "src");
        let mut chain = new_chain();
        let mut engine = engine(SyncStrategy::TimeRange { from: 30, to: 50 });
        sync_headers(&mut engine, &source, &mut chain);

        let expected: Vec<Hash> = (3..=5).map(|h| source.canonical_hash(h).unwrap()).collect();
        assert_eq!(engine.plan_fetch(&chain), expected);
        assert_eq!(engine.progress(&chain).gap, 3);
    }

    #[test]
    fn test_orphan_parent_always_planned() {
        let mut source = new_chain();
        let blocks = grow(&mut source, 2, "src");
        let mut chain = new_chain();
        let engine = engine(SyncStrategy::OnDemand);

        chain.receive_candidate(blocks[1].clone()).unwrap();
        assert_eq!(engine.plan_fetch(&chain), vec![blocks[0].hash]);
    }

    #[test]
    fn test_fork_found_by_walking_back() {
        let mut source = new_chain();
        grow(&mut source, 5, "theirs");
        let mut chain = new_chain();
        grow(&mut chain, 3, "ours");

        let mut engine = SyncEngine::new(SyncConfig {
            max_headers_per_request: 2,
            fork_lookback: 1,
            ..Default::default()
        })
        .unwrap();
        sync_headers(&mut engine, &source, &mut chain);
        assert_eq!(chain.height(), 5);
        assert_eq!(chain.canonical_hash(1), source.canonical_hash(1));
    }

    #[test]
    fn test_unanswered_requests_report_peer_once() {
        let mut source = new_chain();
        grow(&mut source, 3, "src");
        let mut chain = new_chain();
        let mut engine = engine(SyncStrategy::Full);
        sync_headers(&mut engine, &source, &mut chain);

        let mut now = 0;
        let mut reported = Vec::new();
        for _ in 0..3 {
            let plan = engine.plan_fetch(&chain);
            assert_eq!(engine.dispatch(&chain, plan, now).len(), 1);
            now += 31;
            reported.extend(engine.sweep(now));
        }
        assert_eq!(reported, vec![peer()]);
        assert!(engine.sweep(now + 100).is_empty());

        // A peer at the failure limit gets no more work.
        assert!(engine.dispatch(&chain, engine.plan_fetch(&chain), now).is_empty());

        engine.peer_disconnected(&peer());
        assert!(engine.peer(&peer()).is_none());
        assert_eq!(engine.in_flight_len(), 0);
    }

    #[test]
    fn test_partial_response_releases_hashes() {
        let mut source = new_chain();
        grow(&mut source, 2, "src");
        let mut chain = new_chain();
        let mut engine = engine(SyncStrategy::Full);
        sync_headers(&mut engine, &source, &mut chain);

        let plan = engine.plan_fetch(&chain);
        let request = engine.dispatch(&chain, plan.clone(), 0).remove(0);
        deliver(&mut engine, &source, &mut chain, &plan[..1]);
        assert_eq!(engine.complete_request(&request.peer, request.request_id), 1);
        assert_eq!(engine.in_flight_len(), 0);
        assert_eq!(engine.peer(&peer()).unwrap().outstanding, 0);

        // The peer that declined is not asked again for the same block.
        assert!(engine.dispatch(&chain, vec![plan[1]], 0).is_empty());
        assert_eq!(engine.peer(&peer()).unwrap().failures, 0);
    }

    #[test]
    fn test_rejects_tampered_block() {
        let mut source = new_chain();
        let blocks = grow(&mut source, 1, "src");
        let mut chain = new_chain();
        let mut engine = engine(SyncStrategy::Full);
        sync_headers(&mut engine, &source, &mut chain);

        let mut block = blocks[0].clone();
        let forged = Transaction::new(
            TransactionKind::NodeRemoved {
                node_id: "x".into(),
            },
            1,
            PeerId::from("evil"),
        )
        .unwrap();
        block.transactions = vec![forged];
        assert_ne!(
            MerkleStore::build(&block.transactions).root(),
            block.header.merkle_root
        );
        assert!(engine.on_block_received(&peer(), block, &mut chain).is_err());
        assert_eq!(engine.peer(&peer()).unwrap().failures, 1);
        assert!(!chain.has_body(&blocks[0].hash));
    }
}
