//! The ledger node.
//!
//! [`LedgerNode`] owns the chain, the transaction pool, the vote tables and
//! the sync engine, and is the only place they change. Every inbound
//! message and local call runs to completion against that state; the only
//! suspension points are transport calls.

use crate::config::NodeConfig;
use crate::error::NodeError;
use socprod_consensus::{
    AcceptAll, ConsensusError, NodeMode, TransactionValidator, VerificationProtocol, VoteOutcome,
};
use socprod_core::{CandidateOutcome, ChainManager, PoolStatus, TransactionPool};
use socprod_crypto::MerkleProof;
use socprod_network::{Envelope, FetchRequest, FetchResponse, Message, Transport, TransportEvent};
use socprod_storage::BlockDB;
use socprod_sync::{SyncEngine, SyncState};
use socprod_types::{
    Block, Hash, LedgerEvent, PeerId, SyncProgress, Transaction, VerificationVote,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 1024;
const COMMAND_CAPACITY: usize = 256;

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Requests from outside the run loop.
#[derive(Debug)]
pub enum NodeCommand {
    Submit {
        transaction: Transaction,
        reply: oneshot::Sender<Result<PoolStatus, NodeError>>,
    },
    Propose {
        reply: oneshot::Sender<Result<Block, NodeError>>,
    },
    Head {
        reply: oneshot::Sender<(u64, Hash)>,
    },
    Progress {
        reply: oneshot::Sender<SyncProgress>,
    },
    BlockContent {
        hash: Hash,
        reply: oneshot::Sender<Result<Option<Vec<Transaction>>, NodeError>>,
    },
    Shutdown,
}

/// Cloneable access to a node driven by [`LedgerNode::run`].
#[derive(Clone)]
pub struct NodeHandle {
    commands: mpsc::Sender<NodeCommand>,
    events: broadcast::Sender<LedgerEvent>,
}

impl NodeHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> NodeCommand,
    ) -> Result<T, NodeError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| NodeError::Stopped)?;
        response.await.map_err(|_| NodeError::Stopped)
    }

    pub async fn submit_transaction(&self, transaction: Transaction) -> Result<PoolStatus, NodeError> {
        self.request(|reply| NodeCommand::Submit { transaction, reply })
            .await?
    }

    pub async fn propose_block(&self) -> Result<Block, NodeError> {
        self.request(|reply| NodeCommand::Propose { reply }).await?
    }

    pub async fn current_head(&self) -> Result<(u64, Hash), NodeError> {
        self.request(|reply| NodeCommand::Head { reply }).await
    }

    pub async fn sync_progress(&self) -> Result<SyncProgress, NodeError> {
        self.request(|reply| NodeCommand::Progress { reply }).await
    }

    pub async fn block_content(&self, hash: Hash) -> Result<Option<Vec<Transaction>>, NodeError> {
        self.request(|reply| NodeCommand::BlockContent { hash, reply })
            .await?
    }

    pub async fn shutdown(&self) -> Result<(), NodeError> {
        self.commands
            .send(NodeCommand::Shutdown)
            .await
            .map_err(|_| NodeError::Stopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }
}

/// A ledger node.
pub struct LedgerNode {
    local: PeerId,
    mode: NodeMode,
    tick_interval: Duration,
    chain: ChainManager,
    pool: TransactionPool,
    verification: VerificationProtocol,
    sync: SyncEngine,
    transport: Arc<dyn Transport>,
    validator: Box<dyn TransactionValidator>,
    events: broadcast::Sender<LedgerEvent>,
    /// Caps on what one fetch request is answered with
    max_headers_served: u64,
    max_blocks_served: usize,
    announced_head: Option<Hash>,
    last_progress: SyncProgress,
}

impl LedgerNode {
    /// Open the chain in `store` and attach the node to `transport`. The
    /// transport's local identity is the node's identity.
    pub fn open(
        config: &NodeConfig,
        store: BlockDB,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, NodeError> {
        let local = transport.local_peer().clone();
        let chain = ChainManager::open(store, config.chain.clone())?;
        let verification =
            VerificationProtocol::new(config.verification.clone(), config.mode, local.clone())?;
        let sync = SyncEngine::new(config.sync.clone())?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let (height, head) = chain.head();
        info!(
            node = %local,
            mode = ?config.mode,
            strategy = ?config.sync.strategy,
            height,
            head = %head.short(),
            "Ledger node ready"
        );

        Ok(Self {
            local,
            mode: config.mode,
            tick_interval: Duration::from_secs(config.tick_interval_secs.max(1)),
            pool: TransactionPool::new(config.chain.max_pending_transactions),
            chain,
            verification,
            sync,
            transport,
            validator: Box::new(AcceptAll),
            events,
            max_headers_served: config.sync.max_headers_per_request.max(1),
            max_blocks_served: config.sync.max_blocks_per_request.max(1),
            announced_head: Some(head),
            last_progress: SyncProgress::default(),
        })
    }

    /// Replace the semantic transaction check used before voting.
    pub fn with_validator(mut self, validator: impl TransactionValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// A handle for the run loop and the receiver [`run`](Self::run) reads
    /// its commands from.
    pub fn handle(&self) -> (NodeHandle, mpsc::Receiver<NodeCommand>) {
        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let handle = NodeHandle {
            commands,
            events: self.events.clone(),
        };
        (handle, receiver)
    }

    // Local operations

    /// Add a locally created transaction to the pool and announce it. A
    /// block is proposed once the pool holds a full batch.
    pub async fn submit_transaction(
        &mut self,
        transaction: Transaction,
    ) -> Result<PoolStatus, NodeError> {
        let status = self.pool.add(transaction.clone())?;
        if status != PoolStatus::Added {
            debug!(tx = %transaction, ?status, "Ignored known transaction");
            return Ok(status);
        }

        debug!(tx = %transaction, pending = self.pool.len(), "Accepted transaction");
        self.transport
            .broadcast(Message::TransactionAnnounce(transaction))
            .await?;

        if self.pool.len() >= self.chain.config().block_batch_size {
            self.propose_block().await?;
        }
        Ok(status)
    }

    /// Stage the oldest pending transactions into a candidate on top of the
    /// current head and broadcast it.
    pub async fn propose_block(&mut self) -> Result<Block, NodeError> {
        let batch = self
            .pool
            .peek_batch(self.chain.config().max_block_transactions);
        if batch.is_empty() {
            return Err(NodeError::NothingToPropose);
        }

        let block = self.chain.propose(self.local.clone(), batch)?;
        self.transport
            .broadcast(Message::BlockCandidate(block.clone()))
            .await?;
        self.settle(unix_now()).await?;
        Ok(block)
    }

    /// Periodic work: expire candidates and requests, continue syncing and
    /// announce the head.
    pub async fn tick(&mut self, now: u64) -> Result<(), NodeError> {
        let expired = self.verification.sweep(&mut self.chain, now);
        if !expired.is_empty() {
            debug!(count = expired.len(), "Expired candidates");
        }

        for peer in self.sync.sweep(now) {
            self.transport.report_unresponsive(&peer).await;
        }

        self.settle(now).await?;
        self.drive_sync(now).await;

        let (height, hash) = self.chain.head();
        self.transport
            .broadcast(Message::ChainHeadAnnounce { height, hash })
            .await?;
        self.announced_head = Some(hash);
        self.publish_progress();
        Ok(())
    }

    // Inbound

    pub async fn handle_transport_event(&mut self, event: TransportEvent) -> Result<(), NodeError> {
        match event {
            TransportEvent::Message(envelope) => self.apply_remote_message(envelope).await,
            TransportEvent::PeerConnected(peer) => {
                info!(peer = %peer, "Peer connected");
                let (height, hash) = self.chain.head();
                self.send(&peer, Message::ChainHeadAnnounce { height, hash })
                    .await;
                Ok(())
            }
            TransportEvent::PeerDisconnected(peer) => {
                info!(peer = %peer, "Peer disconnected");
                self.sync.peer_disconnected(&peer);
                Ok(())
            }
        }
    }

    /// Apply one message received from a peer.
    pub async fn apply_remote_message(&mut self, envelope: Envelope) -> Result<(), NodeError> {
        let Envelope { sender, message } = envelope;
        if sender == self.local {
            return Ok(());
        }
        debug!(peer = %sender, kind = message.kind(), "Received message");

        let now = unix_now();
        match message {
            Message::TransactionAnnounce(transaction) => {
                self.on_transaction(&sender, transaction).await
            }
            Message::BlockCandidate(block) => self.on_candidate(&sender, block, now).await,
            Message::BlockVote(vote) => self.on_vote(vote, now).await,
            Message::ChainHeadAnnounce { height, hash } => {
                self.sync.observe_peer_head(sender, height, hash, &self.chain);
                self.drive_sync(now).await;
                Ok(())
            }
            Message::BlockFetchRequest(request) => self.serve(&sender, request).await,
            Message::BlockFetchResponse(response) => {
                self.on_fetch_response(&sender, response, now).await
            }
        }
    }

    async fn on_transaction(
        &mut self,
        sender: &PeerId,
        transaction: Transaction,
    ) -> Result<(), NodeError> {
        let relay = (!self.mode.votes()).then(|| transaction.clone());
        match self.pool.add(transaction) {
            Ok(PoolStatus::Added) => {
                if let Some(transaction) = relay {
                    self.transport
                        .broadcast(Message::TransactionAnnounce(transaction))
                        .await?;
                }
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(peer = %sender, "Rejected transaction: {}", e);
                Err(e.into())
            }
        }
    }

    async fn on_candidate(&mut self, sender: &PeerId, block: Block, now: u64) -> Result<(), NodeError> {
        let relay = (!self.mode.votes()).then(|| block.clone());
        match self.chain.receive_candidate(block)? {
            CandidateOutcome::Registered => {
                if let Some(block) = relay {
                    self.transport
                        .broadcast(Message::BlockCandidate(block))
                        .await?;
                }
            }
            CandidateOutcome::Orphaned { missing_parent } => {
                debug!(
                    peer = %sender,
                    parent = %missing_parent.short(),
                    "Candidate waits for its parent"
                );
                self.drive_sync(now).await;
            }
            CandidateOutcome::Known | CandidateOutcome::Discarded => {}
        }
        self.settle(now).await
    }

    async fn on_vote(&mut self, vote: VerificationVote, now: u64) -> Result<(), NodeError> {
        let outcome =
            self.verification
                .cast_vote(&mut self.chain, vote.block_hash, vote.voter.clone())?;
        debug!(vote = %vote, ?outcome, "Counted vote");

        let fresh = matches!(
            outcome,
            VoteOutcome::Pending { .. } | VoteOutcome::Buffered | VoteOutcome::Finalized(_)
        );
        if fresh && !self.mode.votes() {
            self.transport.broadcast(Message::BlockVote(vote)).await?;
        }
        self.settle(now).await
    }

    /// Answer a fetch request from the canonical chain. Blocks that are not
    /// finalized or whose body is not held are left out.
    async fn serve(&mut self, peer: &PeerId, request: FetchRequest) -> Result<(), NodeError> {
        let response = match request {
            FetchRequest::Headers {
                from_height,
                to_height,
            } => {
                let last = to_height.min(from_height.saturating_add(self.max_headers_served - 1));
                let headers = if from_height > last {
                    Vec::new()
                } else {
                    self.chain.canonical_headers(from_height, last)
                };
                debug!(peer = %peer, from_height, count = headers.len(), "Serving headers");
                FetchResponse::Headers(headers)
            }
            FetchRequest::Blocks { request_id, hashes } => {
                let mut blocks = Vec::new();
                for hash in hashes.iter().take(self.max_blocks_served) {
                    if !self.chain.is_finalized(hash) {
                        continue;
                    }
                    if let Some(block) = self.chain.block(hash)? {
                        blocks.push(block);
                    }
                }
                debug!(
                    peer = %peer,
                    request_id,
                    requested = hashes.len(),
                    served = blocks.len(),
                    "Serving blocks"
                );
                FetchResponse::Blocks { request_id, blocks }
            }
        };
        self.send(peer, Message::BlockFetchResponse(response)).await;
        Ok(())
    }

    async fn on_fetch_response(
        &mut self,
        peer: &PeerId,
        response: FetchResponse,
        now: u64,
    ) -> Result<(), NodeError> {
        match response {
            FetchResponse::Headers(headers) => {
                if let Err(e) = self.sync.on_headers(peer, headers, &mut self.chain) {
                    debug!(peer = %peer, "Header import failed: {}", e);
                }
            }
            FetchResponse::Blocks { request_id, blocks } => {
                for block in blocks {
                    if let Err(e) = self.sync.on_block_received(peer, block, &mut self.chain) {
                        debug!(peer = %peer, "Block import failed: {}", e);
                    }
                }
                let released = self.sync.complete_request(peer, request_id);
                if released > 0 {
                    debug!(peer = %peer, request_id, released, "Peer lacked requested blocks");
                }
            }
        }

        self.settle(now).await?;
        self.drive_sync(now).await;
        self.publish_progress();
        Ok(())
    }

    // Reactions to chain changes

    /// Track and vote on newly registered candidates, react to chain events
    /// and publish them, then flush the resulting votes and head change.
    async fn settle(&mut self, now: u64) -> Result<(), NodeError> {
        let mut outbound = Vec::new();
        loop {
            let registered = self.chain.take_registered();
            let events = self.chain.take_events();
            if registered.is_empty() && events.is_empty() {
                break;
            }
            for hash in registered {
                self.on_registered(hash, now, &mut outbound);
            }
            for event in events {
                self.on_event(event, &mut outbound)?;
            }
        }

        for message in outbound {
            self.transport.broadcast(message).await?;
        }

        let (height, hash) = self.chain.head();
        if self.announced_head != Some(hash) {
            self.announced_head = Some(hash);
            self.transport
                .broadcast(Message::ChainHeadAnnounce { height, hash })
                .await?;
        }
        Ok(())
    }

    fn on_registered(&mut self, hash: Hash, now: u64, outbound: &mut Vec<Message>) {
        // Its transactions are spoken for until the candidate finalizes or
        // is discarded.
        if let Some(block) = self.chain.candidate(&hash) {
            self.pool.mark_proposed(hash, &block.transactions);
        }

        match self.verification.track(&mut self.chain, hash, now) {
            Ok(Some(outcome)) => debug!(hash = %hash.short(), ?outcome, "Replayed early votes"),
            Ok(None) => {}
            Err(e) => warn!(hash = %hash.short(), "Failed to track candidate: {}", e),
        }
        self.approve(hash, outbound);
    }

    fn approve(&mut self, hash: Hash, outbound: &mut Vec<Message>) {
        match self
            .verification
            .local_approve(&mut self.chain, hash, self.validator.as_ref())
        {
            Ok(Some(vote)) => outbound.push(Message::BlockVote(vote)),
            Ok(None) => {}
            // Rejections are logged and discarded by the protocol; an unknown
            // candidate was finalized by replayed votes.
            Err(ConsensusError::Rejected { .. }) | Err(ConsensusError::UnknownCandidate(_)) => {}
            Err(e) => warn!(hash = %hash.short(), "Local approval failed: {}", e),
        }
    }

    fn on_event(&mut self, event: LedgerEvent, outbound: &mut Vec<Message>) -> Result<(), NodeError> {
        match &event {
            LedgerEvent::BlockFinalized { hash, .. } => {
                if let Some(block) = self.chain.block(hash)? {
                    self.pool.on_finalized(&block);
                }
            }
            LedgerEvent::ForkAdopted { new_head, .. } => {
                debug!(head = %new_head.short(), "Re-checking pending candidates after fork");
                self.reapprove(outbound);
            }
            LedgerEvent::CandidateDiscarded { hash, .. } => {
                let requeued = self.pool.on_discarded(hash);
                if requeued > 0 {
                    debug!(hash = %hash.short(), requeued, "Transactions returned to pool");
                }
            }
            LedgerEvent::SyncProgress(_) => {}
        }
        let _ = self.events.send(event);
        Ok(())
    }

    /// After a reorg, vote on pending candidates not voted on yet and
    /// repeat the votes already cast.
    fn reapprove(&mut self, outbound: &mut Vec<Message>) {
        let pending: Vec<Hash> = self
            .chain
            .pending_candidates()
            .iter()
            .map(|block| block.hash)
            .collect();
        for hash in pending {
            match self.verification.local_vote(&hash) {
                Some(vote) => outbound.push(Message::BlockVote(vote)),
                None => self.approve(hash, outbound),
            }
        }
    }

    // Sync

    async fn drive_sync(&mut self, now: u64) {
        for request in self.sync.plan_header_requests(&self.chain, now) {
            let message = Message::BlockFetchRequest(FetchRequest::Headers {
                from_height: request.from_height,
                to_height: request.to_height,
            });
            self.send(&request.peer, message).await;
        }

        let wanted = self.sync.plan_fetch(&self.chain);
        if wanted.is_empty() {
            return;
        }
        for request in self.sync.dispatch(&self.chain, wanted, now) {
            debug!(
                peer = %request.peer,
                request_id = request.request_id,
                count = request.hashes.len(),
                "Requesting blocks"
            );
            let message = Message::BlockFetchRequest(FetchRequest::Blocks {
                request_id: request.request_id,
                hashes: request.hashes,
            });
            self.send(&request.peer, message).await;
        }
    }

    fn publish_progress(&mut self) {
        let progress = self.sync.progress(&self.chain);
        if progress == self.last_progress {
            return;
        }
        if progress.local_height < progress.target_height || progress.gap > 0 {
            info!(
                local = progress.local_height,
                target = progress.target_height,
                missing = progress.missing_bodies,
                gap = progress.gap,
                "Sync progress"
            );
        }
        self.last_progress = progress.clone();
        let _ = self.events.send(LedgerEvent::SyncProgress(progress));
    }

    /// Directed send. A failure surfaces later as an expired request, so it
    /// is only logged.
    async fn send(&self, peer: &PeerId, message: Message) {
        let kind = message.kind();
        if let Err(e) = self.transport.send(peer, message).await {
            debug!(peer = %peer, kind, "Send failed: {}", e);
        }
    }

    // Queries

    pub fn local_peer(&self) -> &PeerId {
        &self.local
    }

    pub fn mode(&self) -> NodeMode {
        self.mode
    }

    /// Height and hash of the canonical head.
    pub fn current_head(&self) -> (u64, Hash) {
        self.chain.head()
    }

    /// Candidates still collecting votes, lowest height first.
    pub fn pending_candidates(&self) -> Vec<&Block> {
        self.chain.pending_candidates()
    }

    pub fn known_peers_sync_state(&self) -> Vec<SyncState> {
        self.sync.peers().cloned().collect()
    }

    pub fn sync_progress(&self) -> SyncProgress {
        self.sync.progress(&self.chain)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Merkle inclusion proof for a transaction in a pending or finalized
    /// block.
    pub fn prove_transaction(
        &mut self,
        block_hash: &Hash,
        tx_hash: &Hash,
    ) -> Result<MerkleProof, NodeError> {
        Ok(self.chain.prove(block_hash, tx_hash)?)
    }

    /// Transactions of a block. When only the header is held the body is
    /// requested from peers and `None` is returned; ask again once it has
    /// arrived.
    pub async fn block_content(&mut self, hash: &Hash) -> Result<Option<Vec<Transaction>>, NodeError> {
        if let Some(block) = self.chain.block(hash)? {
            return Ok(Some(block.transactions));
        }
        if self.chain.header(hash).is_none() {
            return Err(NodeError::UnknownBlock(*hash));
        }

        if self.sync.request_content(*hash) {
            debug!(hash = %hash.short(), "Requested block content");
        }
        self.drive_sync(unix_now()).await;
        Ok(None)
    }

    pub fn chain(&self) -> &ChainManager {
        &self.chain
    }

    pub fn verification(&self) -> &VerificationProtocol {
        &self.verification
    }

    pub fn pending_transactions(&self) -> usize {
        self.pool.len()
    }

    // Run loop

    /// Drive the node from transport events, commands and the tick timer
    /// until shutdown or until the transport closes.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<TransportEvent>,
        mut commands: mpsc::Receiver<NodeCommand>,
    ) -> Result<(), NodeError> {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(node = %self.local, "Ledger node running");

        loop {
            tokio::select! {
                event = inbound.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_transport_event(event).await {
                            warn!("Failed to apply transport event: {}", e);
                        }
                    }
                    None => {
                        info!("Transport closed");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(NodeCommand::Shutdown) | None => {
                        info!("Shutdown requested");
                        break;
                    }
                    Some(command) => self.execute(command).await,
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(unix_now()).await {
                        warn!("Tick failed: {}", e);
                    }
                }
            }
        }

        let (height, head) = self.chain.head();
        info!(height, head = %head.short(), "Ledger node stopped");
        Ok(())
    }

    async fn execute(&mut self, command: NodeCommand) {
        match command {
            NodeCommand::Submit { transaction, reply } => {
                let _ = reply.send(self.submit_transaction(transaction).await);
            }
            NodeCommand::Propose { reply } => {
                let _ = reply.send(self.propose_block().await);
            }
            NodeCommand::Head { reply } => {
                let _ = reply.send(self.current_head());
            }
            NodeCommand::Progress { reply } => {
                let _ = reply.send(self.sync_progress());
            }
            NodeCommand::BlockContent { hash, reply } => {
                let _ = reply.send(self.block_content(&hash).await);
            }
            NodeCommand::Shutdown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socprod_network::MemoryHub;
    use socprod_types::{ContentAction, TransactionKind};

    fn post(id: &str, at: u64) -> Transaction {
        Transaction::new(
            TransactionKind::Post {
                action: ContentAction::Added,
                post_id: id.into(),
                author_id: "alice".into(),
                body: format!("body of {}", id),
            },
            at,
            PeerId::from("a"),
        )
        .unwrap()
    }

    fn node(hub: &MemoryHub, id: &str, config: NodeConfig) -> (LedgerNode, mpsc::Receiver<TransportEvent>) {
        let (transport, inbound) = hub.join(PeerId::from(id));
        let node = LedgerNode::open(&config, BlockDB::in_memory(), Arc::new(transport)).unwrap();
        (node, inbound)
    }

    fn drain(inbound: &mut mpsc::Receiver<TransportEvent>) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(event) = inbound.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_batch_triggers_proposal() {
        let hub = MemoryHub::new();
        let mut config = NodeConfig::default();
        config.chain.block_batch_size = 2;
        let (mut a, _) = node(&hub, "a", config);
        let (_, mut observer) = hub.join(PeerId::from("observer"));

        assert_eq!(a.submit_transaction(post("p1", 1)).await.unwrap(), PoolStatus::Added);
        assert!(a.pending_candidates().is_empty());
        assert_eq!(
            a.submit_transaction(post("p1", 1)).await.unwrap(),
            PoolStatus::AlreadyPending
        );
        a.submit_transaction(post("p2", 2)).await.unwrap();

        let pending = a.pending_candidates();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].tx_count(), 2);
        assert_eq!(pending[0].height(), 1);
        let hash = pending[0].hash;
        assert_eq!(a.pending_transactions(), 0);
        assert_eq!(a.verification().votes(&hash), 1);

        let kinds: Vec<&str> = drain(&mut observer)
            .into_iter()
            .filter_map(|event| match event {
                TransportEvent::Message(envelope) => Some(envelope.message.kind()),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "transaction_announce",
                "transaction_announce",
                "block_candidate",
                "block_vote"
            ]
        );
    }

    #[tokio::test]
    async fn test_propose_with_empty_pool() {
        let hub = MemoryHub::new();
        let (mut a, _) = node(&hub, "a", NodeConfig::default());
        assert!(matches!(a.propose_block().await, Err(NodeError::NothingToPropose)));
    }

    #[tokio::test]
    async fn test_gossip_node_relays_without_voting() {
        let hub = MemoryHub::new();
        let mut config = NodeConfig::default();
        config.mode = NodeMode::Gossip;
        let (mut g, _) = node(&hub, "g", config);
        let (_, mut observer) = hub.join(PeerId::from("observer"));

        let mut proposer = ChainManager::open(BlockDB::in_memory(), Default::default()).unwrap();
        let block = proposer.propose(PeerId::from("p"), vec![post("p1", 1)]).unwrap();
        g.apply_remote_message(Envelope::new(PeerId::from("p"), Message::BlockCandidate(block.clone())))
            .await
            .unwrap();

        assert_eq!(g.verification().votes(&block.hash), 0);
        let relayed: Vec<Message> = drain(&mut observer)
            .into_iter()
            .filter_map(|event| match event {
                TransportEvent::Message(envelope) => Some(envelope.message),
                _ => None,
            })
            .collect();
        assert!(relayed.contains(&Message::BlockCandidate(block)));
        assert!(!relayed.iter().any(|m| matches!(m, Message::BlockVote(_))));
    }

    #[tokio::test]
    async fn test_serves_headers_and_bounded_blocks() {
        let hub = MemoryHub::new();
        let mut config = NodeConfig::default();
        config.verification.threshold = 1;
        config.chain.block_batch_size = 1;
        config.sync.max_blocks_per_request = 2;
        let (mut a, _) = node(&hub, "a", config);
        let (_, mut asker) = hub.join(PeerId::from("asker"));

        let mut hashes = Vec::new();
        for i in 0..3 {
            a.submit_transaction(post(&format!("p{}", i), i)).await.unwrap();
            hashes.push(a.current_head().1);
        }
        assert_eq!(a.current_head().0, 3);
        drain(&mut asker);

        let request = |r| Envelope::new(PeerId::from("asker"), Message::BlockFetchRequest(r));
        a.apply_remote_message(request(FetchRequest::Headers {
            from_height: 2,
            to_height: 10,
        }))
        .await
        .unwrap();
        a.apply_remote_message(request(FetchRequest::Blocks {
            request_id: 7,
            hashes: hashes.clone(),
        }))
        .await
        .unwrap();

        let responses: Vec<FetchResponse> = drain(&mut asker)
            .into_iter()
            .filter_map(|event| match event {
                TransportEvent::Message(Envelope {
                    message: Message::BlockFetchResponse(response),
                    ..
                }) => Some(response),
                _ => None,
            })
            .collect();
        assert_eq!(responses.len(), 2);
        match &responses[0] {
            FetchResponse::Headers(headers) => {
                let heights: Vec<u64> = headers.iter().map(|h| h.height).collect();
                assert_eq!(heights, vec![2, 3]);
            }
            other => panic!("unexpected response {:?}", other),
        }
        match &responses[1] {
            FetchResponse::Blocks { request_id, blocks } => {
                assert_eq!(*request_id, 7);
                assert_eq!(blocks.len(), 2);
                assert_eq!(blocks[0].hash, hashes[0]);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prove_transaction() {
        let hub = MemoryHub::new();
        let mut config = NodeConfig::default();
        config.verification.threshold = 1;
        let (mut a, _) = node(&hub, "a", config);

        let txs = vec![post("p1", 1), post("p2", 2), post("p3", 3)];
        for tx in &txs {
            a.submit_transaction(tx.clone()).await.unwrap();
        }
        let block = a.propose_block().await.unwrap();
        assert!(a.chain().is_finalized(&block.hash));

        let proof = a.prove_transaction(&block.hash, &txs[1].content_hash).unwrap();
        assert!(socprod_crypto::verify(&block.header.merkle_root, &txs[1], &proof));
        assert!(a.prove_transaction(&block.hash, &Hash::compute(b"absent")).is_err());
        assert_eq!(a.block_content(&block.hash).await.unwrap(), Some(txs));
    }

    #[tokio::test]
    async fn test_handle_round_trip() {
        let hub = MemoryHub::new();
        let mut config = NodeConfig::default();
        config.verification.threshold = 1;
        config.tick_interval_secs = 3600;
        let (a, inbound) = node(&hub, "a", config);
        let (handle, commands) = a.handle();
        let mut events = handle.subscribe();
        let task = tokio::spawn(a.run(inbound, commands));

        handle.submit_transaction(post("p1", 1)).await.unwrap();
        let block = handle.propose_block().await.unwrap();
        assert_eq!(handle.current_head().await.unwrap(), (1, block.hash));

        let finalized = loop {
            match events.recv().await.unwrap() {
                LedgerEvent::BlockFinalized { hash, height } => break (hash, height),
                _ => continue,
            }
        };
        assert_eq!(finalized, (block.hash, 1));

        handle.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
        assert!(matches!(handle.current_head().await, Err(NodeError::Stopped)));
    }
}
