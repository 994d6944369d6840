#![allow(dead_code)]

use socprod_core::{ChainConfig, ChainManager};
use socprod_network::{Envelope, MemoryHub, Message, TransportEvent};
use socprod_node::{LedgerNode, NodeConfig};
use socprod_storage::BlockDB;
use socprod_types::{Block, ContentAction, LedgerEvent, PeerId, Transaction, TransactionKind, VerificationVote};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// A node on a memory hub whose inbound queue is pumped by hand.
pub struct TestNode {
    pub node: LedgerNode,
    pub inbound: mpsc::Receiver<TransportEvent>,
}

pub fn config() -> NodeConfig {
    let mut config = NodeConfig::default();
    // Tests propose explicitly unless they lower this.
    config.chain.block_batch_size = config.chain.max_block_transactions;
    config
}

pub fn join(hub: &MemoryHub, id: &str, config: NodeConfig) -> TestNode {
    let (transport, inbound) = hub.join(PeerId::from(id));
    let node = LedgerNode::open(&config, BlockDB::in_memory(), Arc::new(transport)).unwrap();
    TestNode { node, inbound }
}

/// Deliver queued transport events until every queue is empty.
pub async fn pump(nodes: &mut [&mut TestNode]) {
    loop {
        let mut delivered = false;
        for test_node in nodes.iter_mut() {
            while let Ok(event) = test_node.inbound.try_recv() {
                delivered = true;
                let _ = test_node.node.handle_transport_event(event).await;
            }
        }
        if !delivered {
            break;
        }
    }
}

pub fn post(id: &str, created_at: u64) -> Transaction {
    Transaction::new(
        TransactionKind::Post {
            action: ContentAction::Added,
            post_id: id.into(),
            author_id: "alice".into(),
            body: format!("contents of {}", id),
        },
        created_at,
        PeerId::from("origin"),
    )
    .unwrap()
}

pub fn from(peer: &str, message: Message) -> Envelope {
    Envelope::new(PeerId::from(peer), message)
}

pub fn vote(block: &Block, voter: &str) -> Envelope {
    from(
        voter,
        Message::BlockVote(VerificationVote::new(block.hash, PeerId::from(voter))),
    )
}

/// A bare chain used to mint blocks outside any node.
pub fn builder() -> ChainManager {
    ChainManager::open(BlockDB::in_memory(), ChainConfig::default()).unwrap()
}

/// Propose and finalize `count` single-transaction blocks on `chain`.
pub fn extend(chain: &mut ChainManager, count: usize, tag: &str) -> Vec<Block> {
    (0..count)
        .map(|_| {
            let height = chain.height() + 1;
            let tx = post(&format!("{}-{}", tag, height), 1_000 + height);
            let block = chain.propose(PeerId::from("proposer"), vec![tx]).unwrap();
            chain.finalize(&block.hash).unwrap();
            block
        })
        .collect()
}

/// Finalize blocks minted elsewhere on `chain`.
pub fn adopt(chain: &mut ChainManager, blocks: &[Block]) {
    for block in blocks {
        chain.receive_candidate(block.clone()).unwrap();
        chain.finalize(&block.hash).unwrap();
    }
}

pub fn drain_events(events: &mut broadcast::Receiver<LedgerEvent>) -> Vec<LedgerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn finalized_count(events: &[LedgerEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, LedgerEvent::BlockFinalized { .. }))
        .count()
}
