mod common;

use common::*;
use socprod_network::{FetchResponse, MemoryHub, Message};
use socprod_sync::SyncStrategy;
use socprod_types::{Hash, LedgerEvent};

/// A node that finalizes every submission on its own.
async fn source(hub: &MemoryHub, id: &str, blocks: u64) -> TestNode {
    let mut cfg = config();
    cfg.verification.threshold = 1;
    cfg.chain.block_batch_size = 1;
    let mut node = join(hub, id, cfg);
    for i in 1..=blocks {
        node.node
            .submit_transaction(post(&format!("{}-{}", id, i), 1_000 + i))
            .await
            .unwrap();
    }
    assert_eq!(node.node.current_head().0, blocks);
    node
}

fn with_strategy(strategy: SyncStrategy) -> socprod_node::NodeConfig {
    let mut cfg = config();
    cfg.sync.strategy = strategy;
    cfg
}

#[tokio::test]
async fn test_size_limit_keeps_newest_blocks() {
    let hub = MemoryHub::new();
    let mut big = source(&hub, "big", 50).await;
    let mut x = join(
        &hub,
        "x",
        with_strategy(SyncStrategy::SizeLimit {
            max_blocks: 10,
            max_bytes: u64::MAX,
        }),
    );
    let mut events = x.node.subscribe();

    pump(&mut [&mut big, &mut x]).await;

    assert_eq!(x.node.current_head(), big.node.current_head());
    let chain = x.node.chain();
    assert_eq!(chain.bodies_held(), 10);
    for height in 41..=50 {
        let hash = chain.canonical_hash(height).unwrap();
        assert!(chain.has_body(&hash), "missing body at {}", height);
    }
    assert!(!chain.has_body(&chain.canonical_hash(40).unwrap()));

    let progress = x.node.sync_progress();
    assert_eq!(progress.local_height, 50);
    assert_eq!(progress.target_height, 50);
    assert_eq!(progress.missing_bodies, 40);
    assert_eq!(progress.gap, 40);
    assert!(drain_events(&mut events)
        .iter()
        .any(|event| matches!(event, LedgerEvent::SyncProgress(p) if p.gap == 40)));
}

#[tokio::test]
async fn test_full_sync_is_idempotent() {
    let hub = MemoryHub::new();
    let mut big = source(&hub, "big", 5).await;
    let mut x = join(&hub, "x", config());
    pump(&mut [&mut big, &mut x]).await;

    assert_eq!(x.node.current_head(), big.node.current_head());
    assert_eq!(x.node.chain().bodies_held(), 5);
    assert_eq!(x.node.sync_progress().gap, 0);

    let hashes: Vec<Hash> = (1..=5)
        .map(|h| big.node.chain().canonical_hash(h).unwrap())
        .collect();
    let blocks: Vec<_> = hashes
        .iter()
        .map(|hash| big.node.chain().block(hash).unwrap().unwrap())
        .collect();
    let headers = big.node.chain().canonical_headers(1, 5);

    for _ in 0..2 {
        x.node
            .apply_remote_message(from(
                "big",
                Message::BlockFetchResponse(FetchResponse::Headers(headers.clone())),
            ))
            .await
            .unwrap();
        x.node
            .apply_remote_message(from(
                "big",
                Message::BlockFetchResponse(FetchResponse::Blocks {
                    request_id: 999,
                    blocks: blocks.clone(),
                }),
            ))
            .await
            .unwrap();
    }

    assert_eq!(x.node.current_head(), big.node.current_head());
    assert_eq!(x.node.chain().bodies_held(), 5);
    assert_eq!(x.node.chain().canonical_headers(0, 5).len(), 6);
}

#[tokio::test]
async fn test_on_demand_fetches_only_requested_content() {
    let hub = MemoryHub::new();
    let mut big = source(&hub, "big", 5).await;
    let mut x = join(&hub, "x", with_strategy(SyncStrategy::OnDemand));
    pump(&mut [&mut big, &mut x]).await;

    assert_eq!(x.node.current_head().0, 5);
    assert_eq!(x.node.chain().bodies_held(), 0);

    let hash = x.node.chain().canonical_hash(3).unwrap();
    assert_eq!(x.node.block_content(&hash).await.unwrap(), None);
    pump(&mut [&mut big, &mut x]).await;

    let content = x.node.block_content(&hash).await.unwrap().unwrap();
    assert_eq!(content, big.node.chain().block(&hash).unwrap().unwrap().transactions);
    assert_eq!(x.node.chain().bodies_held(), 1);

    assert!(x.node.block_content(&Hash::compute(b"nowhere")).await.is_err());
}

#[tokio::test]
async fn test_time_range_fetches_window() {
    let hub = MemoryHub::new();
    let mut big = source(&hub, "big", 8).await;
    let mut x = join(
        &hub,
        "x",
        with_strategy(SyncStrategy::TimeRange {
            from: 1_003,
            to: 1_005,
        }),
    );
    pump(&mut [&mut big, &mut x]).await;

    let chain = x.node.chain();
    assert_eq!(chain.height(), 8);
    let held: Vec<u64> = (1..=8)
        .filter(|h| chain.has_body(&chain.canonical_hash(*h).unwrap()))
        .collect();
    assert_eq!(held, vec![3, 4, 5]);
}

#[tokio::test]
async fn test_late_joiner_catches_up_and_votes() {
    let hub = MemoryHub::new();
    let mut a = join(&hub, "a", config());
    let mut b = join(&hub, "b", config());
    let mut c = join(&hub, "c", config());
    pump(&mut [&mut a, &mut b, &mut c]).await;

    for round in 0..3u64 {
        a.node.submit_transaction(post(&format!("r{}", round), 50 + round)).await.unwrap();
        a.node.propose_block().await.unwrap();
        pump(&mut [&mut a, &mut b, &mut c]).await;
    }
    assert_eq!(c.node.current_head().0, 3);

    let mut d = join(&hub, "d", config());
    pump(&mut [&mut a, &mut b, &mut c, &mut d]).await;
    assert_eq!(d.node.current_head(), a.node.current_head());
    assert_eq!(d.node.chain().bodies_held(), 3);

    d.node.submit_transaction(post("from-d", 99)).await.unwrap();
    let block = d.node.propose_block().await.unwrap();
    pump(&mut [&mut a, &mut b, &mut c, &mut d]).await;
    for test_node in [&a, &b, &c, &d] {
        assert_eq!(test_node.node.current_head(), (4, block.hash));
    }
}
