mod common;

use common::*;
use socprod_network::{MemoryHub, Message};
use socprod_types::{Block, LedgerEvent};

async fn finalize_remote(x: &mut TestNode, blocks: &[Block]) {
    for block in blocks {
        x.node
            .apply_remote_message(from("p", Message::BlockCandidate(block.clone())))
            .await
            .unwrap();
        for voter in ["v1", "v2", "v3"] {
            x.node.apply_remote_message(vote(block, voter)).await.unwrap();
        }
        assert!(x.node.chain().is_finalized(&block.hash));
    }
}

#[tokio::test]
async fn test_longer_segment_is_adopted() {
    let mut left = builder();
    let prefix = extend(&mut left, 4, "shared");
    let mut right = builder();
    adopt(&mut right, &prefix);

    let long = extend(&mut left, 3, "left");
    let short = extend(&mut right, 2, "right");
    assert_eq!(long.last().unwrap().height(), 7);
    assert_eq!(short.last().unwrap().height(), 6);

    let hub = MemoryHub::new();
    let mut x = join(&hub, "x", config());
    let mut events = x.node.subscribe();

    finalize_remote(&mut x, &prefix).await;
    finalize_remote(&mut x, &short).await;
    assert_eq!(x.node.current_head(), (6, short[1].hash));
    drain_events(&mut events);

    finalize_remote(&mut x, &long).await;
    let tip = long.last().unwrap();
    assert_eq!(x.node.current_head(), (7, tip.hash));

    let chain = x.node.chain();
    for block in prefix.iter().chain(long.iter()) {
        assert!(chain.is_canonical(&block.hash));
    }
    for block in &short {
        assert!(chain.is_finalized(&block.hash));
        assert!(!chain.is_canonical(&block.hash));
    }

    let adopted: Vec<LedgerEvent> = drain_events(&mut events)
        .into_iter()
        .filter(|event| matches!(event, LedgerEvent::ForkAdopted { .. }))
        .collect();
    assert!(!adopted.is_empty());
    let orphaned: Vec<_> = adopted
        .iter()
        .flat_map(|event| match event {
            LedgerEvent::ForkAdopted {
                fork_height,
                orphaned,
                ..
            } => {
                assert_eq!(*fork_height, 4);
                orphaned.clone()
            }
            _ => Vec::new(),
        })
        .collect();
    assert_eq!(orphaned, vec![short[0].hash, short[1].hash]);
}

#[tokio::test]
async fn test_pending_candidate_is_revoted_after_fork() {
    let mut left = builder();
    let prefix = extend(&mut left, 1, "shared");
    let mut right = builder();
    adopt(&mut right, &prefix);
    let long = extend(&mut left, 2, "left");
    let short = extend(&mut right, 1, "right");

    let hub = MemoryHub::new();
    let mut x = join(&hub, "x", config());
    let (_, mut observer) = hub.join(socprod_types::PeerId::from("observer"));

    finalize_remote(&mut x, &prefix).await;
    finalize_remote(&mut x, &short).await;

    // A candidate on the losing side is still pending when the fork switches.
    let pending = right
        .propose(socprod_types::PeerId::from("p"), vec![post("late", 5_000)])
        .unwrap();
    x.node
        .apply_remote_message(from("p", Message::BlockCandidate(pending.clone())))
        .await
        .unwrap();
    assert_eq!(x.node.verification().votes(&pending.hash), 1);
    while observer.try_recv().is_ok() {}

    finalize_remote(&mut x, &long).await;
    assert_eq!(x.node.current_head().1, long[1].hash);

    let mut revoted = false;
    while let Ok(event) = observer.try_recv() {
        if let socprod_network::TransportEvent::Message(envelope) = event {
            if let Message::BlockVote(vote) = envelope.message {
                revoted |= vote.block_hash == pending.hash;
            }
        }
    }
    assert!(revoted);
}
