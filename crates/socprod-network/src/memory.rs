//! In-process transport. Every peer that joins a hub is connected to every
//! other peer; messages are delivered through bounded channels.

use crate::error::NetworkError;
use crate::message::{Envelope, Message};
use crate::transport::{Transport, TransportEvent};
use async_trait::async_trait;
use parking_lot::RwLock;
use socprod_types::PeerId;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 4096;

type Members = BTreeMap<PeerId, mpsc::Sender<TransportEvent>>;

/// Shared switchboard for [`MemoryTransport`]s.
#[derive(Clone)]
pub struct MemoryHub {
    members: Arc<RwLock<Members>>,
    capacity: usize,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            members: Arc::new(RwLock::new(BTreeMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Connect a new peer to everyone already on the hub.
    pub fn join(&self, peer: PeerId) -> (MemoryTransport, mpsc::Receiver<TransportEvent>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        {
            let mut members = self.members.write();
            for (other, sender) in members.iter() {
                deliver(sender, TransportEvent::PeerConnected(peer.clone()));
                deliver(&tx, TransportEvent::PeerConnected(other.clone()));
            }
            members.insert(peer.clone(), tx);
        }
        debug!(peer = %peer, "Joined memory hub");

        let transport = MemoryTransport {
            local: peer,
            hub: self.clone(),
        };
        (transport, rx)
    }

    /// Remove a peer; everyone else sees it disconnect.
    pub fn leave(&self, peer: &PeerId) {
        let mut members = self.members.write();
        if members.remove(peer).is_some() {
            for sender in members.values() {
                deliver(sender, TransportEvent::PeerDisconnected(peer.clone()));
            }
        }
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.members.read().keys().cloned().collect()
    }
}

fn deliver(sender: &mpsc::Sender<TransportEvent>, event: TransportEvent) -> bool {
    match sender.try_send(event) {
        Ok(()) => true,
        Err(e) => {
            warn!("Dropped transport event: {}", e);
            false
        }
    }
}

/// One peer's handle on a [`MemoryHub`].
pub struct MemoryTransport {
    local: PeerId,
    hub: MemoryHub,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_peer(&self) -> &PeerId {
        &self.local
    }

    async fn broadcast(&self, message: Message) -> Result<(), NetworkError> {
        let members = self.hub.members.read();
        for (peer, sender) in members.iter() {
            if peer != &self.local {
                let envelope = Envelope::new(self.local.clone(), message.clone());
                deliver(sender, TransportEvent::Message(envelope));
            }
        }
        Ok(())
    }

    async fn send(&self, peer: &PeerId, message: Message) -> Result<(), NetworkError> {
        let members = self.hub.members.read();
        let sender = members
            .get(peer)
            .ok_or_else(|| NetworkError::UnknownPeer(peer.clone()))?;
        let envelope = Envelope::new(self.local.clone(), message);
        if deliver(sender, TransportEvent::Message(envelope)) {
            Ok(())
        } else {
            Err(NetworkError::SendFailed(peer.clone()))
        }
    }

    async fn report_unresponsive(&self, peer: &PeerId) {
        debug!(reporter = %self.local, peer = %peer, "Peer reported unresponsive");
        self.hub.leave(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socprod_types::Hash;

    fn head() -> Message {
        Message::ChainHeadAnnounce {
            height: 3,
            hash: Hash::compute(b"head"),
        }
    }

    #[tokio::test]
    async fn test_join_announces_peers() {
        let hub = MemoryHub::new();
        let (_a, mut rx_a) = hub.join(PeerId::from("a"));
        let (_b, mut rx_b) = hub.join(PeerId::from("b"));

        assert_eq!(
            rx_a.try_recv().unwrap(),
            TransportEvent::PeerConnected(PeerId::from("b"))
        );
        assert_eq!(
            rx_b.try_recv().unwrap(),
            TransportEvent::PeerConnected(PeerId::from("a"))
        );
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let hub = MemoryHub::new();
        let (a, mut rx_a) = hub.join(PeerId::from("a"));
        let (_b, mut rx_b) = hub.join(PeerId::from("b"));
        let (_c, mut rx_c) = hub.join(PeerId::from("c"));
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}
        while rx_c.try_recv().is_ok() {}

        a.broadcast(head()).await.unwrap();
        let expected = TransportEvent::Message(Envelope::new(PeerId::from("a"), head()));
        assert_eq!(rx_b.try_recv().unwrap(), expected);
        assert_eq!(rx_c.try_recv().unwrap(), expected);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer() {
        let hub = MemoryHub::new();
        let (a, _rx) = hub.join(PeerId::from("a"));
        assert!(matches!(
            a.send(&PeerId::from("ghost"), head()).await,
            Err(NetworkError::UnknownPeer(_))
        ));
    }

    #[tokio::test]
    async fn test_report_removes_peer() {
        let hub = MemoryHub::new();
        let (a, mut rx_a) = hub.join(PeerId::from("a"));
        let (_b, _rx_b) = hub.join(PeerId::from("b"));
        while rx_a.try_recv().is_ok() {}

        a.report_unresponsive(&PeerId::from("b")).await;
        assert_eq!(
            rx_a.try_recv().unwrap(),
            TransportEvent::PeerDisconnected(PeerId::from("b"))
        );
        assert_eq!(hub.peers(), vec![PeerId::from("a")]);
    }
}
