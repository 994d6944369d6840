use crate::error::NetworkError;
use crate::message::{Envelope, Message};
use async_trait::async_trait;
use socprod_types::PeerId;

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(Envelope),
    PeerConnected(PeerId),
    PeerDisconnected(PeerId),
}

/// The peer-to-peer layer as seen by a ledger node: fan-out to every
/// connected peer, a directed send, and a way to flag a peer that stopped
/// answering. Inbound traffic arrives as [`TransportEvent`]s on the
/// receiver handed out when the transport is created.
#[async_trait]
pub trait Transport: Send + Sync {
    fn local_peer(&self) -> &PeerId;

    async fn broadcast(&self, message: Message) -> Result<(), NetworkError>;

    async fn send(&self, peer: &PeerId, message: Message) -> Result<(), NetworkError>;

    /// Ask the transport to drop `peer`. It is up to the transport whether
    /// and when that happens.
    async fn report_unresponsive(&self, peer: &PeerId);
}
