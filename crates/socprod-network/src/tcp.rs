//! TCP transport.
//!
//! One persistent connection per peer. The first frame in each direction is
//! the sender's [`PeerId`]; every later frame is an [`Envelope`]. There is
//! no discovery: peers are the bootstrap addresses plus whoever connects.

use crate::error::NetworkError;
use crate::message::{read_frame, write_frame, Envelope, Message};
use crate::transport::{Transport, TransportEvent};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use socprod_types::PeerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Network configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub listen_addr: String,
    pub bootstrap_peers: Vec<String>,
    pub max_peers: usize,
    /// Capacity of the inbound event and per-peer outbound queues
    pub channel_capacity: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:30400".to_string(),
            bootstrap_peers: vec![],
            max_peers: 50,
            channel_capacity: 1024,
        }
    }
}

struct PeerLink {
    address: SocketAddr,
    outbound: mpsc::Sender<Vec<u8>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

type Peers = Arc<RwLock<HashMap<PeerId, PeerLink>>>;

#[derive(Clone)]
struct Shared {
    local: PeerId,
    peers: Peers,
    events: mpsc::Sender<TransportEvent>,
    max_peers: usize,
    capacity: usize,
}

/// TCP implementation of [`Transport`].
pub struct TcpTransport {
    shared: Shared,
    local_addr: SocketAddr,
    listener: JoinHandle<()>,
}

impl TcpTransport {
    /// Bind the listener, dial the bootstrap peers and start delivering
    /// inbound events on the returned receiver.
    pub async fn start(
        config: TcpConfig,
        local: PeerId,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), NetworkError> {
        let (events, rx) = mpsc::channel(config.channel_capacity.max(1));
        let listener = TcpListener::bind(&config.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("P2P listening on {}", local_addr);

        let shared = Shared {
            local,
            peers: Arc::new(RwLock::new(HashMap::new())),
            events,
            max_peers: config.max_peers,
            capacity: config.channel_capacity.max(1),
        };

        let accept_shared = shared.clone();
        let listener = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let shared = accept_shared.clone();
                        tokio::spawn(async move {
                            if let Err(e) = shared.establish(stream, addr).await {
                                debug!("Inbound connection from {} failed: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => debug!("Accept error: {}", e),
                }
            }
        });

        let transport = Self {
            shared,
            local_addr,
            listener,
        };
        for address in &config.bootstrap_peers {
            if let Err(e) = transport.connect(address).await {
                warn!("Failed to connect to bootstrap peer {}: {}", address, e);
            }
        }
        Ok((transport, rx))
    }

    /// Dial a peer and complete the identity exchange.
    pub async fn connect(&self, address: &str) -> Result<PeerId, NetworkError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| NetworkError::ConnectionFailed(format!("{}: {}", address, e)))?;
        let addr = stream.peer_addr()?;
        self.shared.establish(stream, addr).await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn connected_peers(&self) -> Vec<(PeerId, SocketAddr)> {
        self.shared
            .peers
            .read()
            .iter()
            .map(|(peer, link)| (peer.clone(), link.address))
            .collect()
    }

    pub fn shutdown(&self) {
        self.listener.abort();
        let links: Vec<PeerLink> = self.shared.peers.write().drain().map(|(_, l)| l).collect();
        for link in links {
            link.reader.abort();
            link.writer.abort();
        }
        info!("Network node {} shutdown", self.shared.local);
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

impl Shared {
    async fn establish(&self, stream: TcpStream, address: SocketAddr) -> Result<PeerId, NetworkError> {
        if self.peers.read().len() >= self.max_peers {
            return Err(NetworkError::ConnectionFailed(format!(
                "peer limit of {} reached",
                self.max_peers
            )));
        }

        let (mut reader, mut writer) = stream.into_split();
        write_frame(&mut writer, &bincode::serialize(&self.local)?).await?;
        let hello = read_frame(&mut reader)
            .await?
            .ok_or_else(|| NetworkError::ConnectionFailed("closed during handshake".into()))?;
        let peer: PeerId = bincode::deserialize(&hello)?;
        if peer == self.local || peer.is_empty() {
            return Err(NetworkError::ConnectionFailed(format!(
                "bad peer identity {:?}",
                peer.as_str()
            )));
        }
        if self.peers.read().contains_key(&peer) {
            debug!(peer = %peer, "Already connected");
            return Ok(peer);
        }

        let (outbound, mut queue) = mpsc::channel::<Vec<u8>>(self.capacity);
        let writer_peer = peer.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = queue.recv().await {
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    debug!(peer = %writer_peer, "Write failed: {}", e);
                    break;
                }
            }
        });

        let shared = self.clone();
        let reader_peer = peer.clone();
        let reader = tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(frame)) => match Envelope::decode(&frame) {
                        Ok(envelope) if envelope.sender == reader_peer => {
                            if shared.events.send(TransportEvent::Message(envelope)).await.is_err() {
                                break;
                            }
                        }
                        Ok(envelope) => {
                            warn!(peer = %reader_peer, claimed = %envelope.sender, "Dropped spoofed envelope");
                        }
                        Err(e) => warn!(peer = %reader_peer, "Undecodable frame: {}", e),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        debug!(peer = %reader_peer, "Read failed: {}", e);
                        break;
                    }
                }
            }
            shared.disconnect(&reader_peer).await;
        });

        self.peers.write().insert(
            peer.clone(),
            PeerLink {
                address,
                outbound,
                reader,
                writer,
            },
        );
        let _ = self
            .events
            .send(TransportEvent::PeerConnected(peer.clone()))
            .await;
        info!(peer = %peer, "Peer connected from {}", address);
        Ok(peer)
    }

    async fn disconnect(&self, peer: &PeerId) {
        let link = self.peers.write().remove(peer);
        if let Some(link) = link {
            info!(peer = %peer, "Peer disconnected");
            // May run on the reader task itself, so the event goes out first.
            let _ = self
                .events
                .send(TransportEvent::PeerDisconnected(peer.clone()))
                .await;
            link.writer.abort();
            link.reader.abort();
        }
    }

    fn queue(&self, peer: &PeerId, frame: Vec<u8>) -> Result<(), NetworkError> {
        let peers = self.peers.read();
        let link = peers
            .get(peer)
            .ok_or_else(|| NetworkError::UnknownPeer(peer.clone()))?;
        link.outbound
            .try_send(frame)
            .map_err(|_| NetworkError::SendFailed(peer.clone()))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn local_peer(&self) -> &PeerId {
        &self.shared.local
    }

    async fn broadcast(&self, message: Message) -> Result<(), NetworkError> {
        let kind = message.kind();
        let frame = Envelope::new(self.shared.local.clone(), message).encode()?;
        let peers: Vec<PeerId> = self.shared.peers.read().keys().cloned().collect();
        for peer in &peers {
            if let Err(e) = self.shared.queue(peer, frame.clone()) {
                debug!(peer = %peer, "Broadcast skipped: {}", e);
            }
        }
        debug!(kind, peers = peers.len(), "Broadcast message");
        Ok(())
    }

    async fn send(&self, peer: &PeerId, message: Message) -> Result<(), NetworkError> {
        let frame = Envelope::new(self.shared.local.clone(), message).encode()?;
        self.shared.queue(peer, frame)
    }

    async fn report_unresponsive(&self, peer: &PeerId) {
        warn!(peer = %peer, "Disconnecting unresponsive peer");
        self.shared.disconnect(peer).await;
    }
}
