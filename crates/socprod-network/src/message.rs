//! Wire messages and framing.
//!
//! Every message travels inside an [`Envelope`] naming its sender. On
//! stream transports each envelope is one frame: a big-endian `u32` length
//! followed by the bincode encoding.

use crate::error::NetworkError;
use serde::{Deserialize, Serialize};
use socprod_types::{Block, BlockHeader, Hash, PeerId, Transaction, VerificationVote};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Sync request for finalized history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchRequest {
    /// Canonical headers in `from_height..=to_height`
    Headers { from_height: u64, to_height: u64 },
    /// Full blocks by hash
    Blocks { request_id: u64, hashes: Vec<Hash> },
}

/// Answer to a [`FetchRequest`]. Items the responder does not hold are
/// left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchResponse {
    Headers(Vec<BlockHeader>),
    Blocks { request_id: u64, blocks: Vec<Block> },
}

/// P2P message types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// A transaction submitted somewhere in the network
    TransactionAnnounce(Transaction),
    /// A proposed block awaiting verification
    BlockCandidate(Block),
    /// A peer approves a candidate
    BlockVote(VerificationVote),
    /// The sender's canonical head
    ChainHeadAnnounce { height: u64, hash: Hash },
    BlockFetchRequest(FetchRequest),
    BlockFetchResponse(FetchResponse),
}

impl Message {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::TransactionAnnounce(_) => "transaction_announce",
            Message::BlockCandidate(_) => "block_candidate",
            Message::BlockVote(_) => "block_vote",
            Message::ChainHeadAnnounce { .. } => "chain_head_announce",
            Message::BlockFetchRequest(_) => "block_fetch_request",
            Message::BlockFetchResponse(_) => "block_fetch_response",
        }
    }
}

/// A message together with the identity of the peer that sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: PeerId,
    pub message: Message,
}

impl Envelope {
    pub fn new(sender: PeerId, message: Message) -> Self {
        Self { sender, message }
    }

    pub fn encode(&self) -> Result<Vec<u8>, NetworkError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self, NetworkError> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Write one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), NetworkError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame. `Ok(None)` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, NetworkError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}
