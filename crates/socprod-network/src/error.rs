use socprod_types::PeerId;
use thiserror::Error;

/// Network error
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec: {0}")]
    Codec(String),

    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Connection: {0}")]
    ConnectionFailed(String),

    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("Send to {0} failed")]
    SendFailed(PeerId),
}

impl From<bincode::Error> for NetworkError {
    fn from(e: bincode::Error) -> Self {
        NetworkError::Codec(e.to_string())
    }
}
