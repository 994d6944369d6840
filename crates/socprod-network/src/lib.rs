//! Socprod Network - Wire messages and transports.
//!
//! The ledger only needs three things from the network: fan-out to the peer
//! set, a directed send and a stream of inbound events. [`Transport`] is
//! that seam; [`MemoryTransport`] wires nodes together in-process and
//! [`TcpTransport`] connects them over plain TCP.

pub mod error;
pub mod memory;
pub mod message;
pub mod tcp;
pub mod transport;

pub use error::NetworkError;
pub use memory::{MemoryHub, MemoryTransport};
pub use message::{Envelope, FetchRequest, FetchResponse, Message, MAX_FRAME_SIZE};
pub use tcp::{TcpConfig, TcpTransport};
pub use transport::{Transport, TransportEvent};
