//! Socprod Node - The Social Production ledger node.
//!
//! Ties the chain, verification, sync and transport crates together into a
//! single [`LedgerNode`] that the binary, tests and simulations drive.

pub mod config;
pub mod error;
pub mod node;
pub mod telemetry;

pub use config::{LoggingConfig, NodeConfig, StorageConfig};
pub use error::NodeError;
pub use node::{unix_now, LedgerNode, NodeCommand, NodeHandle};
