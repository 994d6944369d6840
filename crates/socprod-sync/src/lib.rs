//! Socprod Sync - Chain synchronization for the Social Production ledger.
//!
//! Nodes choose how much finalized history to keep locally: everything,
//! only what they ask for, a time window, or a bounded number of the most
//! recent blocks. Headers are synced in every case.

pub mod config;
pub mod engine;
pub mod error;
pub mod state;

pub use config::{SyncConfig, SyncStrategy};
pub use engine::{BlockRequest, HeaderRequest, SyncEngine};
pub use error::SyncError;
pub use state::SyncState;
