//! Socprod Consensus - Block verification by distinct-peer vote counting.
//!
//! There is no stake, leader or signature: a candidate block is final once
//! a configurable number of distinct peers (three by default) have approved
//! it.

pub mod config;
pub mod error;
pub mod protocol;
pub mod validator;

pub use config::{NodeMode, VerificationConfig};
pub use error::ConsensusError;
pub use protocol::{VerificationProtocol, VoteOutcome};
pub use validator::{AcceptAll, TransactionValidator};
