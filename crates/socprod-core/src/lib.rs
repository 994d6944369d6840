//! Socprod Core - Chain management for the Social Production ledger.

pub mod chain;
pub mod config;
pub mod error;
pub mod fork;
pub mod orphan;
pub mod txpool;
pub mod validation;

pub use chain::{BlockStatus, CandidateOutcome, ChainManager, FinalizeOutcome, ImportOutcome};
pub use config::ChainConfig;
pub use error::{CoreError, Malformed};
pub use fork::{ForkChoice, Tip};
pub use orphan::OrphanPool;
pub use txpool::{PoolStatus, TransactionPool};
pub use validation::{validate_block, validate_body};
