//! Socprod Types - Core type definitions for the Social Production ledger.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - Hashes (32-byte, blake3 digests) and peer identities
//! - Transactions with typed, kind-specific payloads
//! - Blocks and block headers
//! - Verification votes and ledger events

pub mod block;
pub mod error;
pub mod event;
pub mod hash;
pub mod peer;
pub mod transaction;
pub mod vote;

pub use block::{Block, BlockHeader, BLOCK_OVERHEAD_BYTES, GENESIS_PROPOSER};
pub use error::TypesError;
pub use event::{DiscardReason, LedgerEvent, SyncProgress};
pub use hash::Hash;
pub use peer::PeerId;
pub use transaction::{
    ContentAction, EventAction, FundingAction, MembershipAction, ProjectAction, ProjectStatus,
    RsvpStatus, Transaction, TransactionKind, VoteChoice, MAX_ID_LEN, MAX_TEXT_LEN,
};
pub use vote::VerificationVote;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Block, BlockHeader, Hash, LedgerEvent, PeerId, Transaction, TransactionKind, TypesError,
        VerificationVote,
    };
}
