//! Socprod Crypto - Hashing and Merkle storage for the Social Production ledger.
//!
//! This crate provides:
//! - Blake3 hashing helpers
//! - The per-block Merkle store with inclusion proofs

pub mod error;
pub mod hash;
pub mod merkle;

pub use error::MerkleError;
pub use hash::{hash, hash_multi, hash_pair};
pub use merkle::{verify, MerkleProof, MerkleStore};
