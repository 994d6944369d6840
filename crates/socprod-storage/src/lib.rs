//! Socprod Storage - Persistent storage for finalized blocks.
//!
//! Two backends implement [`KeyValueStore`]: a file-backed [`Database`] for
//! long-running nodes and a [`MemoryDatabase`] for tests and ephemeral nodes.
//! [`BlockDB`] layers block headers, bodies, Merkle leaves and the canonical
//! height index on top of either.

pub mod block_db;
pub mod db;
pub mod error;
pub mod memory;

pub use block_db::{BlockDB, ChainWrite};
pub use db::{BatchOp, ColumnFamily, Database, KeyValueStore, WriteBatch};
pub use error::StorageError;
pub use memory::MemoryDatabase;
