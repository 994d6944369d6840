//! Block database for finalized headers, bodies and the canonical index.

use crate::db::{ColumnFamily, KeyValueStore, WriteBatch};
use crate::error::StorageError;
use crate::memory::MemoryDatabase;
use borsh::{BorshDeserialize, BorshSerialize};
use socprod_types::{Block, BlockHeader, Hash, Transaction};
use std::sync::Arc;

const CHAIN_HEAD_KEY: &[u8] = b"chain_head";

fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

fn encode<T: BorshSerialize + ?Sized>(value: &T) -> Result<Vec<u8>, StorageError> {
    borsh::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: BorshDeserialize>(column: &'static str, data: &[u8]) -> Result<T, StorageError> {
    T::try_from_slice(data).map_err(|e| StorageError::Corrupt {
        column,
        reason: e.to_string(),
    })
}

/// A set of chain writes committed atomically by [`BlockDB::commit`].
#[derive(Default)]
pub struct ChainWrite {
    batch: WriteBatch,
}

impl ChainWrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a finalized header.
    pub fn header(&mut self, hash: &Hash, header: &BlockHeader) -> Result<&mut Self, StorageError> {
        self.batch
            .put(ColumnFamily::Headers, hash.as_bytes(), &encode(header)?);
        Ok(self)
    }

    /// Store a block body together with its Merkle leaves.
    pub fn body(
        &mut self,
        hash: &Hash,
        transactions: &[Transaction],
        leaves: &[Hash],
    ) -> Result<&mut Self, StorageError> {
        self.batch.put(
            ColumnFamily::Bodies,
            hash.as_bytes(),
            &encode(transactions)?,
        );
        self.batch
            .put(ColumnFamily::Merkle, hash.as_bytes(), &encode(leaves)?);
        Ok(self)
    }

    /// Point the canonical index at `hash` for `height`.
    pub fn canonical(&mut self, height: u64, hash: &Hash) -> &mut Self {
        self.batch.put(
            ColumnFamily::CanonicalIndex,
            &height_key(height),
            hash.as_bytes(),
        );
        self
    }

    /// Remove `height` from the canonical index.
    pub fn uncanonical(&mut self, height: u64) -> &mut Self {
        self.batch
            .delete(ColumnFamily::CanonicalIndex, &height_key(height));
        self
    }

    pub fn head(&mut self, hash: &Hash) -> &mut Self {
        self.batch
            .put(ColumnFamily::Metadata, CHAIN_HEAD_KEY, hash.as_bytes());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}

/// Block storage with a height index.
#[derive(Clone)]
pub struct BlockDB {
    db: Arc<dyn KeyValueStore>,
}

impl BlockDB {
    pub fn new(db: Arc<dyn KeyValueStore>) -> Self {
        Self { db }
    }

    /// Block storage that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDatabase::new()))
    }

    /// Apply a set of chain writes atomically.
    pub fn commit(&self, write: ChainWrite) -> Result<(), StorageError> {
        self.db.write_batch(write.batch)
    }

    pub fn get_header(&self, hash: &Hash) -> Result<Option<BlockHeader>, StorageError> {
        self.db
            .get(ColumnFamily::Headers, hash.as_bytes())?
            .map(|data| decode("headers", &data))
            .transpose()
    }

    pub fn has_header(&self, hash: &Hash) -> Result<bool, StorageError> {
        self.db.contains(ColumnFamily::Headers, hash.as_bytes())
    }

    pub fn get_body(&self, hash: &Hash) -> Result<Option<Vec<Transaction>>, StorageError> {
        self.db
            .get(ColumnFamily::Bodies, hash.as_bytes())?
            .map(|data| decode("bodies", &data))
            .transpose()
    }

    pub fn has_body(&self, hash: &Hash) -> Result<bool, StorageError> {
        self.db.contains(ColumnFamily::Bodies, hash.as_bytes())
    }

    pub fn get_merkle_leaves(&self, hash: &Hash) -> Result<Option<Vec<Hash>>, StorageError> {
        self.db
            .get(ColumnFamily::Merkle, hash.as_bytes())?
            .map(|data| decode("merkle", &data))
            .transpose()
    }

    /// Get a full block. `None` if either the header or the body is absent.
    pub fn get_block(&self, hash: &Hash) -> Result<Option<Block>, StorageError> {
        let header = match self.get_header(hash)? {
            Some(header) => header,
            None => return Ok(None),
        };
        let transactions = match self.get_body(hash)? {
            Some(txs) => txs,
            None => return Ok(None),
        };
        Ok(Some(Block {
            header,
            hash: *hash,
            transactions,
        }))
    }

    pub fn get_canonical_hash(&self, height: u64) -> Result<Option<Hash>, StorageError> {
        self.db
            .get(ColumnFamily::CanonicalIndex, &height_key(height))?
            .map(|data| Hash::from_slice(&data).map_err(StorageError::from))
            .transpose()
    }

    /// Canonical hashes from height 0 upward, stopping at the first gap.
    pub fn canonical_hashes(&self) -> Result<Vec<Hash>, StorageError> {
        let mut hashes = Vec::new();
        while let Some(hash) = self.get_canonical_hash(hashes.len() as u64)? {
            hashes.push(hash);
        }
        Ok(hashes)
    }

    pub fn get_chain_head(&self) -> Result<Option<Hash>, StorageError> {
        self.db
            .get(ColumnFamily::Metadata, CHAIN_HEAD_KEY)?
            .map(|data| Hash::from_slice(&data).map_err(StorageError::from))
            .transpose()
    }
}
