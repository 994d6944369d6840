use crate::error::StorageError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const DATA_FILE: &str = "ledger.json";

/// Column families for organized data storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnFamily {
    /// Block headers: block_hash → BlockHeader
    Headers,
    /// Block bodies: block_hash → Vec<Transaction>
    Bodies,
    /// Merkle leaves: block_hash → Vec<Hash>
    Merkle,
    /// Canonical index: height → block_hash
    CanonicalIndex,
    /// Metadata: key → value (chain head)
    Metadata,
}

impl ColumnFamily {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnFamily::Headers => "headers",
            ColumnFamily::Bodies => "bodies",
            ColumnFamily::Merkle => "merkle",
            ColumnFamily::CanonicalIndex => "canonical_index",
            ColumnFamily::Metadata => "metadata",
        }
    }

    pub fn all() -> [ColumnFamily; 5] {
        [
            ColumnFamily::Headers,
            ColumnFamily::Bodies,
            ColumnFamily::Merkle,
            ColumnFamily::CanonicalIndex,
            ColumnFamily::Metadata,
        ]
    }
}

/// A single write inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put {
        cf: ColumnFamily,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        cf: ColumnFamily,
        key: Vec<u8>,
    },
}

/// Write batch for atomic operations.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a value into the batch.
    pub fn put(&mut self, cf: ColumnFamily, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Put {
            cf,
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    /// Delete a value in the batch.
    pub fn delete(&mut self, cf: ColumnFamily, key: &[u8]) {
        self.ops.push(BatchOp::Delete {
            cf,
            key: key.to_vec(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Column-family key-value store.
///
/// `write_batch` must apply all operations or none of them.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError>;

    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.put(cf, key, value);
        self.write_batch(batch)
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.delete(cf, key);
        self.write_batch(batch)
    }

    fn contains(&self, cf: ColumnFamily, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.get(cf, key)?.is_some())
    }
}

/// On-disk layout: column name → hex key → hex value.
type Columns = BTreeMap<String, BTreeMap<String, String>>;

/// File-backed database. The whole keyspace is held in memory and written
/// out as one JSON document after every batch; the write goes to a temporary
/// file that is renamed over the previous one, so a crash leaves either the
/// old or the new state on disk.
pub struct Database {
    path: PathBuf,
    data: RwLock<Columns>,
}

impl Database {
    /// Open a database at the given directory, loading existing data.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(path)?;

        let data_file = path.join(DATA_FILE);
        let data: Columns = if data_file.exists() {
            let content = fs::read_to_string(&data_file)?;
            serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
                column: "*",
                reason: e.to_string(),
            })?
        } else {
            Columns::new()
        };

        tracing::debug!(
            path = %path.display(),
            columns = data.len(),
            "Opened ledger database"
        );

        Ok(Self {
            path: path.to_path_buf(),
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &Columns) -> Result<(), StorageError> {
        let content = serde_json::to_string(data)?;
        let tmp = self.path.join(format!("{}.tmp", DATA_FILE));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, self.path.join(DATA_FILE))?;
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read();
        match data.get(cf.name()).and_then(|col| col.get(&hex::encode(key))) {
            Some(value) => hex::decode(value)
                .map(Some)
                .map_err(|e| StorageError::Corrupt {
                    column: cf.name(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut data = self.data.write();
        let mut next = data.clone();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { cf, key, value } => {
                    next.entry(cf.name().to_string())
                        .or_default()
                        .insert(hex::encode(key), hex::encode(value));
                }
                BatchOp::Delete { cf, key } => {
                    if let Some(col) = next.get_mut(cf.name()) {
                        col.remove(&hex::encode(key));
                    }
                }
            }
        }

        // Only swap in the new state once it is on disk.
        self.persist(&next)?;
        *data = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_database_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path()).unwrap();

        db.put(ColumnFamily::Headers, b"key", b"value").unwrap();
        assert_eq!(
            db.get(ColumnFamily::Headers, b"key").unwrap(),
            Some(b"value".to_vec())
        );
        assert_eq!(db.get(ColumnFamily::Headers, b"missing").unwrap(), None);
    }

    #[test]
    fn test_database_columns_are_separate() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path()).unwrap();

        db.put(ColumnFamily::Headers, b"key", b"header").unwrap();
        db.put(ColumnFamily::Bodies, b"key", b"body").unwrap();

        assert_eq!(
            db.get(ColumnFamily::Headers, b"key").unwrap(),
            Some(b"header".to_vec())
        );
        assert_eq!(
            db.get(ColumnFamily::Bodies, b"key").unwrap(),
            Some(b"body".to_vec())
        );
        assert_eq!(db.get(ColumnFamily::Merkle, b"key").unwrap(), None);
    }

    #[test]
    fn test_database_delete() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path()).unwrap();

        db.put(ColumnFamily::Metadata, b"head", b"x").unwrap();
        assert!(db.contains(ColumnFamily::Metadata, b"head").unwrap());
        db.delete(ColumnFamily::Metadata, b"head").unwrap();
        assert!(!db.contains(ColumnFamily::Metadata, b"head").unwrap());
    }

    #[test]
    fn test_database_persistence() {
        let temp_dir = TempDir::new().unwrap();
        {
            let db = Database::open(temp_dir.path()).unwrap();
            let mut batch = WriteBatch::new();
            batch.put(ColumnFamily::CanonicalIndex, &1u64.to_be_bytes(), b"a");
            batch.put(ColumnFamily::CanonicalIndex, &2u64.to_be_bytes(), b"b");
            db.write_batch(batch).unwrap();
        }

        let db = Database::open(temp_dir.path()).unwrap();
        assert_eq!(
            db.get(ColumnFamily::CanonicalIndex, &2u64.to_be_bytes())
                .unwrap(),
            Some(b"b".to_vec())
        );
    }

    #[test]
    fn test_batch_applies_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path()).unwrap();

        let mut batch = WriteBatch::new();
        batch.put(ColumnFamily::Metadata, b"k", b"first");
        batch.delete(ColumnFamily::Metadata, b"k");
        batch.put(ColumnFamily::Metadata, b"k", b"second");
        assert_eq!(batch.len(), 3);
        db.write_batch(batch).unwrap();

        assert_eq!(
            db.get(ColumnFamily::Metadata, b"k").unwrap(),
            Some(b"second".to_vec())
        );
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(DATA_FILE), "not json").unwrap();
        assert!(matches!(
            Database::open(temp_dir.path()),
            Err(StorageError::Corrupt { .. })
        ));
    }
}
