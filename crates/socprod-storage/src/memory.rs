use crate::db::{BatchOp, ColumnFamily, KeyValueStore, WriteBatch};
use crate::error::StorageError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory key-value store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryDatabase {
    data: RwLock<HashMap<(ColumnFamily, Vec<u8>), Vec<u8>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across all column families.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for MemoryDatabase {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.read().get(&(cf, key.to_vec())).cloned())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut data = self.data.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { cf, key, value } => {
                    data.insert((cf, key), value);
                }
                BatchOp::Delete { cf, key } => {
                    data.remove(&(cf, key));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_put_get_delete() {
        let db = MemoryDatabase::new();
        assert!(db.is_empty());

        db.put(ColumnFamily::Bodies, b"k", b"v").unwrap();
        assert_eq!(db.get(ColumnFamily::Bodies, b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(db.get(ColumnFamily::Headers, b"k").unwrap(), None);
        assert_eq!(db.len(), 1);

        db.delete(ColumnFamily::Bodies, b"k").unwrap();
        assert!(db.is_empty());
    }
}
