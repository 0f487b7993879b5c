use crate::storage_trait::{KeyValueStorage, StorageError};
use rocksdb_rs::{Options, DB};
use std::path::Path;
use std::sync::Arc;

pub struct RocksDBStorage {
    db: Arc<DB>,
}

impl RocksDBStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path).map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KeyValueStorage for RocksDBStorage {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn set_raw(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.db
            .put(key.as_bytes(), value)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }
}
