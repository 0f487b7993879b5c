use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("key not found")]
    NotFound,
    #[error("failed to serialize value: {0}")]
    SerializationFailed(String),
    #[error("failed to deserialize value: {0}")]
    DeserializationFailed(String),
    #[error("database error: {0}")]
    DatabaseError(String),
}

/// Byte-level key-value store used to keep bot registration state across restarts.
pub trait KeyValueStorage: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn set_raw(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;
    fn flush(&self) -> Result<(), StorageError>;
}

/// Typed access on top of [`KeyValueStorage`], bincode-encoded.
pub trait KeyValueStorageExt: KeyValueStorage {
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError> {
        let bytes = self.get_raw(key)?.ok_or(StorageError::NotFound)?;
        bincode::deserialize(&bytes).map_err(|e| StorageError::DeserializationFailed(e.to_string()))
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let bytes =
            bincode::serialize(value).map_err(|e| StorageError::SerializationFailed(e.to_string()))?;
        self.set_raw(key, bytes)
    }
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorageExt for S {}
