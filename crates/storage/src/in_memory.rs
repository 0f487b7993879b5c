use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use crate::storage_trait::{KeyValueStorage, StorageError};

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for InMemoryStorage {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyValueStorageExt;

    #[test]
    fn test_typed_set_and_get() {
        let storage = InMemoryStorage::new();
        storage.set("numbers", &vec![1u64, 2, 3]).unwrap();

        let numbers: Vec<u64> = storage.get("numbers").unwrap();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_key() {
        let storage = InMemoryStorage::new();
        assert!(storage.get_raw("absent").unwrap().is_none());
        assert!(matches!(
            storage.get::<Vec<u64>>("absent"),
            Err(StorageError::NotFound)
        ));
    }

    #[test]
    fn test_undecodable_value() {
        let storage = InMemoryStorage::new();
        storage.set_raw("garbage", vec![0xff]).unwrap();
        assert!(matches!(
            storage.get::<Vec<String>>("garbage"),
            Err(StorageError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_set_overwrites() {
        let storage = InMemoryStorage::new();
        storage.set("key", &"old".to_string()).unwrap();
        storage.set("key", &"new".to_string()).unwrap();
        let value: String = storage.get("key").unwrap();
        assert_eq!(value, "new");
    }
}
