//! redb table definitions and storage manager

use std::path::PathBuf;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, info, instrument};

use crate::error::StorageError;

/// Type alias for scan results to simplify complex type
pub type ScanResults = Vec<(Vec<u8>, Vec<u8>)>;

// Key: "<collection>\0<id>", Value: JSON field map
pub const DOCUMENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("documents");

/// Configuration for redb storage
#[derive(Debug, Clone)]
pub struct RedbStorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/curate.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl RedbStorageConfig {
    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn with_cache_size(mut self, bytes: usize) -> Self {
        self.cache_size = bytes;
        self
    }
}

/// Main redb storage manager
pub struct RedbStorage {
    db: Arc<Database>,
    config: RedbStorageConfig,
}

impl RedbStorage {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStorageConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::builder()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)
            .map_err(StorageError::database)?;

        info!("Opened redb database");

        let storage = Self {
            db: Arc::new(db),
            config,
        };
        storage.init_tables()?;

        Ok(storage)
    }

    /// Create tables if they don't exist
    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;
        write_txn
            .open_table(DOCUMENTS)
            .map_err(StorageError::database)?;
        write_txn.commit().map_err(StorageError::database)?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStorageConfig {
        &self.config
    }

    /// Put a key-value pair in a table
    pub fn put(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
        value: &[u8],
    ) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;
        {
            let mut table = write_txn.open_table(table).map_err(StorageError::database)?;
            table.insert(key, value).map_err(StorageError::database)?;
        }
        write_txn.commit().map_err(StorageError::database)?;
        Ok(())
    }

    /// Get a value from a table
    pub fn get(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let read_txn = self.db.begin_read().map_err(StorageError::database)?;
        let table = read_txn.open_table(table).map_err(StorageError::database)?;

        let value = table
            .get(key)
            .map_err(StorageError::database)?
            .map(|v| v.value().to_vec());

        Ok(value)
    }

    /// Read-modify-write of one key inside a single write transaction.
    ///
    /// `f` sees the current value and returns the replacement. Returns
    /// `false` without writing when the key is absent.
    pub fn modify<F>(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
        f: F,
    ) -> Result<bool, StorageError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, StorageError>,
    {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;
        let found = {
            let mut table = write_txn.open_table(table).map_err(StorageError::database)?;
            let current = table
                .get(key)
                .map_err(StorageError::database)?
                .map(|v| v.value().to_vec());
            match current {
                Some(current) => {
                    let next = f(&current)?;
                    table
                        .insert(key, next.as_slice())
                        .map_err(StorageError::database)?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit().map_err(StorageError::database)?;
        Ok(found)
    }

    /// Delete a key from a table
    pub fn delete(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        key: &[u8],
    ) -> Result<bool, StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;
        let removed = {
            let mut table = write_txn.open_table(table).map_err(StorageError::database)?;
            table.remove(key).map_err(StorageError::database)?.is_some()
        };
        write_txn.commit().map_err(StorageError::database)?;
        Ok(removed)
    }

    /// Iterate over all entries in a table with a prefix
    pub fn scan_prefix(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        prefix: &[u8],
    ) -> Result<ScanResults, StorageError> {
        let read_txn = self.db.begin_read().map_err(StorageError::database)?;
        let table = read_txn.open_table(table).map_err(StorageError::database)?;

        let mut results = Vec::new();

        // Use range to get all keys >= prefix
        let range = table.range(prefix..).map_err(StorageError::database)?;

        for entry in range {
            let (key, value) = entry.map_err(StorageError::database)?;
            let key_bytes = key.value();

            // Stop when we're past the prefix
            if !key_bytes.starts_with(prefix) {
                break;
            }

            results.push((key_bytes.to_vec(), value.value().to_vec()));
        }

        Ok(results)
    }

    /// Count entries with a prefix
    pub fn count_prefix(
        &self,
        table: TableDefinition<&[u8], &[u8]>,
        prefix: &[u8],
    ) -> Result<usize, StorageError> {
        self.scan_prefix(table, prefix).map(|v| v.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (RedbStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbStorageConfig::default().with_db_path(temp_dir.path().join("test.redb"));
        let storage = RedbStorage::open(config).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_put_get_delete() {
        let (storage, _temp) = create_test_storage();

        storage.put(DOCUMENTS, b"key", b"value").unwrap();
        assert_eq!(storage.get(DOCUMENTS, b"key").unwrap(), Some(b"value".to_vec()));

        assert!(storage.delete(DOCUMENTS, b"key").unwrap());
        assert!(!storage.delete(DOCUMENTS, b"key").unwrap());
        assert!(storage.get(DOCUMENTS, b"key").unwrap().is_none());
    }

    #[test]
    fn test_modify() {
        let (storage, _temp) = create_test_storage();

        assert!(!storage.modify(DOCUMENTS, b"absent", |v| Ok(v.to_vec())).unwrap());
        assert!(storage.get(DOCUMENTS, b"absent").unwrap().is_none());

        storage.put(DOCUMENTS, b"n", b"1").unwrap();
        let updated = storage
            .modify(DOCUMENTS, b"n", |v| {
                let mut next = v.to_vec();
                next.push(b'2');
                Ok(next)
            })
            .unwrap();
        assert!(updated);
        assert_eq!(storage.get(DOCUMENTS, b"n").unwrap(), Some(b"12".to_vec()));
    }

    #[test]
    fn test_modify_error_aborts() {
        let (storage, _temp) = create_test_storage();
        storage.put(DOCUMENTS, b"k", b"old").unwrap();

        let result = storage.modify(DOCUMENTS, b"k", |_| Err(StorageError::serialization("bad")));
        assert!(result.is_err());
        assert_eq!(storage.get(DOCUMENTS, b"k").unwrap(), Some(b"old".to_vec()));
    }

    #[test]
    fn test_scan_prefix() {
        let (storage, _temp) = create_test_storage();

        storage.put(DOCUMENTS, b"Reels\0a", b"1").unwrap();
        storage.put(DOCUMENTS, b"Reels\0b", b"2").unwrap();
        storage.put(DOCUMENTS, b"Greetings\0c", b"3").unwrap();

        assert_eq!(storage.scan_prefix(DOCUMENTS, b"Reels\0").unwrap().len(), 2);
        assert_eq!(storage.count_prefix(DOCUMENTS, b"Greetings\0").unwrap(), 1);
        assert_eq!(storage.count_prefix(DOCUMENTS, b"Screenshots\0").unwrap(), 0);
    }
}
