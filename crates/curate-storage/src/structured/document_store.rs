//! Persistent document store on redb
//!
//! All collections share one table. Keys are `<collection>\0<id>`, values the
//! record's field map encoded as JSON, so a record written by one version can
//! be read by any other without a schema migration.

use std::sync::Arc;

use async_trait::async_trait;
use curate_core::{
    Clock, ContentType, Document, DocumentStore, Fields, Snapshot, SnapshotStream, SortPolicy,
    StoreError, SystemClock,
};
use tracing::{debug, instrument, trace};

use super::tables::{DOCUMENTS, RedbStorage, RedbStorageConfig};
use crate::error::StorageError;
use crate::hub::{ChangeNotifier, DEFAULT_FEED_CAPACITY, SnapshotSource, spawn_feed};
use crate::record::{merge_update, new_id, stamp_created};

/// Configuration for [`RedbDocumentStore`]
#[derive(Debug, Clone, Default)]
pub struct RedbDocumentStoreConfig {
    pub storage: RedbStorageConfig,
    /// Buffered snapshots per subscription
    pub feed_capacity: Option<usize>,
}

impl RedbDocumentStoreConfig {
    pub fn with_db_path(mut self, db_path: impl Into<std::path::PathBuf>) -> Self {
        self.storage.db_path = db_path.into();
        self
    }

    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = Some(capacity);
        self
    }
}

fn collection_prefix(collection: ContentType) -> Vec<u8> {
    let mut prefix = collection.collection().as_bytes().to_vec();
    prefix.push(0);
    prefix
}

fn record_key(collection: ContentType, id: &str) -> Vec<u8> {
    let mut key = collection_prefix(collection);
    key.extend_from_slice(id.as_bytes());
    key
}

fn encode(fields: &Fields) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(fields).map_err(|e| StorageError::serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Fields, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::deserialization(e.to_string()))
}

struct RedbInner {
    storage: RedbStorage,
    clock: Arc<dyn Clock>,
    notifier: ChangeNotifier,
}

impl RedbInner {
    fn load(&self, collection: ContentType) -> Result<Vec<Document>, StorageError> {
        let prefix = collection_prefix(collection);
        self.storage
            .scan_prefix(DOCUMENTS, &prefix)?
            .into_iter()
            .map(|(key, value)| {
                let id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
                Ok(Document::new(id, decode(&value)?))
            })
            .collect()
    }
}

impl SnapshotSource for RedbInner {
    fn snapshot(
        &self,
        collection: ContentType,
        sort: SortPolicy,
    ) -> Result<Snapshot, StorageError> {
        let mut documents = self.load(collection)?;
        sort.sort(&mut documents);
        Ok(Snapshot::new(collection, documents))
    }
}

/// [`DocumentStore`] persisted in a redb database file
#[derive(Clone)]
pub struct RedbDocumentStore {
    inner: Arc<RedbInner>,
    feed_capacity: usize,
}

impl RedbDocumentStore {
    /// Open or create the database on the system clock
    pub fn open(config: RedbDocumentStoreConfig) -> Result<Self, StorageError> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        config: RedbDocumentStoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let storage = RedbStorage::open(config.storage)?;
        Ok(Self {
            inner: Arc::new(RedbInner {
                storage,
                clock,
                notifier: ChangeNotifier::new(),
            }),
            feed_capacity: config.feed_capacity.unwrap_or(DEFAULT_FEED_CAPACITY),
        })
    }

    /// Number of records in a collection
    pub fn count(&self, collection: ContentType) -> Result<usize, StorageError> {
        self.inner
            .storage
            .count_prefix(DOCUMENTS, &collection_prefix(collection))
    }
}

impl std::fmt::Debug for RedbDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbDocumentStore")
            .field("db_path", &self.inner.storage.config().db_path)
            .finish()
    }
}

#[async_trait]
impl DocumentStore for RedbDocumentStore {
    #[instrument(skip(self, fields), fields(content_type = %collection))]
    async fn create(&self, collection: ContentType, fields: Fields) -> Result<String, StoreError> {
        let id = new_id();
        let fields = stamp_created(fields, self.inner.clock.now_utc());

        self.inner
            .storage
            .put(DOCUMENTS, &record_key(collection, &id), &encode(&fields)?)?;
        self.inner.notifier.notify(collection);

        debug!(id = %id, "Created record");
        Ok(id)
    }

    #[instrument(skip(self, fields), fields(content_type = %collection))]
    async fn update(
        &self,
        collection: ContentType,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let now = self.inner.clock.now_utc();
        let found = self
            .inner
            .storage
            .modify(DOCUMENTS, &record_key(collection, id), |current| {
                let mut existing = decode(current)?;
                merge_update(&mut existing, fields, now);
                encode(&existing)
            })?;

        if !found {
            return Err(StoreError::not_found(collection.collection(), id));
        }
        self.inner.notifier.notify(collection);

        debug!("Updated record");
        Ok(())
    }

    #[instrument(skip(self), fields(content_type = %collection))]
    async fn delete(&self, collection: ContentType, id: &str) -> Result<(), StoreError> {
        if !self
            .inner
            .storage
            .delete(DOCUMENTS, &record_key(collection, id))?
        {
            return Err(StoreError::not_found(collection.collection(), id));
        }
        self.inner.notifier.notify(collection);

        debug!("Deleted record");
        Ok(())
    }

    async fn get(&self, collection: ContentType, id: &str) -> Result<Option<Document>, StoreError> {
        let Some(bytes) = self
            .inner
            .storage
            .get(DOCUMENTS, &record_key(collection, id))?
        else {
            return Ok(None);
        };
        Ok(Some(Document::new(id, decode(&bytes)?)))
    }

    async fn list(
        &self,
        collection: ContentType,
        sort: SortPolicy,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self.inner.snapshot(collection, sort)?.documents)
    }

    async fn subscribe(
        &self,
        collection: ContentType,
        sort: SortPolicy,
    ) -> Result<SnapshotStream, StoreError> {
        trace!(content_type = %collection, ?sort, "Opening subscription");
        let changes = self.inner.notifier.watch(collection);
        Ok(spawn_feed(
            self.inner.clone(),
            changes,
            collection,
            sort,
            self.feed_capacity,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn open(temp: &TempDir) -> RedbDocumentStore {
        RedbDocumentStore::open(
            RedbDocumentStoreConfig::default().with_db_path(temp.path().join("docs.redb")),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let id = store
            .create(ContentType::Greetings, fields(json!({"name": "Bo", "message": "hi"})))
            .await
            .unwrap();

        let doc = store.get(ContentType::Greetings, &id).await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.get("message"), Some(&json!("hi")));
        assert!(doc.created_at().is_some());

        assert!(store.get(ContentType::Reels, &id).await.unwrap().is_none());
        assert_eq!(store.count(ContentType::Greetings).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_and_missing_errors() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let id = store
            .create(ContentType::Reels, fields(json!({"name": "A", "order": 2})))
            .await
            .unwrap();
        store
            .update(ContentType::Reels, &id, fields(json!({"name": "B"})))
            .await
            .unwrap();

        let doc = store.get(ContentType::Reels, &id).await.unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&json!("B")));
        assert_eq!(doc.order(), Some(2));
        assert!(doc.updated_at().is_some());

        let err = store
            .update(ContentType::Reels, "missing", Fields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let id = store
            .create(ContentType::Screenshots, fields(json!({"name": "s"})))
            .await
            .unwrap();
        store.delete(ContentType::Screenshots, &id).await.unwrap();
        assert!(store.get(ContentType::Screenshots, &id).await.unwrap().is_none());

        let err = store.delete(ContentType::Screenshots, &id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let id = {
            let store = open(&temp);
            store
                .create(ContentType::Reels, fields(json!({"name": "kept"})))
                .await
                .unwrap()
        };

        let store = open(&temp);
        let docs = store.list(ContentType::Reels, SortPolicy::OrderAsc).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
    }

    #[tokio::test]
    async fn test_subscription_follows_order() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let mut stream = store
            .subscribe(ContentType::Reels, SortPolicy::OrderAsc)
            .await
            .unwrap();
        assert!(stream.recv().await.unwrap().unwrap().is_empty());

        store
            .create(ContentType::Reels, fields(json!({"name": "late", "order": 5})))
            .await
            .unwrap();
        let _ = stream.recv().await.unwrap().unwrap();

        store
            .create(ContentType::Reels, fields(json!({"name": "early", "order": 1})))
            .await
            .unwrap();
        let snapshot = stream.recv().await.unwrap().unwrap();
        let names: Vec<_> = snapshot
            .documents
            .iter()
            .map(|d| d.get("name").cloned().unwrap_or(Value::Null))
            .collect();
        assert_eq!(names, vec![json!("early"), json!("late")]);
    }
}
