//! In-memory storage implementations
//!
//! Document and blob stores backed by `DashMap`, suitable for tests, local
//! demos and the server's `memory` backend. Nothing survives a restart.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use curate_core::{
    BlobError, BlobRef, BlobStore, Clock, ContentType, Document, DocumentStore, Fields, Snapshot,
    SnapshotStream, SortPolicy, StoreError, SystemClock,
};
use dashmap::DashMap;
use tracing::{debug, instrument, trace};

use crate::blobs::{ContentRef, validate_blob_path};
use crate::error::StorageError;
use crate::hub::{ChangeNotifier, DEFAULT_FEED_CAPACITY, SnapshotSource, spawn_feed};
use crate::record::{merge_update, new_id, stamp_created};

struct MemoryInner {
    /// Records per collection, in insertion order
    collections: DashMap<ContentType, Vec<Document>>,
    clock: Arc<dyn Clock>,
    notifier: ChangeNotifier,
}

impl SnapshotSource for MemoryInner {
    fn snapshot(
        &self,
        collection: ContentType,
        sort: SortPolicy,
    ) -> Result<Snapshot, StorageError> {
        let mut documents = self
            .collections
            .get(&collection)
            .map(|docs| docs.clone())
            .unwrap_or_default();
        sort.sort(&mut documents);
        Ok(Snapshot::new(collection, documents))
    }
}

/// In-memory implementation of [`DocumentStore`]
///
/// Cloning yields another handle onto the same collections.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    inner: Arc<MemoryInner>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Create an empty store on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping records from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let collections = DashMap::new();
        for content_type in ContentType::ALL {
            collections.insert(content_type, Vec::new());
        }
        Self {
            inner: Arc::new(MemoryInner {
                collections,
                clock,
                notifier: ChangeNotifier::new(),
            }),
        }
    }

    /// Insert a document verbatim, bypassing timestamp stamping.
    ///
    /// Lets tests and imports seed records with arbitrary shapes.
    pub fn insert_raw(&self, collection: ContentType, document: Document) {
        self.inner
            .collections
            .entry(collection)
            .or_default()
            .push(document);
        self.inner.notifier.notify(collection);
    }

    /// Number of records in a collection
    pub fn len(&self, collection: ContentType) -> usize {
        self.inner
            .collections
            .get(&collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.collections.iter().all(|docs| docs.is_empty())
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("collections", &self.inner.collections.len())
            .finish()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    #[instrument(skip(self, fields), fields(content_type = %collection))]
    async fn create(&self, collection: ContentType, fields: Fields) -> Result<String, StoreError> {
        let id = new_id();
        let fields = stamp_created(fields, self.inner.clock.now_utc());

        self.inner
            .collections
            .entry(collection)
            .or_default()
            .push(Document::new(id.clone(), fields));
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
        {
            let mut docs = self.inner.collections.entry(collection).or_default();
            let doc = docs
                .iter_mut()
                .find(|doc| doc.id == id)
                .ok_or_else(|| StoreError::not_found(collection.collection(), id))?;
            merge_update(&mut doc.fields, fields, now);
        }
        self.inner.notifier.notify(collection);

        debug!("Updated record");
        Ok(())
    }

    #[instrument(skip(self), fields(content_type = %collection))]
    async fn delete(&self, collection: ContentType, id: &str) -> Result<(), StoreError> {
        {
            let mut docs = self.inner.collections.entry(collection).or_default();
            let position = docs
                .iter()
                .position(|doc| doc.id == id)
                .ok_or_else(|| StoreError::not_found(collection.collection(), id))?;
            docs.remove(position);
        }
        self.inner.notifier.notify(collection);

        debug!("Deleted record");
        Ok(())
    }

    async fn get(&self, collection: ContentType, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .inner
            .collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id).cloned()))
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
            DEFAULT_FEED_CAPACITY,
        ))
    }
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    hash: String,
}

/// In-memory implementation of [`BlobStore`]
#[derive(Debug, Clone)]
pub struct InMemoryBlobStore {
    blobs: Arc<DashMap<String, StoredBlob>>,
    public_base_url: String,
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

impl InMemoryBlobStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            blobs: Arc::new(DashMap::new()),
            public_base_url: public_base_url.into(),
        }
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.contains_key(path)
    }

    fn blob_ref(&self, path: &str, blob: &StoredBlob) -> BlobRef {
        BlobRef {
            path: path.to_string(),
            url: self.public_url(path),
            size: blob.data.len() as u64,
            hash: blob.hash.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    #[instrument(skip(self, data, _content_type), fields(size = data.len()))]
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> Result<BlobRef, BlobError> {
        validate_blob_path(path)?;

        let blob = StoredBlob {
            hash: ContentRef::from_data(&data).hash_hex(),
            data,
        };

        match self.blobs.entry(path.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(BlobError::AlreadyExists(path.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let blob_ref = self.blob_ref(path, &blob);
                slot.insert(blob);
                debug!(path, "Stored blob");
                Ok(blob_ref)
            }
        }
    }

    async fn load(&self, path: &str) -> Result<Bytes, BlobError> {
        self.blobs
            .get(path)
            .map(|blob| blob.data.clone())
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<bool, BlobError> {
        Ok(self.blobs.remove(path).is_some())
    }

    async fn list(&self) -> Result<Vec<BlobRef>, BlobError> {
        let mut refs: Vec<BlobRef> = self
            .blobs
            .iter()
            .map(|entry| self.blob_ref(entry.key(), entry.value()))
            .collect();
        refs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(refs)
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), path)
    }
}
