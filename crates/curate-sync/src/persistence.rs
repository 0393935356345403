//! Persistence Adapter
//!
//! Turns form payloads into stored records: file fields are uploaded to the
//! blob store first (sequentially), their public references replace the
//! files, and the resulting data is written to the document store. The
//! operation is not atomic. Blobs uploaded before a failed record write are
//! left in place and reported as orphans; `curate gc-blobs` removes them.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use curate_core::{
    BlobRef, BlobStore, Clock, ContentType, DocumentStore, Fields, SortPolicy, StoreError,
    SystemClock,
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::error::PersistenceError;

/// A file chosen for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FileUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One entry of a write: a plain value or a file still to upload
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPayload {
    Value(Value),
    File(FileUpload),
}

impl From<Value> for FieldPayload {
    fn from(value: Value) -> Self {
        FieldPayload::Value(value)
    }
}

impl From<&str> for FieldPayload {
    fn from(value: &str) -> Self {
        FieldPayload::Value(Value::String(value.to_string()))
    }
}

impl From<String> for FieldPayload {
    fn from(value: String) -> Self {
        FieldPayload::Value(Value::String(value))
    }
}

impl From<FileUpload> for FieldPayload {
    fn from(file: FileUpload) -> Self {
        FieldPayload::File(file)
    }
}

/// Field name → payload, in field order
pub type FieldData = BTreeMap<String, FieldPayload>;

/// Replace path separators so a filename stays one path segment
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Record key holding the reference for an uploaded file field:
/// the field name with `Url` appended, whatever it already ends in.
pub fn reference_key(field: &str) -> String {
    format!("{field}Url")
}

/// Produces blob keys `<type>/<epoch-millis>-<filename>`.
///
/// Stamps are strictly increasing, so two uploads within the same
/// millisecond still get different keys.
pub struct BlobKeyGenerator {
    clock: Arc<dyn Clock>,
    last: Mutex<i64>,
}

impl BlobKeyGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: Mutex::new(i64::MIN),
        }
    }

    /// Next stamp: the clock's milliseconds, bumped past the previous stamp
    pub fn next_millis(&self) -> i64 {
        let now = self.clock.now_millis();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let stamp = now.max(last.saturating_add(1));
        *last = stamp;
        stamp
    }

    pub fn key(&self, content_type: ContentType, filename: &str) -> String {
        format!(
            "{}/{}-{}",
            content_type.collection(),
            self.next_millis(),
            sanitize_filename(filename)
        )
    }
}

impl std::fmt::Debug for BlobKeyGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobKeyGenerator").finish_non_exhaustive()
    }
}

/// Writes typed records and their files
pub struct PersistenceAdapter {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    keys: BlobKeyGenerator,
}

impl PersistenceAdapter {
    pub fn new(documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self::with_clock(documents, blobs, Arc::new(SystemClock))
    }

    pub fn with_clock(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            documents,
            blobs,
            keys: BlobKeyGenerator::new(clock),
        }
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Upload one file under a fresh key for `content_type`
    pub async fn upload(
        &self,
        content_type: ContentType,
        field: &str,
        file: FileUpload,
    ) -> Result<BlobRef, PersistenceError> {
        let key = self.keys.key(content_type, &file.filename);
        self.blobs
            .upload(&key, file.bytes, file.content_type.as_deref())
            .await
            .map_err(|source| PersistenceError::Upload {
                field: field.to_string(),
                source,
            })
    }

    /// Upload every file entry in order and build the record fields.
    ///
    /// `rename` maps a file field to the key its reference is stored under.
    async fn resolve(
        &self,
        content_type: ContentType,
        data: FieldData,
        rename: fn(&str) -> String,
    ) -> Result<(Fields, Vec<String>), PersistenceError> {
        let mut fields = Fields::new();
        let mut uploaded = Vec::new();

        for (name, payload) in data {
            match payload {
                FieldPayload::Value(value) => {
                    fields.insert(name, value);
                }
                FieldPayload::File(file) => {
                    let blob = self.upload(content_type, &name, file).await?;
                    debug!(field = %name, path = %blob.path, "Uploaded file");
                    uploaded.push(blob.path);
                    fields.insert(rename(&name), Value::String(blob.url));
                }
            }
        }

        Ok((fields, uploaded))
    }

    /// Create a record, uploading its files first.
    ///
    /// File fields are stored as their public URL under [`reference_key`].
    #[instrument(skip(self, data), fields(content_type = %content_type))]
    pub async fn create(
        &self,
        content_type: ContentType,
        data: FieldData,
    ) -> Result<String, PersistenceError> {
        let result = async {
            let (fields, uploaded) = self.resolve(content_type, data, reference_key).await?;
            self.documents
                .create(content_type, fields)
                .await
                .map_err(|source| PersistenceError::Write {
                    source,
                    orphaned_blobs: uploaded,
                })
        }
        .await;

        match &result {
            Ok(id) => info!(id = %id, "Content saved"),
            Err(e) => error!(error = %e, orphaned = ?e.orphaned_blobs(), "Error saving content"),
        }
        result
    }

    /// Merge fields into a record; an edited file field keeps its name
    #[instrument(skip(self, data), fields(content_type = %content_type, id = %id))]
    pub async fn update(
        &self,
        content_type: ContentType,
        id: &str,
        data: FieldData,
    ) -> Result<(), PersistenceError> {
        let result = async {
            let (fields, uploaded) = self.resolve(content_type, data, str::to_string).await?;
            self.documents
                .update(content_type, id, fields)
                .await
                .map_err(|source| PersistenceError::Write {
                    source,
                    orphaned_blobs: uploaded,
                })
        }
        .await;

        match &result {
            Ok(()) => info!("Content updated"),
            Err(e) => error!(error = %e, orphaned = ?e.orphaned_blobs(), "Error updating content"),
        }
        result
    }

    /// Remove a record. Its blobs are left for garbage collection.
    #[instrument(skip(self), fields(content_type = %content_type, id = %id))]
    pub async fn delete(&self, content_type: ContentType, id: &str) -> Result<(), PersistenceError> {
        let result = self
            .documents
            .delete(content_type, id)
            .await
            .map_err(PersistenceError::write);

        match &result {
            Ok(()) => info!("Content deleted"),
            Err(e) => error!(error = %e, "Error deleting content"),
        }
        result
    }

    /// Fire-and-forget [`create`](Self::create); failures are only logged
    pub fn spawn_create(self: &Arc<Self>, content_type: ContentType, data: FieldData) -> JoinHandle<()> {
        let adapter = Arc::clone(self);
        tokio::spawn(async move {
            let _ = adapter.create(content_type, data).await;
        })
    }

    /// Fire-and-forget [`update`](Self::update)
    pub fn spawn_update(
        self: &Arc<Self>,
        content_type: ContentType,
        id: impl Into<String>,
        data: FieldData,
    ) -> JoinHandle<()> {
        let adapter = Arc::clone(self);
        let id = id.into();
        tokio::spawn(async move {
            let _ = adapter.update(content_type, &id, data).await;
        })
    }

    /// Fire-and-forget [`delete`](Self::delete)
    pub fn spawn_delete(self: &Arc<Self>, content_type: ContentType, id: impl Into<String>) -> JoinHandle<()> {
        let adapter = Arc::clone(self);
        let id = id.into();
        tokio::spawn(async move {
            let _ = adapter.delete(content_type, &id).await;
        })
    }

    /// Every string value stored in any record, for blob garbage collection
    pub async fn referenced_values(&self) -> Result<HashSet<String>, StoreError> {
        let mut references = HashSet::new();
        for content_type in ContentType::ALL {
            for doc in self.documents.list(content_type, SortPolicy::default()).await? {
                for value in doc.fields.values() {
                    collect_strings(value, &mut references);
                }
            }
        }
        Ok(references)
    }
}

fn collect_strings(value: &Value, out: &mut HashSet<String>) {
    match value {
        Value::String(s) => {
            out.insert(s.clone());
        }
        Value::Array(values) => values.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use curate_core::ManualClock;

    fn frozen_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("cover.png"), "cover.png");
        assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_filename("a\\b.jpg"), "a_b.jpg");
        assert_eq!(sanitize_filename("   "), "upload");
    }

    #[test]
    fn test_reference_key() {
        assert_eq!(reference_key("thumbnail"), "thumbnailUrl");
        assert_eq!(reference_key("screenshot3"), "screenshot3Url");
        assert_eq!(reference_key("imageUrl"), "imageUrlUrl");
    }

    #[test]
    fn test_keys_strictly_increase_on_frozen_clock() {
        let clock = frozen_clock();
        let keys = BlobKeyGenerator::new(clock.clone());

        let base = clock.now_millis();
        assert_eq!(keys.next_millis(), base);
        assert_eq!(keys.next_millis(), base + 1);

        let first = keys.key(ContentType::Reels, "a.png");
        let second = keys.key(ContentType::Reels, "a.png");
        assert_ne!(first, second);
        assert_eq!(first, format!("Reels/{}-a.png", base + 2));
    }

    #[test]
    fn test_keys_follow_clock_forward() {
        let clock = frozen_clock();
        let keys = BlobKeyGenerator::new(clock.clone());
        keys.next_millis();
        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(keys.next_millis(), clock.now_millis());
    }
}
