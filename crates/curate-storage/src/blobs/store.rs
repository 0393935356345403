//! Filesystem blob store
//!
//! Each blob is one file under `base_dir` at its store-relative path. Writes
//! go to a hidden temp file first and are published with a hard link, which
//! fails if the target exists, so an upload never overwrites another.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use curate_core::{BlobError, BlobRef, BlobStore};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::content_ref::ContentRef;
use super::validate_blob_path;
use crate::record::new_id;

const PARTIAL_SUFFIX: &str = ".partial";

/// Configuration for the blob store
#[derive(Debug, Clone)]
pub struct BlobStoreConfig {
    /// Base directory for blob storage
    pub base_dir: PathBuf,
    /// Prefix of public blob URLs; the blob path is appended
    pub public_base_url: String,
    /// Maximum blob size (bytes)
    pub max_blob_size: u64,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data/blobs"),
            public_base_url: "http://127.0.0.1:8080/blobs".to_string(),
            max_blob_size: 20 * 1024 * 1024, // 20MB
        }
    }
}

impl BlobStoreConfig {
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into();
        self
    }

    pub fn with_max_blob_size(mut self, bytes: u64) -> Self {
        self.max_blob_size = bytes;
        self
    }
}

/// Blob store on the local filesystem
#[derive(Debug)]
pub struct FsBlobStore {
    config: BlobStoreConfig,
}

impl FsBlobStore {
    /// Create a new blob store, creating `base_dir` if needed
    pub async fn new(config: BlobStoreConfig) -> Result<Self, BlobError> {
        fs::create_dir_all(&config.base_dir).await?;

        info!(path = %config.base_dir.display(), "Blob store initialized");

        Ok(Self { config })
    }

    pub fn config(&self) -> &BlobStoreConfig {
        &self.config
    }

    fn full_path(&self, path: &str) -> Result<PathBuf, BlobError> {
        validate_blob_path(path)?;
        Ok(self.config.base_dir.join(path))
    }

    fn blob_ref(&self, path: String, content_ref: ContentRef) -> BlobRef {
        BlobRef {
            url: self.public_url(&path),
            path,
            size: content_ref.size,
            hash: content_ref.hash_hex(),
        }
    }

    /// Check if a blob exists
    pub async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        let full = self.full_path(path)?;
        Ok(fs::try_exists(&full).await?)
    }

    /// List all blobs with their content hashes
    pub async fn list_all(&self) -> Result<Vec<BlobRef>, BlobError> {
        let mut files = Vec::new();
        collect_files(&self.config.base_dir, String::new(), &mut files).await?;
        files.sort();

        let mut refs = Vec::with_capacity(files.len());
        for rel in files {
            let data = fs::read(self.config.base_dir.join(&rel)).await?;
            refs.push(self.blob_ref(rel, ContentRef::from_data(&data)));
        }
        Ok(refs)
    }

    /// Get total size of all blobs
    pub async fn total_size(&self) -> Result<u64, BlobError> {
        let refs = self.list_all().await?;
        Ok(refs.iter().map(|r| r.size).sum())
    }

    /// Delete every blob for which `is_referenced` returns false
    pub async fn gc<F>(&self, is_referenced: F) -> Result<GcResult, BlobError>
    where
        F: Fn(&BlobRef) -> bool,
    {
        let all_refs = self.list_all().await?;
        let mut result = GcResult::default();

        for blob in all_refs {
            if is_referenced(&blob) {
                result.retained_count += 1;
            } else if self.delete(&blob.path).await? {
                result.deleted_count += 1;
                result.bytes_freed += blob.size;
                result.deleted_paths.push(blob.path);
            }
        }

        info!(
            deleted = result.deleted_count,
            retained = result.retained_count,
            bytes_freed = result.bytes_freed,
            "Garbage collection complete"
        );

        Ok(result)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self, data, content_type), fields(size = data.len()))]
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<BlobRef, BlobError> {
        if data.len() as u64 > self.config.max_blob_size {
            return Err(BlobError::TooLarge {
                size: data.len() as u64,
                limit: self.config.max_blob_size,
            });
        }

        let target = self.full_path(path)?;
        if fs::try_exists(&target).await? {
            return Err(BlobError::AlreadyExists(path.to_string()));
        }

        let parent = target
            .parent()
            .ok_or_else(|| BlobError::InvalidPath(path.to_string()))?;
        fs::create_dir_all(parent).await?;

        // Write to a hidden temp file, then link into place
        let temp_path = parent.join(format!(".{}{}", new_id(), PARTIAL_SUFFIX));
        let mut file = File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        let published = fs::hard_link(&temp_path, &target).await;
        if let Err(e) = fs::remove_file(&temp_path).await {
            warn!(path = %temp_path.display(), error = %e, "Failed to remove temp blob");
        }
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(BlobError::AlreadyExists(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let content_ref = ContentRef::from_data(&data);
        debug!(path, hash = %content_ref.short_hash(), content_type, "Stored blob");
        Ok(self.blob_ref(path.to_string(), content_ref))
    }

    #[instrument(skip(self))]
    async fn load(&self, path: &str) -> Result<Bytes, BlobError> {
        let full = self.full_path(path)?;
        match fs::read(&full).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::NotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<bool, BlobError> {
        let full = self.full_path(path)?;
        match fs::remove_file(&full).await {
            Ok(_) => {
                debug!("Deleted blob");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<BlobRef>, BlobError> {
        self.list_all().await
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            path
        )
    }
}

/// Recursively collect store-relative file paths, skipping temp files
fn collect_files<'a>(
    dir: &'a Path,
    prefix: String,
    files: &'a mut Vec<String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), BlobError>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let rel = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };

            if entry.file_type().await?.is_dir() {
                collect_files(&entry.path(), rel, files).await?;
            } else if !(name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX)) {
                files.push(rel);
            }
        }

        Ok(())
    })
}

/// Result of garbage collection
#[derive(Debug, Default)]
pub struct GcResult {
    /// Number of blobs deleted
    pub deleted_count: usize,
    /// Number of blobs retained
    pub retained_count: usize,
    /// Bytes freed
    pub bytes_freed: u64,
    pub deleted_paths: Vec<String>,
}
