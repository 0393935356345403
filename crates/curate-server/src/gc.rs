//! Blob garbage collection
//!
//! Record writes are not atomic with their uploads, so a failed write can
//! leave blobs no record points at. Deleting a record leaves its blobs too.
//! A blob is kept while any stored string equals its URL or its path.

use std::collections::HashSet;
use std::sync::Arc;

use curate_core::{BlobError, BlobRef, DocumentStore, StoreError};
use curate_storage::{FsBlobStore, GcResult};
use curate_sync::PersistenceAdapter;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum GcError {
    #[error("Failed to read records: {0}")]
    Store(#[from] StoreError),

    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),
}

fn is_referenced(references: &HashSet<String>, blob: &BlobRef) -> bool {
    references.contains(&blob.url) || references.contains(&blob.path)
}

/// Delete unreferenced blobs, or with `dry_run` only report them
pub async fn collect_garbage(
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<FsBlobStore>,
    dry_run: bool,
) -> Result<GcResult, GcError> {
    let adapter = PersistenceAdapter::new(documents, blobs.clone());
    let references = adapter.referenced_values().await?;

    if !dry_run {
        return Ok(blobs.gc(|blob| is_referenced(&references, blob)).await?);
    }

    let mut result = GcResult::default();
    for blob in blobs.list_all().await? {
        if is_referenced(&references, &blob) {
            result.retained_count += 1;
        } else {
            result.deleted_count += 1;
            result.bytes_freed += blob.size;
            result.deleted_paths.push(blob.path);
        }
    }
    info!(
        would_delete = result.deleted_count,
        retained = result.retained_count,
        "Dry run complete"
    );
    Ok(result)
}
