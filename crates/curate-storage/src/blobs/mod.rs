//! Path-addressed blob storage
//!
//! Blobs live under store-relative paths such as
//! `Reels/1714557600000-cover.png`. Paths are plain `/`-separated segments;
//! absolute paths, backslashes and `.`/`..` segments are rejected so a key
//! can never escape the store root.

mod content_ref;
mod store;

pub use content_ref::ContentRef;
pub use store::{BlobStoreConfig, FsBlobStore, GcResult};

use curate_core::BlobError;

/// Check that `path` is a safe store-relative blob key
pub fn validate_blob_path(path: &str) -> Result<(), BlobError> {
    let invalid = || BlobError::InvalidPath(path.to_string());

    if path.is_empty() || path.starts_with('/') || path.contains('\\') || path.contains('\0') {
        return Err(invalid());
    }
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(invalid());
        }
    }
    Ok(())
}
