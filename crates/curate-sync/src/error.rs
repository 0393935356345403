//! Error types for curate-sync

use curate_core::{BlobError, ContentType, StoreError};
use thiserror::Error;

/// Failures of the persistence adapter.
///
/// Writes are not atomic: a record write that fails after uploads
/// succeeded leaves the uploaded blobs behind, listed in `orphaned_blobs`.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("Upload for field '{field}' failed: {source}")]
    Upload { field: String, source: BlobError },

    #[error("Record write failed: {source}")]
    Write {
        source: StoreError,
        orphaned_blobs: Vec<String>,
    },
}

impl PersistenceError {
    pub fn write(source: StoreError) -> Self {
        Self::Write {
            source,
            orphaned_blobs: Vec::new(),
        }
    }

    /// Blob paths uploaded before the failure
    pub fn orphaned_blobs(&self) -> &[String] {
        match self {
            Self::Write { orphaned_blobs, .. } => orphaned_blobs,
            Self::Upload { .. } => &[],
        }
    }

    /// Whether the underlying record did not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Write {
                source: StoreError::NotFound { .. },
                ..
            }
        )
    }
}

/// Errors from the live sync store
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("Live sync store already started")]
    AlreadyStarted,

    #[error("Live sync store has been stopped")]
    Stopped,

    #[error("Subscription to {content_type} failed: {source}")]
    Subscribe {
        content_type: ContentType,
        source: StoreError,
    },

    #[error("Timed out waiting for the collection")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orphans_only_on_write_failure() {
        let err = PersistenceError::Write {
            source: StoreError::io("disk full"),
            orphaned_blobs: vec!["Reels/1-a.png".into()],
        };
        assert_eq!(err.orphaned_blobs(), ["Reels/1-a.png".to_string()]);
        assert!(err.to_string().contains("disk full"));

        let err = PersistenceError::Upload {
            field: "thumbnail".into(),
            source: BlobError::AlreadyExists("x".into()),
        };
        assert!(err.orphaned_blobs().is_empty());
        assert!(err.to_string().contains("thumbnail"));
    }

    #[test]
    fn test_not_found_detection() {
        let err = PersistenceError::write(StoreError::not_found("Reels", "x"));
        assert!(err.is_not_found());
    }
}
