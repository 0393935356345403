//! # Curate Storage
//!
//! Backends for the [`DocumentStore`](curate_core::DocumentStore) and
//! [`BlobStore`](curate_core::BlobStore) traits.
//!
//! ## Features
//!
//! - **InMemoryDocumentStore**: `DashMap` collections for tests and demos
//! - **RedbDocumentStore**: Persistent records in a single redb table
//! - **InMemoryBlobStore** / **FsBlobStore**: Path-addressed blobs with BLAKE3 hashes
//! - **ChangeNotifier**: Per-collection revisions driving push subscriptions
//!
//! ## Example
//!
//! ```rust,ignore
//! use curate_core::{ContentType, DocumentStore, SortPolicy};
//! use curate_storage::InMemoryDocumentStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryDocumentStore::new();
//!     let mut feed = store
//!         .subscribe(ContentType::Reels, SortPolicy::OrderAsc)
//!         .await
//!         .unwrap();
//!
//!     // First push is the current (empty) collection
//!     let snapshot = feed.recv().await.unwrap().unwrap();
//!     assert!(snapshot.is_empty());
//! }
//! ```

pub mod blobs;
pub mod error;
pub mod hub;
pub mod memory;
pub mod record;
pub mod structured;

// Re-exports
pub use blobs::{BlobStoreConfig, ContentRef, FsBlobStore, GcResult, validate_blob_path};
pub use error::StorageError;
pub use hub::{ChangeNotifier, SnapshotSource};
pub use memory::{InMemoryBlobStore, InMemoryDocumentStore};
pub use structured::{RedbDocumentStore, RedbDocumentStoreConfig, RedbStorage, RedbStorageConfig};
