//! Structured storage using redb
//!
//! Queryable, mutable record storage backing the persistent
//! [`DocumentStore`](curate_core::DocumentStore).

mod document_store;
mod tables;

pub use document_store::{RedbDocumentStore, RedbDocumentStoreConfig};
pub use tables::{DOCUMENTS, RedbStorage, RedbStorageConfig, ScanResults};
