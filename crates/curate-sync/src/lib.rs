//! # Curate Sync
//!
//! The client-side core of the dashboard: which fields a content type has,
//! how a form submission becomes a stored record, and how pushed snapshots
//! of every collection merge into one ordered, live collection.
//!
//! ## Modules
//!
//! - [`schema`]: Declared and discovered field lists, the known-field catalog
//! - [`form`]: Validation rules, submit and edit sessions, notifications
//! - [`persistence`]: Upload files, then create, update or delete records
//! - [`live`]: [`LiveSyncStore`] merging per-type snapshot streams
//! - [`view`]: Pagination, grid summary and card rendering
//! - [`suggest`]: Claude-backed and static field suggestions
//! - [`auth`]: In-memory email/password sessions
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use curate_core::ContentType;
//! use curate_storage::{InMemoryBlobStore, InMemoryDocumentStore};
//! use curate_sync::{LiveSyncConfig, LiveSyncStore, PersistenceAdapter};
//!
//! let documents = Arc::new(InMemoryDocumentStore::new());
//! let adapter = PersistenceAdapter::new(documents.clone(), Arc::new(InMemoryBlobStore::default()));
//! let live = LiveSyncStore::new(documents, LiveSyncConfig::default());
//! live.start().await?;
//!
//! adapter.create(ContentType::Greetings, [("name".to_string(), "Bo".into())].into()).await?;
//! live.wait_for(Duration::from_secs(1), |items| !items.is_empty()).await?;
//! ```

pub mod auth;
pub mod error;
pub mod form;
pub mod live;
pub mod persistence;
pub mod schema;
pub mod suggest;
pub mod view;

// Re-exports
pub use auth::InMemoryAuthProvider;
pub use error::{PersistenceError, SyncError};
pub use form::{
    EditSession, EditableField, FieldError, FieldRule, FormBuilder, FormInput, FormSchema,
    FormSession, FormSubmission, LogNotifier, Notification, NotificationLevel, Notifier,
    RecordingNotifier, SubmitOutcome,
};
pub use live::{
    LiveSyncConfig, LiveSyncStore, apply_snapshot, merge_partition, normalize_document,
    partition_ordered, sort_global,
};
pub use persistence::{
    BlobKeyGenerator, FieldData, FieldPayload, FileUpload, PersistenceAdapter, reference_key,
    sanitize_filename,
};
pub use schema::{CatalogEntry, FIELD_CATALOG, Schema, SchemaRegistry, catalog_entry};
pub use suggest::{ClaudeSuggestionService, StaticSuggestionService};
pub use view::{CardField, CardView, GridEntry, GridSummary, PageView, Paginator, render_value};
