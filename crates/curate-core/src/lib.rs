//! # Curate Core
//!
//! Core types, traits, and errors for the Curate content dashboard.
//!
//! This crate holds the vocabulary shared by every other crate: the closed set
//! of content types, field descriptors, the canonical [`ContentItem`] model, and
//! the raw [`Document`]/[`Snapshot`] shapes a document store pushes.
//!
//! ## Key Traits
//!
//! - [`DocumentStore`]: One logical table per content type with push subscriptions
//! - [`BlobStore`]: Path-addressed file storage returning public references
//! - [`SuggestionService`]: Suggests form field names for a content type
//! - [`AuthProvider`]: Email/password sessions, treated as a boolean gate
//! - [`Clock`]: Time abstraction for testability
//!
//! ## Key Types
//!
//! - [`ContentType`]: Reels, Screenshots, Greetings
//! - [`FieldDescriptor`]: `{name, label, kind}` driving forms and validation
//! - [`ContentItem`]: Normalized record as seen by the view layer
//! - [`Snapshot`]: Full record set of one collection in backend order

pub mod content;
pub mod document;
pub mod error;
pub mod field;
pub mod item;
pub mod traits;
pub mod value;

// Re-export main types
pub use content::*;
pub use document::*;
pub use error::*;
pub use field::*;
pub use item::*;
pub use traits::*;
pub use value::*;
