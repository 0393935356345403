//! Backend traits for Curate
//!
//! Every external collaborator sits behind one of these traits so the sync
//! layer and the server can run against in-memory fakes, local stores, or a
//! hosted backend without changes.
//!
//! ## Key Traits
//!
//! - [`DocumentStore`]: Typed collections with push subscriptions
//! - [`BlobStore`]: Path-addressed uploads returning public references
//! - [`SuggestionService`]: Field-name suggestions per content type
//! - [`AuthProvider`]: Sign-up, sign-in, sign-out, session lookup
//! - [`Clock`]: Time abstraction for testability

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::content::ContentType;
use crate::document::{Document, Fields, Snapshot, SortPolicy};
use crate::error::{AuthError, BlobError, StoreError, SuggestionError};

/// Storage abstraction for typed record collections
///
/// One logical collection exists per [`ContentType`]. The store owns the
/// record timestamps: `create` stamps `createdAt` and `update` stamps
/// `updatedAt` from the store's own clock, so callers never send them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new record and return its store-assigned id
    async fn create(&self, collection: ContentType, fields: Fields) -> Result<String, StoreError>;

    /// Merge `fields` into an existing record; absent keys are left untouched
    async fn update(
        &self,
        collection: ContentType,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Remove a record
    async fn delete(&self, collection: ContentType, id: &str) -> Result<(), StoreError>;

    /// Fetch one record
    async fn get(&self, collection: ContentType, id: &str) -> Result<Option<Document>, StoreError>;

    /// All records of a collection in `sort` order
    async fn list(
        &self,
        collection: ContentType,
        sort: SortPolicy,
    ) -> Result<Vec<Document>, StoreError>;

    /// Open a push subscription.
    ///
    /// The stream yields the current snapshot immediately and a fresh full
    /// snapshot after every change to the collection.
    async fn subscribe(
        &self,
        collection: ContentType,
        sort: SortPolicy,
    ) -> Result<SnapshotStream, StoreError>;
}

/// Receiving half of a collection subscription
///
/// Dropping or closing the stream stops the producer task, if any.
pub struct SnapshotStream {
    content_type: ContentType,
    rx: mpsc::Receiver<Result<Snapshot, StoreError>>,
    task: Option<JoinHandle<()>>,
}

impl SnapshotStream {
    /// Create a sender/stream pair with no producer task attached
    pub fn channel(
        content_type: ContentType,
        capacity: usize,
    ) -> (mpsc::Sender<Result<Snapshot, StoreError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                content_type,
                rx,
                task: None,
            },
        )
    }

    /// Attach the task feeding this stream so it is aborted with the stream
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Next snapshot or error; `None` once the subscription is closed
    pub async fn recv(&mut self) -> Option<Result<Snapshot, StoreError>> {
        self.rx.recv().await
    }

    /// Close the subscription and discard anything still buffered. Idempotent.
    pub fn close(&mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for SnapshotStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStream")
            .field("content_type", &self.content_type)
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

/// Reference to an uploaded blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Store-relative path, `<type>/<epoch-millis>-<filename>`
    pub path: String,
    /// Publicly fetchable reference string
    pub url: String,
    pub size: u64,
    /// Hex content hash
    pub hash: String,
}

/// Path-addressed file storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `data` to `path`. Never overwrites an existing blob.
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<BlobRef, BlobError>;

    async fn load(&self, path: &str) -> Result<Bytes, BlobError>;

    /// Returns whether a blob was removed
    async fn delete(&self, path: &str) -> Result<bool, BlobError>;

    async fn list(&self) -> Result<Vec<BlobRef>, BlobError>;

    /// Public reference string for a path
    fn public_url(&self, path: &str) -> String;
}

/// Suggests which form fields to show for a content type
///
/// Expected to be a pure, idempotent function of its input.
#[async_trait]
pub trait SuggestionService: Send + Sync {
    async fn suggest_fields(&self, content_type: ContentType) -> Result<Vec<String>, SuggestionError>;
}

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A signed-in session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Authentication provider
///
/// The rest of the system only asks whether a token maps to a user.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;

    /// Current user for a session token, if the session is live
    async fn current_user(&self, token: &str) -> Result<Option<User>, AuthError>;

    /// Gate check: the session's user, or `InvalidSession`
    async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        self.current_user(token)
            .await?
            .ok_or(AuthError::InvalidSession)
    }
}

/// Time abstraction for testability
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64 {
        self.now_utc().timestamp_millis()
    }
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = at;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
