//! Change notification and snapshot feeds
//!
//! Every document store keeps a [`ChangeNotifier`] with one revision counter
//! per collection. A subscription is a small task that loads a full snapshot,
//! pushes it, then sleeps until the counter moves. Bursts of writes collapse
//! into a single snapshot because each push always carries the whole
//! collection.

use std::sync::Arc;

use curate_core::{ContentType, Snapshot, SnapshotStream, SortPolicy, StoreError};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::StorageError;

/// Buffered snapshots per subscription before the feed waits on the reader
pub const DEFAULT_FEED_CAPACITY: usize = 16;

/// Something that can produce the current snapshot of a collection
pub trait SnapshotSource: Send + Sync + 'static {
    fn snapshot(&self, collection: ContentType, sort: SortPolicy)
    -> Result<Snapshot, StorageError>;
}

/// Per-collection revision counters
#[derive(Debug)]
pub struct ChangeNotifier {
    revisions: DashMap<ContentType, watch::Sender<u64>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let revisions = DashMap::new();
        for content_type in ContentType::ALL {
            revisions.insert(content_type, watch::channel(0).0);
        }
        Self { revisions }
    }

    /// Record a change to `collection` and wake its subscribers
    pub fn notify(&self, collection: ContentType) {
        if let Some(tx) = self.revisions.get(&collection) {
            tx.send_modify(|rev| *rev += 1);
        }
    }

    /// Receiver that resolves `changed()` on the next write to `collection`
    pub fn watch(&self, collection: ContentType) -> watch::Receiver<u64> {
        self.revisions
            .entry(collection)
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }

    /// Number of writes seen for `collection`
    pub fn revision(&self, collection: ContentType) -> u64 {
        self.revisions
            .get(&collection)
            .map(|tx| *tx.borrow())
            .unwrap_or(0)
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the task feeding one subscription.
///
/// The first snapshot is sent immediately. Loads run on the blocking pool.
/// A load error is pushed to the reader and ends the feed.
pub fn spawn_feed<S: SnapshotSource>(
    source: Arc<S>,
    mut changes: watch::Receiver<u64>,
    collection: ContentType,
    sort: SortPolicy,
    capacity: usize,
) -> SnapshotStream {
    let (tx, stream) = SnapshotStream::channel(collection, capacity);

    let task = tokio::spawn(async move {
        loop {
            changes.borrow_and_update();

            // redb reads block; keep them off the async workers
            let load = Arc::clone(&source);
            let snapshot = tokio::task::spawn_blocking(move || load.snapshot(collection, sort))
                .await
                .unwrap_or_else(|e| Err(StorageError::database(format!("snapshot task failed: {e}"))))
                .map_err(StoreError::from);
            let failed = snapshot.is_err();
            if let Err(e) = &snapshot {
                warn!(content_type = %collection, error = %e, "Snapshot load failed");
            }

            if tx.send(snapshot).await.is_err() {
                debug!(content_type = %collection, "Subscriber gone, ending feed");
                break;
            }
            if failed || changes.changed().await.is_err() {
                break;
            }
        }
    });

    stream.with_task(task)
}
