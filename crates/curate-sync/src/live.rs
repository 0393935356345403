//! Live Sync Store
//!
//! Holds the merged collection of every content type. One subscription per
//! type forwards pushed snapshots into a single merge task, which is the
//! only writer of the collection. Readers take cheap `Arc` snapshots from a
//! `watch` channel.
//!
//! ```text
//!   subscribe(Reels) ──┐
//!   subscribe(Screenshots) ──┼──► mpsc ──► merge task ──► watch<Arc<Vec<ContentItem>>>
//!   subscribe(Greetings) ──┘
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use curate_core::{
    Clock, ContentItem, ContentType, Document, DocumentStore, FieldValue, METADATA_KEYS,
    Snapshot, SortPolicy, SystemClock, compare_order,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::SyncError;

/// Snapshots buffered between the forwarders and the merge task
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Configuration for [`LiveSyncStore`]
#[derive(Debug, Clone)]
pub struct LiveSyncConfig {
    /// Backend ordering; the global re-sort only runs under `OrderAsc`
    pub sort: SortPolicy,
    /// Types to subscribe to
    pub content_types: Vec<ContentType>,
    pub channel_capacity: usize,
}

impl Default for LiveSyncConfig {
    fn default() -> Self {
        Self {
            sort: SortPolicy::default(),
            content_types: ContentType::ALL.to_vec(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl LiveSyncConfig {
    pub fn with_sort(mut self, sort: SortPolicy) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_content_types(mut self, content_types: impl IntoIterator<Item = ContentType>) -> Self {
        self.content_types = content_types.into_iter().collect();
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

/// Decode a stored document into the canonical item.
///
/// A missing `createdAt` becomes `now`; an `order` that is not a positive
/// integer leaves the item unordered. Metadata keys never reach `data`.
pub fn normalize_document(content_type: ContentType, doc: &Document, now: DateTime<Utc>) -> ContentItem {
    let data = doc
        .fields
        .iter()
        .filter(|(key, _)| !METADATA_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), FieldValue::from_json(value.clone())))
        .collect();

    ContentItem {
        id: doc.id.clone(),
        content_type,
        data,
        created_at: doc.created_at().unwrap_or(now),
        updated_at: doc.updated_at(),
        order: doc.order(),
    }
}

/// Ordered items first, then unordered; relative order kept in both halves
pub fn partition_ordered(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let (mut ordered, unordered): (Vec<_>, Vec<_>) =
        items.into_iter().partition(ContentItem::is_ordered);
    ordered.extend(unordered);
    ordered
}

/// Replace the `content_type` partition of `old` with `new`.
///
/// Items of other types keep their positions; the new items go at the end.
pub fn merge_partition(
    old: &[ContentItem],
    content_type: ContentType,
    new: Vec<ContentItem>,
) -> Vec<ContentItem> {
    let mut merged: Vec<ContentItem> = old
        .iter()
        .filter(|item| item.content_type != content_type)
        .cloned()
        .collect();
    merged.extend(new);
    merged
}

/// Stable sort by `order`, unordered items last
pub fn sort_global(items: &mut [ContentItem]) {
    items.sort_by(|a, b| compare_order(a.order, b.order));
}

/// Full merge step for one pushed snapshot
pub fn apply_snapshot(
    old: &[ContentItem],
    snapshot: &Snapshot,
    sort: SortPolicy,
    now: DateTime<Utc>,
) -> Vec<ContentItem> {
    let items = snapshot
        .documents
        .iter()
        .map(|doc| normalize_document(snapshot.content_type, doc, now))
        .collect();
    let mut merged = merge_partition(old, snapshot.content_type, partition_ordered(items));
    if sort.is_global_order() {
        sort_global(&mut merged);
    }
    merged
}

struct LiveInner {
    store: Arc<dyn DocumentStore>,
    config: LiveSyncConfig,
    clock: Arc<dyn Clock>,
    items: watch::Sender<Arc<Vec<ContentItem>>>,
    started: AtomicBool,
    stopped: AtomicBool,
    merges: AtomicU64,
}

impl LiveInner {
    fn merge(&self, snapshot: Snapshot) {
        if self.stopped.load(Ordering::Acquire) {
            debug!(content_type = %snapshot.content_type, "Dropping snapshot after stop");
            return;
        }

        let now = self.clock.now_utc();
        let current = self.items.borrow().clone();
        let merged = apply_snapshot(&current, &snapshot, self.config.sort, now);

        let total = merged.len();

        // `stop` flips the flag under the same lock, so nothing is
        // published once it has returned
        let published = self.items.send_if_modified(|items| {
            if self.stopped.load(Ordering::Acquire) {
                return false;
            }
            *items = Arc::new(merged);
            true
        });
        if !published {
            debug!(content_type = %snapshot.content_type, "Discarding merge finished after stop");
            return;
        }

        debug!(
            content_type = %snapshot.content_type,
            documents = snapshot.len(),
            total,
            "Merged snapshot"
        );
        self.merges.fetch_add(1, Ordering::Relaxed);
    }
}

/// The merged, continuously updated collection of all content types
pub struct LiveSyncStore {
    inner: Arc<LiveInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LiveSyncStore {
    pub fn new(store: Arc<dyn DocumentStore>, config: LiveSyncConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn DocumentStore>,
        config: LiveSyncConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (items, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: Arc::new(LiveInner {
                store,
                config,
                clock,
                items,
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                merges: AtomicU64::new(0),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &LiveSyncConfig {
        &self.inner.config
    }

    /// Open one subscription per configured type and start merging.
    ///
    /// If any subscription cannot be opened, the ones already opened are
    /// closed and the store may be started again.
    #[instrument(skip(self), fields(sort = ?self.inner.config.sort))]
    pub async fn start(&self) -> Result<(), SyncError> {
        if self.inner.stopped.load(Ordering::Acquire) {
            return Err(SyncError::Stopped);
        }
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::AlreadyStarted);
        }

        let config = &self.inner.config;
        let mut streams = Vec::with_capacity(config.content_types.len());
        for &content_type in &config.content_types {
            match self.inner.store.subscribe(content_type, config.sort).await {
                Ok(stream) => streams.push(stream),
                Err(source) => {
                    error!(content_type = %content_type, error = %source, "Subscription failed");
                    for mut stream in streams {
                        stream.close();
                    }
                    self.inner.started.store(false, Ordering::Release);
                    return Err(SyncError::Subscribe {
                        content_type,
                        source,
                    });
                }
            }
        }

        let (tx, mut rx) = mpsc::channel::<Snapshot>(config.channel_capacity);
        let mut tasks = Vec::with_capacity(streams.len() + 1);

        for mut stream in streams {
            let tx = tx.clone();
            tasks.push(tokio::spawn(async move {
                let content_type = stream.content_type();
                while let Some(next) = stream.recv().await {
                    match next {
                        Ok(snapshot) => {
                            if tx.send(snapshot).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            error!(content_type = %content_type, error = %e, "Subscription error, partition no longer updates");
                            break;
                        }
                    }
                }
                debug!(content_type = %content_type, "Subscription forwarder ended");
            }));
        }
        drop(tx);

        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                if inner.stopped.load(Ordering::Acquire) {
                    break;
                }
                inner.merge(snapshot);
            }
        }));

        let mut held = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if self.inner.stopped.load(Ordering::Acquire) {
            // stop() ran while subscriptions were opening
            tasks.iter().for_each(JoinHandle::abort);
            return Err(SyncError::Stopped);
        }
        *held = tasks;

        info!(content_types = config.content_types.len(), "Live sync started");
        Ok(())
    }

    /// Close every subscription and freeze the collection. Idempotent.
    pub fn stop(&self) {
        let mut already_stopped = false;
        self.inner.items.send_if_modified(|_| {
            already_stopped = self.inner.stopped.swap(true, Ordering::AcqRel);
            false
        });
        if already_stopped {
            return;
        }
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in &tasks {
            task.abort();
        }
        info!(tasks = tasks.len(), "Live sync stopped");
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Current merged collection
    pub fn items(&self) -> Arc<Vec<ContentItem>> {
        self.inner.items.borrow().clone()
    }

    /// Items of one type, in collection order
    pub fn items_of(&self, content_type: ContentType) -> Vec<ContentItem> {
        self.inner
            .items
            .borrow()
            .iter()
            .filter(|item| item.content_type == content_type)
            .cloned()
            .collect()
    }

    /// Receiver that observes every published collection
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<ContentItem>>> {
        self.inner.items.subscribe()
    }

    /// Number of snapshots merged so far
    pub fn merge_count(&self) -> u64 {
        self.inner.merges.load(Ordering::Relaxed)
    }

    /// Wait until the collection satisfies `predicate`
    pub async fn wait_for<F>(
        &self,
        timeout: Duration,
        mut predicate: F,
    ) -> Result<Arc<Vec<ContentItem>>, SyncError>
    where
        F: FnMut(&[ContentItem]) -> bool,
    {
        let mut rx = self.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|items| predicate(items))).await {
            Ok(Ok(items)) => Ok(items.clone()),
            Ok(Err(_)) => Err(SyncError::Stopped),
            Err(_) => {
                warn!(?timeout, "Timed out waiting for collection");
                Err(SyncError::Timeout)
            }
        }
    }
}

impl Drop for LiveSyncStore {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LiveSyncStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSyncStore")
            .field("config", &self.inner.config)
            .field("started", &self.is_started())
            .field("stopped", &self.is_stopped())
            .field("items", &self.inner.items.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn doc(id: &str, fields: Value) -> Document {
        let Value::Object(map) = fields else {
            panic!("fields must be an object");
        };
        Document::new(id, map)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn ids(items: &[ContentItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_normalize_strips_metadata() {
        let d = doc(
            "r1",
            json!({
                "name": "Alice",
                "views": 3,
                "order": 2,
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-02-01T00:00:00Z"
            }),
        );
        let item = normalize_document(ContentType::Reels, &d, now());
        assert_eq!(item.order, Some(2));
        assert_eq!(item.created_at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(item.updated_at.is_some());
        assert_eq!(item.data.len(), 2);
        assert_eq!(item.text("name"), Some("Alice"));
        assert_eq!(item.field("views"), Some(&FieldValue::Number(3.0)));
    }

    #[test]
    fn test_normalize_defaults() {
        let item = normalize_document(ContentType::Greetings, &doc("g", json!({"order": 0})), now());
        assert_eq!(item.created_at, now());
        assert_eq!(item.order, None);
        assert!(item.data.is_empty());

        let item = normalize_document(ContentType::Greetings, &doc("g", json!({"order": "3"})), now());
        assert_eq!(item.order, None);
    }

    #[test]
    fn test_partition_is_stable() {
        let items = vec![
            ContentItem::new("a", ContentType::Reels, now()),
            ContentItem::new("b", ContentType::Reels, now()).with_order(5),
            ContentItem::new("c", ContentType::Reels, now()),
            ContentItem::new("d", ContentType::Reels, now()).with_order(1),
        ];
        assert_eq!(ids(&partition_ordered(items)), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_merge_partition_keeps_other_types() {
        let old = vec![
            ContentItem::new("r1", ContentType::Reels, now()),
            ContentItem::new("g1", ContentType::Greetings, now()),
            ContentItem::new("r2", ContentType::Reels, now()),
            ContentItem::new("s1", ContentType::Screenshots, now()),
        ];
        let merged = merge_partition(
            &old,
            ContentType::Reels,
            vec![ContentItem::new("r3", ContentType::Reels, now())],
        );
        assert_eq!(ids(&merged), vec!["g1", "s1", "r3"]);

        let cleared = merge_partition(&merged, ContentType::Greetings, Vec::new());
        assert_eq!(ids(&cleared), vec!["s1", "r3"]);
    }

    #[test]
    fn test_apply_snapshot_sorts_globally_under_order_asc() {
        let old = vec![
            ContentItem::new("g1", ContentType::Greetings, now()),
            ContentItem::new("g2", ContentType::Greetings, now()).with_order(4),
        ];
        let snapshot = Snapshot::new(
            ContentType::Reels,
            vec![
                doc("r1", json!({"name": "x"})),
                doc("r2", json!({"order": 1})),
                doc("r3", json!({"order": 0})),
            ],
        );

        let merged = apply_snapshot(&old, &snapshot, SortPolicy::OrderAsc, now());
        assert_eq!(ids(&merged), vec!["r2", "g2", "g1", "r1", "r3"]);

        let merged = apply_snapshot(&old, &snapshot, SortPolicy::CreatedAtDesc, now());
        assert_eq!(ids(&merged), vec!["g1", "g2", "r2", "r1", "r3"]);
    }

    #[test]
    fn test_config_builders() {
        let config = LiveSyncConfig::default()
            .with_sort(SortPolicy::CreatedAtDesc)
            .with_content_types([ContentType::Reels])
            .with_channel_capacity(0);
        assert_eq!(config.sort, SortPolicy::CreatedAtDesc);
        assert_eq!(config.content_types, vec![ContentType::Reels]);
        assert_eq!(config.channel_capacity, 1);
    }

    /// Clock that, once armed, stalls every reading inside the merge step
    struct StallingClock {
        armed: AtomicBool,
        entered: tokio::sync::Notify,
    }

    impl Clock for StallingClock {
        fn now_utc(&self) -> DateTime<Utc> {
            if self.armed.load(Ordering::Acquire) {
                self.entered.notify_one();
                std::thread::sleep(Duration::from_millis(300));
            }
            Utc::now()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_merge_in_flight_during_stop_is_discarded() {
        let store = Arc::new(curate_storage::InMemoryDocumentStore::new());
        let clock = Arc::new(StallingClock {
            armed: AtomicBool::new(false),
            entered: tokio::sync::Notify::new(),
        });
        let live = LiveSyncStore::with_clock(
            store.clone(),
            LiveSyncConfig::default().with_content_types([ContentType::Reels]),
            clock.clone(),
        );
        live.start().await.unwrap();

        // initial empty snapshot
        tokio::time::timeout(Duration::from_secs(2), async {
            while live.merge_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        clock.armed.store(true, Ordering::Release);
        let mut fields = curate_core::Fields::new();
        fields.insert("name".into(), json!("Alice"));
        store.create(ContentType::Reels, fields).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), clock.entered.notified())
            .await
            .unwrap();
        live.stop();
        assert!(live.items().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(live.items().is_empty());
        assert_eq!(live.merge_count(), 1);
    }
}
