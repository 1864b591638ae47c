//! Live collection views.
//!
//! A [`LiveCollection`] mirrors one remote collection in memory. It
//! subscribes once, rebuilds the whole local snapshot from every raw snapshot
//! the store sends, and publishes the result through a `watch` channel.
//!
//! Mutations are never applied locally. They are sent to the store in a
//! spawned task and become visible only when the store echoes the change back
//! through the subscription. Remote failures do not propagate to the caller;
//! they are logged and published as [`Notice`]s.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::expense::{Expense, NewExpense};
use crate::record::{NewRecord, Record, RecordPatch, FAVORITE_FIELD};
use crate::remote::{
    ChangeEvent, Fields, RawSnapshot, RemoteCollection, RemotePath, Subscription,
    SubscriptionHandle,
};

/// A value stored in a collection and identified by its entry key.
pub trait Entry: DeserializeOwned + Clone + Send + Sync + 'static {
    /// The entry key.
    fn id(&self) -> &str;

    /// Attach the entry key after decoding.
    fn set_id(&mut self, id: String);

    /// Human-readable label used for name ordering.
    fn label(&self) -> &str;
}

/// Display order of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPolicy {
    /// Creation order. Push keys encode their creation time, so this is key order.
    #[default]
    Creation,
    /// Case-insensitive label order, ties broken by key.
    Name,
}

impl SortPolicy {
    /// Sort entries in place.
    pub fn apply<T: Entry>(self, entries: &mut [T]) {
        match self {
            Self::Creation => entries.sort_by(|a, b| a.id().cmp(b.id())),
            Self::Name => {
                entries.sort_by_cached_key(|e| (e.label().to_lowercase(), e.id().to_string()));
            }
        }
    }
}

impl fmt::Display for SortPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creation => write!(f, "creation"),
            Self::Name => write!(f, "name"),
        }
    }
}

/// Rebuild a full entry list from a raw snapshot.
///
/// Entries that are not objects or fail to decode are skipped.
#[must_use]
pub fn materialize<T: Entry>(raw: RawSnapshot, sort: SortPolicy) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let mut entries: Vec<T> = raw
        .into_iter()
        .filter_map(|(key, value)| {
            if !value.is_object() {
                warn!(key, "Skipping entry that is not an object");
                return None;
            }
            match serde_json::from_value::<T>(value) {
                Ok(mut entry) => {
                    entry.set_id(key);
                    Some(entry)
                }
                Err(e) => {
                    warn!(key, error = %e, "Skipping entry that failed to decode");
                    None
                }
            }
        })
        .collect();

    sort.apply(&mut entries);
    entries
}

/// Loading state of a view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Waiting for the first snapshot.
    #[default]
    Loading,
    /// At least one snapshot has arrived.
    Ready,
    /// The subscription failed; the view shows an empty state.
    Failed(String),
}

/// The local copy of a collection at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// Entries in display order.
    pub records: Vec<T>,
    /// Loading state.
    pub state: LoadState,
    /// Incremented on every change.
    pub revision: u64,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            state: LoadState::Loading,
            revision: 0,
        }
    }
}

impl<T> Snapshot<T> {
    /// Whether the first snapshot is still pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    /// Whether the view failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.state, LoadState::Failed(_))
    }

    /// Whether the view loaded and holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn replace(&mut self, records: Vec<T>) {
        self.records = records;
        self.state = LoadState::Ready;
        self.revision += 1;
    }

    fn fail(&mut self, message: String) {
        self.records.clear();
        self.state = LoadState::Failed(message);
        self.revision += 1;
    }
}

/// What went wrong, for user-facing notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// The subscription could not be established or broke.
    SubscriptionFailed,
    /// A write, push, or remove was rejected.
    MutationFailed,
}

/// A transient, user-facing failure report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Failure category.
    pub kind: NoticeKind,
    /// Short message for display.
    pub message: String,
    /// Underlying cause.
    pub detail: String,
}

impl Notice {
    fn subscription_failed(path: &str, detail: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::SubscriptionFailed,
            message: format!("Could not load {path}"),
            detail: detail.into(),
        }
    }

    fn mutation_failed(action: &str, detail: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::MutationFailed,
            message: format!("Failed to {action}"),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.detail)
    }
}

/// A fire-and-forget mutation. Resolves to `Some` on success and `None` after
/// a failure was reported as a notice.
pub type Pending<R> = JoinHandle<Option<R>>;

/// A continuously updated local mirror of one remote collection.
pub struct LiveCollection<T: Entry> {
    path: String,
    collection: Option<RemotePath>,
    remote: Arc<dyn RemoteCollection>,
    state: watch::Receiver<Snapshot<T>>,
    notices_tx: mpsc::UnboundedSender<Notice>,
    notices_rx: Option<mpsc::UnboundedReceiver<Notice>>,
    subscription: Option<SubscriptionHandle>,
    pump: Option<JoinHandle<()>>,
}

impl<T: Entry> fmt::Debug for LiveCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveCollection")
            .field("path", &self.path)
            .field("remote", &self.remote)
            .field("revision", &self.state.borrow().revision)
            .field("open", &self.pump.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Entry> LiveCollection<T> {
    /// Subscribe to the collection at `path`.
    ///
    /// Never fails: if the subscription cannot be established the view is
    /// put in [`LoadState::Failed`] with no records and a notice is queued.
    pub async fn open(remote: Arc<dyn RemoteCollection>, path: &str, sort: SortPolicy) -> Self {
        let (state_tx, state) = watch::channel(Snapshot::default());
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();

        let subscribed = Self::subscribe(remote.as_ref(), path).await;

        let (collection, subscription, pump) = match subscribed {
            Ok((parsed, subscription)) => {
                debug!(path, sort = %sort, "Opened live collection");
                let handle = subscription.handle();
                let pump = tokio::spawn(pump::<T>(
                    subscription,
                    state_tx,
                    notices_tx.clone(),
                    sort,
                    path.to_string(),
                ));
                (Some(parsed), Some(handle), Some(pump))
            }
            Err(e) => {
                warn!(path, error = %e, "Subscription failed");
                state_tx.send_modify(|s| s.fail(e.to_string()));
                let _ = notices_tx.send(Notice::subscription_failed(path, e.to_string()));
                (None, None, None)
            }
        };

        Self {
            path: path.to_string(),
            collection,
            remote,
            state,
            notices_tx,
            notices_rx: Some(notices_rx),
            subscription,
            pump,
        }
    }

    async fn subscribe(
        remote: &dyn RemoteCollection,
        path: &str,
    ) -> Result<(RemotePath, Subscription)> {
        let parsed = RemotePath::parse(path)?;
        parsed.require_collection()?;
        let subscription = remote.subscribe(path).await?;
        Ok((parsed, subscription))
    }

    /// The subscribed path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A receiver that observes every snapshot change.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<Snapshot<T>> {
        self.state.clone()
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T> {
        self.state.borrow().clone()
    }

    /// The current entries.
    #[must_use]
    pub fn records(&self) -> Vec<T> {
        self.state.borrow().records.clone()
    }

    /// Wait until the first snapshot arrived or the view failed.
    pub async fn ready(&self) -> Snapshot<T> {
        let mut rx = self.state.clone();
        if rx.wait_for(|s| !s.is_loading()).await.is_err() {
            debug!(path = %self.path, "Live collection closed before loading");
        }
        let snapshot = rx.borrow().clone();
        snapshot
    }

    /// Take the notice receiver. Only the first call returns it.
    pub fn take_notices(&mut self) -> Option<mpsc::UnboundedReceiver<Notice>> {
        self.notices_rx.take()
    }

    /// Look up an entry in the local snapshot.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<T> {
        self.state
            .borrow()
            .records
            .iter()
            .find(|e| e.id() == id)
            .cloned()
    }

    /// Release the subscription.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.cancel();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
            info!(path = %self.path, "Closed live collection");
        }
    }

    fn collection(&self) -> Result<&RemotePath> {
        self.collection.as_ref().ok_or_else(|| Error::Subscription {
            path: self.path.clone(),
            message: "collection is not open".to_string(),
        })
    }

    fn entry_path(&self, id: &str) -> Result<String> {
        if self.get(id).is_none() {
            return Err(Error::record_not_found(id));
        }
        Ok(self.collection()?.child(id).to_string())
    }

    fn spawn_mutation<R, F>(&self, action: &'static str, operation: F) -> Pending<R>
    where
        R: Send + 'static,
        F: Future<Output = Result<R>> + Send + 'static,
    {
        let notices = self.notices_tx.clone();
        tokio::spawn(async move {
            match operation.await {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(action, error = %e, "Mutation failed");
                    // The view may be gone already
                    let _ = notices.send(Notice::mutation_failed(action, e.to_string()));
                    None
                }
            }
        })
    }

    /// Create an entry from raw fields; the store assigns the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the view never opened.
    pub fn create(&self, action: &'static str, fields: Fields) -> Result<Pending<String>> {
        let path = self.collection()?.to_string();
        let remote = Arc::clone(&self.remote);
        Ok(self.spawn_mutation(action, async move { remote.push(&path, fields).await }))
    }

    /// Partially update an entry present in the local snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if `id` is not in the snapshot.
    pub fn update(&self, action: &'static str, id: &str, fields: Fields) -> Result<Pending<()>> {
        let path = self.entry_path(id)?;
        let remote = Arc::clone(&self.remote);
        Ok(self.spawn_mutation(action, async move { remote.write(&path, fields).await }))
    }

    /// Remove an entry present in the local snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if `id` is not in the snapshot.
    pub fn delete(&self, action: &'static str, id: &str) -> Result<Pending<()>> {
        let path = self.entry_path(id)?;
        let remote = Arc::clone(&self.remote);
        Ok(self.spawn_mutation(action, async move { remote.remove(&path).await }))
    }
}

impl<T: Entry> Drop for LiveCollection<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl LiveCollection<Record> {
    /// Flip the favorite flag, based on the value in the local snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if `id` is not in the snapshot.
    pub fn toggle_favorite(&self, id: &str) -> Result<Pending<()>> {
        let current = self
            .get(id)
            .ok_or_else(|| Error::record_not_found(id))?
            .favorite();

        let mut fields = Fields::new();
        fields.insert(FAVORITE_FIELD.to_string(), Value::Bool(!current));
        debug!(id, favorite = !current, "Toggling favorite");
        self.update("update favorite", id, fields)
    }

    /// Validate and create a record.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any remote call when a field is missing.
    pub fn create_record(&self, record: NewRecord) -> Result<Pending<String>> {
        let fields = record.into_fields()?;
        self.create("save location", fields)
    }

    /// Validate and apply a partial edit.
    ///
    /// # Errors
    ///
    /// Returns a validation error or [`Error::RecordNotFound`].
    pub fn update_record(&self, id: &str, patch: RecordPatch) -> Result<Pending<()>> {
        let fields = patch.into_fields()?;
        self.update("update location", id, fields)
    }

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if `id` is not in the snapshot.
    pub fn delete_record(&self, id: &str) -> Result<Pending<()>> {
        self.delete("delete location", id)
    }
}

impl LiveCollection<Expense> {
    /// Validate and record an expense.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any remote call.
    pub fn add_expense(&self, expense: NewExpense) -> Result<Pending<String>> {
        let fields = expense.into_fields()?;
        self.create("save expense", fields)
    }
}

async fn pump<T: Entry>(
    mut subscription: Subscription,
    state: watch::Sender<Snapshot<T>>,
    notices: mpsc::UnboundedSender<Notice>,
    sort: SortPolicy,
    path: String,
) {
    while let Some(event) = subscription.recv().await {
        match event {
            ChangeEvent::Value(raw) => {
                let records = materialize::<T>(raw, sort);
                debug!(path, count = records.len(), "Snapshot updated");
                state.send_modify(|s| s.replace(records));
            }
            ChangeEvent::Error(message) => {
                warn!(path, error = %message, "Subscription reported an error");
                state.send_modify(|s| s.fail(message.clone()));
                let _ = notices.send(Notice::subscription_failed(&path, message));
            }
        }
    }
    debug!(path, "Subscription ended");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::derive::{favorite_filter, text_filter};
    use crate::storage::SqliteStore;

    const WAIT: Duration = Duration::from_secs(5);

    /// A store whose every operation fails.
    #[derive(Debug)]
    struct Offline;

    #[async_trait::async_trait]
    impl RemoteCollection for Offline {
        async fn subscribe(&self, path: &str) -> Result<Subscription> {
            Err(Error::Subscription {
                path: path.to_string(),
                message: "network unreachable".to_string(),
            })
        }

        async fn write(&self, _path: &str, _fields: Fields) -> Result<()> {
            Err(Error::remote("network unreachable"))
        }

        async fn push(&self, _path: &str, _fields: Fields) -> Result<String> {
            Err(Error::remote("network unreachable"))
        }

        async fn remove(&self, _path: &str) -> Result<()> {
            Err(Error::remote("network unreachable"))
        }
    }

    /// A store that serves reads from SQLite but rejects every write.
    #[derive(Debug)]
    struct ReadOnly(Arc<SqliteStore>);

    #[async_trait::async_trait]
    impl RemoteCollection for ReadOnly {
        async fn subscribe(&self, path: &str) -> Result<Subscription> {
            self.0.subscribe(path).await
        }

        async fn write(&self, _path: &str, _fields: Fields) -> Result<()> {
            Err(Error::remote("permission denied"))
        }

        async fn push(&self, _path: &str, _fields: Fields) -> Result<String> {
            Err(Error::remote("permission denied"))
        }

        async fn remove(&self, _path: &str) -> Result<()> {
            Err(Error::remote("permission denied"))
        }
    }

    /// A store that hands out one prepared subscription and accepts writes.
    #[derive(Debug)]
    struct Scripted(std::sync::Mutex<Option<Subscription>>);

    #[async_trait::async_trait]
    impl RemoteCollection for Scripted {
        async fn subscribe(&self, _path: &str) -> Result<Subscription> {
            self.0
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| Error::remote("already subscribed"))
        }

        async fn write(&self, _path: &str, _fields: Fields) -> Result<()> {
            Ok(())
        }

        async fn push(&self, _path: &str, _fields: Fields) -> Result<String> {
            Ok("k".to_string())
        }

        async fn remove(&self, _path: &str) -> Result<()> {
            Ok(())
        }
    }

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    async fn seeded_store(entries: &[serde_json::Value]) -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        for entry in entries {
            store.push("points", fields(entry.clone())).await.unwrap();
        }
        store
    }

    async fn open_points(store: Arc<SqliteStore>) -> LiveCollection<Record> {
        let view = LiveCollection::open(store, "points", SortPolicy::Creation).await;
        view.ready().await;
        view
    }

    async fn wait_for<T: Entry>(
        view: &LiveCollection<T>,
        predicate: impl FnMut(&Snapshot<T>) -> bool,
    ) -> Snapshot<T> {
        let mut rx = view.changes();
        let snapshot = tokio::time::timeout(WAIT, rx.wait_for(predicate))
            .await
            .expect("timed out waiting for snapshot")
            .expect("view closed")
            .clone();
        snapshot
    }

    fn record(id: &str, name: &str, favorite: Option<bool>) -> Record {
        Record {
            id: id.to_string(),
            name: name.to_string(),
            coordinates: "0,0".to_string(),
            accuracy: None,
            is_favorite: favorite,
        }
    }

    #[test]
    fn test_materialize_tags_keys_and_sorts() {
        let raw = fields(json!({
            "b": {"name": "Borobudur"},
            "a": {"name": "Kuta Beach", "isFavorite": true}
        }));
        let records: Vec<Record> = materialize(Some(raw), SortPolicy::Creation);

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(records[0].is_favorite, Some(true));
    }

    #[test]
    fn test_materialize_absent_is_empty() {
        let records: Vec<Record> = materialize(None, SortPolicy::Creation);
        assert!(records.is_empty());
    }

    #[test]
    fn test_materialize_skips_malformed_entries() {
        let raw = fields(json!({
            "a": {"name": "Kept"},
            "b": "just a string",
            "c": {"name": 42}
        }));
        let records: Vec<Record> = materialize(Some(raw), SortPolicy::Creation);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "a");
    }

    #[test]
    fn test_sort_by_name_ignores_case() {
        let mut records = vec![
            record("1", "ubud", None),
            record("2", "Amed", None),
            record("3", "Kuta", None),
        ];
        SortPolicy::Name.apply(&mut records);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Amed", "Kuta", "ubud"]);
    }

    #[test]
    fn test_sort_policy_display() {
        assert_eq!(SortPolicy::Creation.to_string(), "creation");
        assert_eq!(SortPolicy::Name.to_string(), "name");
    }

    #[tokio::test]
    async fn test_open_empty_collection_is_ready_not_failed() {
        let store = seeded_store(&[]).await;
        let view = open_points(store).await;

        let snapshot = view.snapshot();
        assert_eq!(snapshot.state, LoadState::Ready);
        assert!(snapshot.is_empty());
        assert!(!snapshot.is_failed());
    }

    #[tokio::test]
    async fn test_open_failure_reports_notice_and_empty_state() {
        let mut view: LiveCollection<Record> =
            LiveCollection::open(Arc::new(Offline), "points", SortPolicy::Creation).await;

        let snapshot = view.ready().await;
        assert!(snapshot.is_failed());
        assert!(snapshot.is_empty());

        let mut notices = view.take_notices().unwrap();
        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::SubscriptionFailed);
        assert!(notice.detail.contains("network unreachable"));
    }

    #[tokio::test]
    async fn test_open_rejects_entry_path() {
        let store = seeded_store(&[]).await;
        let view: LiveCollection<Record> =
            LiveCollection::open(store, "points/abc", SortPolicy::Creation).await;
        assert!(view.snapshot().is_failed());
    }

    #[tokio::test]
    async fn test_create_record_appears_after_echo() {
        let store =
            seeded_store(&[json!({"name": "Kuta Beach", "coordinates": "-8.71,115.16"})]).await;
        let view = open_points(store).await;
        let before: Vec<String> = view.records().into_iter().map(|r| r.id).collect();

        let key = view
            .create_record(NewRecord::new("Eiffel Tower", "48.8584,2.2945", "5 m"))
            .unwrap()
            .await
            .unwrap()
            .expect("push failed");

        let snapshot = wait_for(&view, |s| s.records.len() == 2).await;
        let created: Vec<&Record> = snapshot
            .records
            .iter()
            .filter(|r| !before.contains(&r.id))
            .collect();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].id, key);
        assert_eq!(created[0].name, "Eiffel Tower");
        assert_eq!(created[0].coordinates, "48.8584,2.2945");
        assert_eq!(created[0].accuracy.as_deref(), Some("5 m"));
    }

    #[tokio::test]
    async fn test_create_record_validation_happens_before_remote() {
        let view: LiveCollection<Record> =
            LiveCollection::open(Arc::new(Offline), "points", SortPolicy::Creation).await;

        let err = view.create_record(NewRecord::new("", "", "")).unwrap_err();
        assert_eq!(err.field_errors().map(<[_]>::len), Some(3));
    }

    #[tokio::test]
    async fn test_toggle_favorite_round_trip() {
        let store =
            seeded_store(&[json!({"name": "Borobudur", "coordinates": "-7.6,110.2"})]).await;
        let view = open_points(store).await;
        let id = view.records()[0].id.clone();
        assert!(view.records()[0].is_favorite.is_none());

        view.toggle_favorite(&id).unwrap().await.unwrap();
        let snapshot = wait_for(&view, |s| s.records[0].is_favorite == Some(true)).await;
        assert!(snapshot.records[0].favorite());

        view.toggle_favorite(&id).unwrap().await.unwrap();
        let snapshot = wait_for(&view, |s| s.records[0].is_favorite == Some(false)).await;
        assert!(!snapshot.records[0].favorite());
    }

    #[tokio::test]
    async fn test_toggle_is_not_applied_locally() {
        let store = seeded_store(&[json!({"name": "A", "coordinates": "1,2"})]).await;
        let mut view: LiveCollection<Record> =
            LiveCollection::open(Arc::new(ReadOnly(store)), "points", SortPolicy::Creation).await;
        view.ready().await;
        let mut notices = view.take_notices().unwrap();
        let id = view.records()[0].id.clone();
        let revision = view.snapshot().revision;

        let outcome = view.toggle_favorite(&id).unwrap().await.unwrap();
        assert!(outcome.is_none());

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::MutationFailed);
        assert_eq!(notice.message, "Failed to update favorite");

        let snapshot = view.snapshot();
        assert_eq!(snapshot.revision, revision);
        assert!(snapshot.records[0].is_favorite.is_none());
    }

    #[tokio::test]
    async fn test_notice_after_close_is_dropped_quietly() {
        let store = seeded_store(&[json!({"name": "A", "coordinates": "1,2"})]).await;
        let view: LiveCollection<Record> =
            LiveCollection::open(Arc::new(ReadOnly(store)), "points", SortPolicy::Creation).await;
        view.ready().await;
        let id = view.records()[0].id.clone();

        let pending = view.delete_record(&id).unwrap();
        drop(view);
        assert_eq!(pending.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_error_after_subscribe_fails_then_recovers() {
        let (notifier, subscription) = Subscription::channel();
        let remote = Arc::new(Scripted(std::sync::Mutex::new(Some(subscription))));
        let mut view: LiveCollection<Record> =
            LiveCollection::open(remote, "points", SortPolicy::Creation).await;
        let mut notices = view.take_notices().unwrap();

        assert!(notifier.send(ChangeEvent::Value(Some(fields(json!({
            "a": {"name": "Kuta Beach", "coordinates": "-8.718,115.1686"}
        }))))));
        let snapshot = wait_for(&view, |s| s.state == LoadState::Ready).await;
        assert_eq!(snapshot.records.len(), 1);

        assert!(notifier.send(ChangeEvent::Error("permission denied".to_string())));
        let snapshot = wait_for(&view, Snapshot::is_failed).await;
        assert!(snapshot.records.is_empty());
        assert_eq!(
            snapshot.state,
            LoadState::Failed("permission denied".to_string())
        );

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::SubscriptionFailed);
        assert_eq!(notice.message, "Could not load points");
        assert_eq!(notice.detail, "permission denied");

        assert!(notifier.send(ChangeEvent::Value(Some(fields(json!({
            "a": {"name": "Kuta Beach", "coordinates": "-8.718,115.1686"},
            "b": {"name": "Borobudur", "coordinates": "-7.6079,110.2038"}
        }))))));
        let snapshot = wait_for(&view, |s| s.state == LoadState::Ready).await;
        assert_eq!(snapshot.records.len(), 2);
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_editing_legacy_accuracy_keeps_record_listed() {
        let store = seeded_store(&[json!({
            "name": "Tanah Lot",
            "coordinates": "-8.62,115.08",
            "accuration": "12 m"
        })])
        .await;
        let view = open_points(store).await;
        let legacy = view.records();
        assert_eq!(legacy[0].accuracy.as_deref(), Some("12 m"));
        let id = legacy[0].id.clone();

        let patch = RecordPatch {
            accuracy: Some("3 m".to_string()),
            ..RecordPatch::default()
        };
        let outcome = view.update_record(&id, patch).unwrap().await.unwrap();
        assert_eq!(outcome, Some(()));

        let snapshot = wait_for(&view, |s| s.revision > 1).await;
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].id, id);
        assert_eq!(snapshot.records[0].name, "Tanah Lot");
        assert_eq!(snapshot.records[0].accuracy.as_deref(), Some("3 m"));
    }

    #[tokio::test]
    async fn test_toggle_unknown_id_is_rejected() {
        let store = seeded_store(&[]).await;
        let view = open_points(store).await;
        let err = view.toggle_favorite("missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one() {
        let store = seeded_store(&[
            json!({"name": "A", "coordinates": "1,1"}),
            json!({"name": "B", "coordinates": "2,2"}),
            json!({"name": "C", "coordinates": "3,3"}),
        ])
        .await;
        let view = open_points(store).await;
        let before = view.records();
        let victim = before[1].id.clone();

        view.delete_record(&victim).unwrap().await.unwrap();
        let snapshot = wait_for(&view, |s| s.records.len() == 2).await;

        let remaining: Vec<&Record> = snapshot.records.iter().collect();
        assert!(remaining.iter().all(|r| r.id != victim));
        assert_eq!(remaining[0], &before[0]);
        assert_eq!(remaining[1], &before[2]);
    }

    #[tokio::test]
    async fn test_update_record_preserves_other_fields() {
        let store = seeded_store(&[json!({
            "name": "Ubud",
            "coordinates": "-8.5,115.26",
            "accuracy": "20 m",
            "isFavorite": true
        })])
        .await;
        let view = open_points(store).await;
        let id = view.records()[0].id.clone();

        let patch = RecordPatch {
            name: Some("Ubud Palace".to_string()),
            ..RecordPatch::default()
        };
        let outcome = view.update_record(&id, patch).unwrap().await.unwrap();
        assert_eq!(outcome, Some(()));

        let snapshot = wait_for(&view, |s| s.records[0].name == "Ubud Palace").await;
        let updated = &snapshot.records[0];
        assert_eq!(updated.id, id);
        assert_eq!(updated.coordinates, "-8.5,115.26");
        assert_eq!(updated.accuracy.as_deref(), Some("20 m"));
        assert_eq!(updated.is_favorite, Some(true));
    }

    #[tokio::test]
    async fn test_views_on_same_store_observe_each_other() {
        let store = seeded_store(&[]).await;
        let list = open_points(Arc::clone(&store)).await;
        let favorites = open_points(Arc::clone(&store)).await;

        list.create_record(NewRecord::new("Kuta Beach", "-8.71,115.16", "5 m"))
            .unwrap()
            .await
            .unwrap();
        let snapshot = wait_for(&favorites, |s| s.records.len() == 1).await;
        let id = snapshot.records[0].id.clone();

        favorites.toggle_favorite(&id).unwrap().await.unwrap();
        let snapshot = wait_for(&list, |s| s.records.first().is_some_and(Record::favorite)).await;
        assert_eq!(favorite_filter(&snapshot.records).len(), 1);
        assert_eq!(text_filter(&snapshot.records, "kuta").len(), 1);
    }

    #[tokio::test]
    async fn test_close_releases_subscription() {
        let store = seeded_store(&[]).await;
        let view = open_points(Arc::clone(&store)).await;
        assert_eq!(store.subscriber_count(), 1);

        view.close();
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_mutation_outlives_closed_view() {
        let store = seeded_store(&[json!({"name": "A", "coordinates": "1,2"})]).await;
        let view = open_points(Arc::clone(&store)).await;
        let id = view.records()[0].id.clone();

        let pending = view.delete_record(&id).unwrap();
        view.close();

        assert_eq!(pending.await.unwrap(), Some(()));
        let reopened = open_points(store).await;
        assert!(reopened.records().is_empty());
    }

    #[tokio::test]
    async fn test_expense_collection_uses_same_view() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let view: LiveCollection<Expense> =
            LiveCollection::open(store, "expenses", SortPolicy::Creation).await;
        view.ready().await;

        view.add_expense(NewExpense::new("Lunch", "50000").on("2026-10-17"))
            .unwrap()
            .await
            .unwrap();

        let snapshot = wait_for(&view, |s| s.records.len() == 1).await;
        assert_eq!(snapshot.records[0].description, "Lunch");
        assert!((snapshot.records[0].amount - 50000.0).abs() < f64::EPSILON);
    }
}
