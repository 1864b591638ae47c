//! Remote collection client abstraction.
//!
//! A remote collection is a key-value store of JSON objects grouped under
//! top-level collection names. Clients subscribe to a collection and receive
//! the full raw snapshot immediately and again after every change.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Field map written to or read from a single entry.
pub type Fields = Map<String, Value>;

/// The raw state of a collection: entry key to entry value, or `None` when the
/// collection holds nothing.
pub type RawSnapshot = Option<Map<String, Value>>;

/// A notification delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// The current contents of the subscribed collection.
    Value(RawSnapshot),
    /// The channel reported a failure.
    Error(String),
}

/// A parsed `collection` or `collection/key` path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath {
    collection: String,
    key: Option<String>,
}

impl RemotePath {
    /// Parse a path, ignoring leading and trailing slashes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for empty paths, empty segments, or
    /// paths nested deeper than one entry.
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(Error::invalid_path(path, "path is empty"));
        }

        let mut segments = trimmed.split('/');
        let collection = segments.next().unwrap_or_default();
        let key = segments.next();
        if segments.next().is_some() {
            return Err(Error::invalid_path(path, "only collection/key paths are supported"));
        }
        if collection.is_empty() || key.is_some_and(str::is_empty) {
            return Err(Error::invalid_path(path, "empty path segment"));
        }

        Ok(Self {
            collection: collection.to_string(),
            key: key.map(str::to_string),
        })
    }

    /// Path to a whole collection.
    #[must_use]
    pub fn collection_path(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: None,
        }
    }

    /// The collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The entry key, if this path names an entry.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Path to an entry inside this collection.
    #[must_use]
    pub fn child(&self, key: impl Into<String>) -> Self {
        Self {
            collection: self.collection.clone(),
            key: Some(key.into()),
        }
    }

    /// Require this path to name an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] when the path names a collection.
    pub fn entry(&self) -> Result<(&str, &str)> {
        match &self.key {
            Some(key) => Ok((&self.collection, key)),
            None => Err(Error::invalid_path(self.to_string(), "expected collection/key")),
        }
    }

    /// Require this path to name a collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] when the path names an entry.
    pub fn require_collection(&self) -> Result<&str> {
        if self.key.is_some() {
            return Err(Error::invalid_path(self.to_string(), "expected a collection"));
        }
        Ok(&self.collection)
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}/{key}", self.collection),
            None => f.write_str(&self.collection),
        }
    }
}

/// A cloneable flag shared by a subscription and its producer.
///
/// Cancelling from either side stops further deliveries.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    active: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stop deliveries.
    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Whether deliveries are still wanted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Producer side of a subscription, held by the store.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<ChangeEvent>,
    handle: SubscriptionHandle,
}

impl Notifier {
    /// Deliver an event. Returns `false` once the subscriber is gone, after
    /// which the notifier should be discarded.
    pub fn send(&self, event: ChangeEvent) -> bool {
        if !self.handle.is_active() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Whether the subscriber is still listening.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_active() && !self.tx.is_closed()
    }
}

/// Consumer side of a subscription.
///
/// Dropping it releases the subscription.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    handle: SubscriptionHandle,
}

impl Subscription {
    /// Create a connected notifier and subscription pair.
    #[must_use]
    pub fn channel() -> (Notifier, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle::new();
        (
            Notifier {
                tx,
                handle: handle.clone(),
            },
            Subscription { rx, handle },
        )
    }

    /// Wait for the next event. Returns `None` once the producer is gone or
    /// the subscription was cancelled.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        if !self.handle.is_active() {
            return None;
        }
        self.rx.recv().await
    }

    /// A handle that can cancel this subscription from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Release the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.cancel();
        self.rx.close();
    }
}

/// Client for a remote key-value collection store.
///
/// Every operation is asynchronous. Subscriptions deliver the current state
/// first and then each later change in the order the store emits them.
#[async_trait::async_trait]
pub trait RemoteCollection: Send + Sync + fmt::Debug {
    /// Subscribe to a collection path.
    async fn subscribe(&self, path: &str) -> Result<Subscription>;

    /// Partially update the entry at `collection/key`. Fields not named are
    /// preserved; a `null` value removes the field.
    async fn write(&self, path: &str, fields: Fields) -> Result<()>;

    /// Create an entry in a collection with a store-assigned key.
    async fn push(&self, path: &str, fields: Fields) -> Result<String>;

    /// Remove an entry or a whole collection.
    async fn remove(&self, path: &str) -> Result<()>;
}
