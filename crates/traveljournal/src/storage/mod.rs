//! Storage layer for traveljournal.
//!
//! [`SqliteStore`] implements [`RemoteCollection`] on top of a local `SQLite`
//! database. Every committed change is pushed to the subscribers of the
//! affected collection; commits made by other processes are picked up by
//! [`SqliteStore::watch_external_changes`].

pub mod migrations;
pub mod push_id;
pub mod schema;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::remote::{
    ChangeEvent, Fields, Notifier, RawSnapshot, RemoteCollection, RemotePath, Subscription,
};

use push_id::PushIdGenerator;

/// A subscriber registered for one collection.
#[derive(Debug)]
struct Subscriber {
    collection: String,
    notifier: Notifier,
}

/// Collection store backed by `SQLite`.
///
/// Construct one per process and share it behind an [`Arc`].
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
    /// Live subscriptions.
    subscribers: Mutex<Vec<Subscriber>>,
    /// Key generator for pushed entries.
    push_ids: PushIdGenerator,
}

impl SqliteStore {
    /// Open or create a store database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let mut conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets other processes read while we write
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&mut conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self::from_connection(path, conn))
    }

    /// Create an in-memory store, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&mut conn)?;

        Ok(Self::from_connection(PathBuf::from(":memory:"), conn))
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Self {
        Self {
            path,
            conn: Mutex::new(conn),
            subscribers: Mutex::new(Vec::new()),
            push_ids: PushIdGenerator::new(),
        }
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers().map_or(0, |mut subs| {
            subs.retain(|s| s.notifier.is_active());
            subs.len()
        })
    }

    /// Spawn a task that re-notifies every subscriber whenever another
    /// process commits to the database.
    ///
    /// The task ends by itself once the store is dropped.
    #[must_use]
    pub fn watch_external_changes(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last_version = None;

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("Store dropped, stopping external change watcher");
                    break;
                };
                if let Err(e) = store.check_external_change(&mut last_version) {
                    warn!(error = %e, "Error checking for external changes");
                }
            }
        })
    }

    fn check_external_change(&self, last_version: &mut Option<i64>) -> Result<()> {
        let conn = self.connection()?;
        let version: i64 = conn.query_row("PRAGMA data_version", [], |row| row.get(0))?;

        let changed = last_version.is_some_and(|last| last != version);
        *last_version = Some(version);
        if changed {
            debug!(version, "Database changed by another connection");
            self.notify_all(&conn)?;
        }
        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database lock poisoned"))
    }

    fn subscribers(&self) -> Result<MutexGuard<'_, Vec<Subscriber>>> {
        self.subscribers
            .lock()
            .map_err(|_| Error::internal("subscriber lock poisoned"))
    }

    /// Read a whole collection, ordered by key.
    fn read_collection(conn: &Connection, collection: &str) -> Result<RawSnapshot> {
        let mut stmt = conn.prepare_cached(
            "SELECT key, value FROM entries WHERE collection = ?1 ORDER BY key",
        )?;
        let rows = stmt
            .query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut snapshot = Map::new();
        for (key, value) in rows {
            snapshot.insert(key, serde_json::from_str(&value)?);
        }
        Ok(Some(snapshot))
    }

    fn read_entry(conn: &Connection, collection: &str, key: &str) -> Result<Option<Fields>> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM entries WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()?;

        match value.map(|v| serde_json::from_str::<Value>(&v)).transpose()? {
            Some(Value::Object(fields)) => Ok(Some(fields)),
            Some(_) | None => Ok(None),
        }
    }

    /// Send the current state of `collection` to its subscribers, dropping
    /// subscribers that have gone away.
    fn notify(&self, conn: &Connection, collection: &str) -> Result<()> {
        let mut subscribers = self.subscribers()?;
        subscribers.retain(|s| s.notifier.is_active());
        if !subscribers.iter().any(|s| s.collection == collection) {
            return Ok(());
        }

        let event = match Self::read_collection(conn, collection) {
            Ok(snapshot) => ChangeEvent::Value(snapshot),
            Err(e) => {
                warn!(collection, error = %e, "Failed to read collection for subscribers");
                ChangeEvent::Error(e.to_string())
            }
        };

        let mut delivered = 0usize;
        subscribers.retain(|s| {
            if s.collection != collection {
                return true;
            }
            let kept = s.notifier.send(event.clone());
            delivered += usize::from(kept);
            kept
        });
        trace!(collection, delivered, "Notified subscribers");
        Ok(())
    }

    fn notify_all(&self, conn: &Connection) -> Result<()> {
        let collections: BTreeSet<String> = self
            .subscribers()?
            .iter()
            .map(|s| s.collection.clone())
            .collect();
        for collection in collections {
            self.notify(conn, &collection)?;
        }
        Ok(())
    }

    fn subscribe_now(&self, path: &str) -> Result<Subscription> {
        let path = RemotePath::parse(path)?;
        let collection = path.require_collection()?;

        // Holding the connection lock orders the initial snapshot before any
        // change committed afterwards.
        let conn = self.connection()?;
        let snapshot = Self::read_collection(&conn, collection)?;

        let (notifier, subscription) = Subscription::channel();
        notifier.send(ChangeEvent::Value(snapshot));
        self.subscribers()?.push(Subscriber {
            collection: collection.to_string(),
            notifier,
        });

        debug!(collection, "Subscribed");
        Ok(subscription)
    }

    fn write_now(&self, path: &str, fields: Fields) -> Result<()> {
        let path = RemotePath::parse(path)?;
        let (collection, key) = path.entry()?;

        let conn = self.connection()?;
        let mut value = Self::read_entry(&conn, collection, key)?.unwrap_or_default();
        for (field, new_value) in fields {
            if new_value.is_null() {
                value.remove(&field);
            } else {
                value.insert(field, new_value);
            }
        }

        let now = Utc::now().to_rfc3339();
        if value.is_empty() {
            // An entry without fields does not exist
            conn.execute(
                "DELETE FROM entries WHERE collection = ?1 AND key = ?2",
                params![collection, key],
            )?;
        } else {
            conn.execute(
                r"
                INSERT INTO entries (collection, key, value, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT (collection, key)
                DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                ",
                params![collection, key, Value::Object(value).to_string(), now],
            )?;
        }

        debug!(collection, key, "Updated entry");
        self.notify(&conn, collection)
    }

    fn push_now(&self, path: &str, fields: Fields) -> Result<String> {
        let path = RemotePath::parse(path)?;
        let collection = path.require_collection()?;
        if fields.is_empty() {
            return Err(Error::remote("cannot push an entry without fields"));
        }

        let key = self.push_ids.next_id();
        let now = Utc::now().to_rfc3339();

        let conn = self.connection()?;
        conn.execute(
            r"
            INSERT INTO entries (collection, key, value, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ",
            params![collection, key, Value::Object(fields).to_string(), now],
        )?;

        debug!(collection, key, "Pushed entry");
        self.notify(&conn, collection)?;
        Ok(key)
    }

    fn remove_now(&self, path: &str) -> Result<()> {
        let path = RemotePath::parse(path)?;

        let conn = self.connection()?;
        let affected = match path.key() {
            Some(key) => conn.execute(
                "DELETE FROM entries WHERE collection = ?1 AND key = ?2",
                params![path.collection(), key],
            )?,
            None => conn.execute(
                "DELETE FROM entries WHERE collection = ?1",
                [path.collection()],
            )?,
        };

        debug!(path = %path, affected, "Removed");
        self.notify(&conn, path.collection())
    }
}

#[async_trait::async_trait]
impl RemoteCollection for SqliteStore {
    async fn subscribe(&self, path: &str) -> Result<Subscription> {
        self.subscribe_now(path)
    }

    async fn write(&self, path: &str, fields: Fields) -> Result<()> {
        self.write_now(path, fields)
    }

    async fn push(&self, path: &str, fields: Fields) -> Result<String> {
        self.push_now(path, fields)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.remove_now(path)
    }
}
