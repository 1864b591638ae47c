//! In-memory store of captured photos.
//!
//! The store is created once and shared by `Arc` with whoever needs it.
//! Listeners are called after every change, outside the internal lock, so a
//! listener may read the store.
//!
//! This is library surface for front ends that capture images. The `tjournal`
//! CLI has no camera and keeps no photos between runs, so it does not use it.
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! use traveljournal::photos::{PhotoStore, StoredPhoto};
//!
//! let store = Arc::new(PhotoStore::new());
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! let listener = store.add_listener(move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! store.add_photo(StoredPhoto {
//!     uri: "file:///photos/kuta.jpg".to_string(),
//!     latitude: -8.718,
//!     longitude: 115.1686,
//! });
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! assert_eq!(store.photos()[0].position().latitude, -8.718);
//! assert!(store.remove_listener(listener));
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::maps::Coordinates;

/// A captured photo and where it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPhoto {
    /// Location of the image data.
    pub uri: String,
    /// Degrees north.
    pub latitude: f64,
    /// Degrees east.
    pub longitude: f64,
}

impl StoredPhoto {
    /// Where the photo was taken.
    #[must_use]
    pub fn position(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Inner {
    photos: Vec<StoredPhoto>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

/// Observable list of photos.
#[derive(Default)]
pub struct PhotoStore {
    inner: Mutex<Inner>,
}

impl fmt::Debug for PhotoStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("PhotoStore")
            .field("photos", &inner.photos.len())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl PhotoStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a photo and notify listeners.
    pub fn add_photo(&self, photo: StoredPhoto) {
        debug!(uri = %photo.uri, "Adding photo");
        self.update(|photos| photos.push(photo));
    }

    /// Replace all photos and notify listeners.
    pub fn set_photos(&self, photos: Vec<StoredPhoto>) {
        self.update(|current| *current = photos);
    }

    /// Current photos.
    #[must_use]
    pub fn photos(&self) -> Vec<StoredPhoto> {
        self.lock().photos.clone()
    }

    /// Register a change listener.
    pub fn add_listener(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
        let mut inner = self.lock();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Unregister a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(existing, _)| *existing != id);
        inner.listeners.len() != before
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, change: impl FnOnce(&mut Vec<StoredPhoto>)) {
        let listeners: Vec<Listener> = {
            let mut inner = self.lock();
            change(&mut inner.photos);
            inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            listener();
        }
    }
}
