// src/store.rs

//! Session-scoped snapshots of server state.
//!
//! The store is not a cache: every read-triggering event re-fetches from the
//! owning service and swaps the snapshot wholesale. A failed fetch leaves the
//! previous snapshot in place.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;

use crate::error::Result;
use crate::models::{CartItem, LendingRecord, Notification, ReservationRecord};

/// One immutable generation of a collection.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub items: Arc<Vec<T>>,
    pub version: u64,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            version: self.version,
        }
    }
}

/// Latest snapshot of one entity kind.
///
/// Cloning yields another handle to the same collection.
pub struct Collection<T> {
    name: &'static str,
    tx: Arc<watch::Sender<Snapshot<T>>>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> Collection<T> {
    pub fn new(name: &'static str) -> Self {
        let (tx, _) = watch::channel(Snapshot {
            items: Arc::new(Vec::new()),
            version: 0,
        });
        Self {
            name,
            tx: Arc::new(tx),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Latest records. Never blocks on a fetch.
    pub fn get(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.tx.borrow().items)
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.tx.borrow().clone()
    }

    /// Number of replacements so far.
    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    /// Swap in a new snapshot, then notify subscribers.
    pub fn replace(&self, records: Vec<T>) -> Arc<Vec<T>> {
        let items = Arc::new(records);
        let shared = Arc::clone(&items);
        self.tx.send_modify(|snapshot| {
            snapshot.items = shared;
            snapshot.version += 1;
        });
        log::debug!(
            "Store {} replaced ({} records, version {})",
            self.name,
            items.len(),
            self.version()
        );
        items
    }

    /// Drop all records.
    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.tx.subscribe()
    }

    /// Run `fetch` and replace the snapshot with its result. On failure the
    /// previous snapshot is kept and the error goes back to the caller only.
    pub async fn refresh<F>(&self, fetch: F) -> Result<Arc<Vec<T>>>
    where
        F: Future<Output = Result<Vec<T>>>,
    {
        match fetch.await {
            Ok(records) => Ok(self.replace(records)),
            Err(e) => {
                log::warn!("Fetch for {} failed, keeping previous snapshot: {}", self.name, e);
                Err(e)
            }
        }
    }
}

/// Clears one scoped collection; false once the collection is gone.
type Clearer = Box<dyn Fn() -> bool + Send + Sync>;

/// Every collection the client keeps for the active session.
///
/// The named collections hold one query each and are shared by every view of
/// that query. Views whose query is a parameter (catalog search, copies of
/// one book) get a [`Store::scoped`] collection of their own instead.
pub struct Store {
    pub cart: Collection<CartItem>,
    pub borrows: Collection<LendingRecord>,
    pub history: Collection<LendingRecord>,
    pub reservations: Collection<ReservationRecord>,
    pub notifications: Collection<Notification>,
    pub admin_active: Collection<LendingRecord>,
    pub admin_history: Collection<LendingRecord>,
    scoped: Mutex<Vec<Clearer>>,
    unread: watch::Sender<u32>,
}

impl Store {
    pub fn new() -> Self {
        let (unread, _) = watch::channel(0);
        Self {
            cart: Collection::new("cart"),
            borrows: Collection::new("borrows"),
            history: Collection::new("history"),
            reservations: Collection::new("reservations"),
            notifications: Collection::new("notifications"),
            admin_active: Collection::new("admin_active"),
            admin_history: Collection::new("admin_history"),
            scoped: Mutex::new(Vec::new()),
            unread,
        }
    }

    /// A collection private to one view but still wiped by [`Store::clear`].
    pub fn scoped<T: Send + Sync + 'static>(&self, name: &'static str) -> Collection<T> {
        let collection = Collection::new(name);
        let weak: Weak<watch::Sender<Snapshot<T>>> = Arc::downgrade(&collection.tx);
        self.scoped_clearers().push(Box::new(move || match weak.upgrade() {
            Some(tx) => {
                Collection { name, tx }.clear();
                true
            }
            None => false,
        }));
        collection
    }

    fn scoped_clearers(&self) -> std::sync::MutexGuard<'_, Vec<Clearer>> {
        self.scoped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn unread(&self) -> u32 {
        *self.unread.borrow()
    }

    pub fn set_unread(&self, count: u32) {
        self.unread.send_replace(count);
    }

    pub fn subscribe_unread(&self) -> watch::Receiver<u32> {
        self.unread.subscribe()
    }

    /// Discard everything fetched under the previous session.
    pub fn clear(&self) {
        self.cart.clear();
        self.borrows.clear();
        self.history.clear();
        self.reservations.clear();
        self.notifications.clear();
        self.admin_active.clear();
        self.admin_history.clear();
        self.scoped_clearers().retain(|clear| clear());
        self.set_unread(0);
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
