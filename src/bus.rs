//! Process-wide invalidation bus.
//!
//! Mutations publish an [`EventKind`]; mounted views subscribe to the kinds
//! they display and re-fetch when one arrives. Dispatch is synchronous, in
//! subscription order, on the publishing thread.

use std::collections::HashSet;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use crate::error::Result;

/// Closed set of invalidation events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CartChanged,
    LendingChanged,
    ReservationChanged,
    NotificationsChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::CartChanged,
        EventKind::LendingChanged,
        EventKind::ReservationChanged,
        EventKind::NotificationsChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CartChanged => "cart-changed",
            Self::LendingChanged => "lending-changed",
            Self::ReservationChanged => "reservation-changed",
            Self::NotificationsChanged => "notifications-changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Handler = Arc<dyn Fn(EventKind) -> Result<()> + Send + Sync>;

struct Entry {
    id: u64,
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<Entry>,
}

#[derive(Default)]
struct Inner {
    registry: Mutex<Registry>,
    dispatching: Mutex<HashSet<(ThreadId, EventKind)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn is_subscribed(&self, id: u64) -> bool {
        lock(&self.registry).entries.iter().any(|e| e.id == id)
    }

    fn remove(&self, id: u64) {
        lock(&self.registry).entries.retain(|e| e.id != id);
    }
}

/// Marks `(thread, kind)` as being dispatched until dropped.
struct Dispatching<'a> {
    inner: &'a Inner,
    key: (ThreadId, EventKind),
}

impl Drop for Dispatching<'_> {
    fn drop(&mut self) {
        lock(&self.inner.dispatching).remove(&self.key);
    }
}

/// Publish/subscribe hub. Clones share subscribers.
#[derive(Clone, Default)]
pub struct Bus {
    inner: Arc<Inner>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`. The handler stays registered until the
    /// returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(EventKind) -> Result<()> + Send + Sync + 'static,
    {
        let mut registry = lock(&self.inner.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.entries.push(Entry {
            id,
            kind,
            handler: Arc::new(handler),
        });
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
            kind,
        }
    }

    /// Deliver `kind` to every current subscriber. Returns how many handlers
    /// ran to completion without error.
    ///
    /// A handler that publishes the kind it is handling has that publish
    /// dropped. Failing or panicking handlers are logged and skipped.
    pub fn publish(&self, kind: EventKind) -> usize {
        let key = (thread::current().id(), kind);
        if !lock(&self.inner.dispatching).insert(key) {
            log::warn!("Dropped re-entrant publish of {kind}");
            return 0;
        }
        let _dispatching = Dispatching {
            inner: &self.inner,
            key,
        };

        let handlers: Vec<(u64, Handler)> = lock(&self.inner.registry)
            .entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| (e.id, Arc::clone(&e.handler)))
            .collect();

        log::debug!("Publishing {kind} to {} handler(s)", handlers.len());

        let mut delivered = 0;
        for (id, handler) in handlers {
            // An earlier handler may have unsubscribed this one.
            if !self.inner.is_subscribed(id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| handler(kind))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => log::warn!("Handler {id} for {kind} failed: {e}"),
                Err(_) => log::error!("Handler {id} for {kind} panicked"),
            }
        }
        delivered
    }

    /// Number of live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        lock(&self.inner.registry)
            .entries
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

/// Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<Inner>,
    id: u64,
    kind: EventKind,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Unsubscribe now.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.remove(self.id);
        }
    }
}
