//! Headless view-models.
//!
//! A view is mounted against an [`Engine`], subscribes to the invalidation
//! events it cares about and exposes snapshots. An event marks the view stale
//! and starts a background re-fetch; [`Synced::read`] re-fetches itself when
//! the view is still stale. Tearing a view down (or dropping it) cancels its
//! scope: in-flight fetches are abandoned and never touch the store.

mod cart;
mod catalog;
mod copies;
mod dashboard;
mod lending;
mod notifications;
mod reservations;

pub use cart::CartView;
pub use catalog::CatalogView;
pub use copies::CopyManager;
pub use dashboard::Dashboard;
pub use lending::{BorrowList, BorrowRow, HistoryPage, HistoryView};
pub use notifications::{NotificationPanel, NotificationRow, UnreadBadge};
pub use reservations::{ReservationList, ReservationRow};

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::bus::{EventKind, Subscription};
use crate::engine::Engine;
use crate::error::{AppError, Result};
use crate::session::Session;
use crate::store::Collection;

/// Lifetime of a mounted view: its cancellation token and subscriptions.
pub struct ViewScope {
    cancel: CancellationToken,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ViewScope {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn hold(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription);
    }

    pub fn is_open(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Cancel outstanding work and drop every subscription.
    pub fn close(&self) {
        self.cancel.cancel();
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Produces a fresh record list for a view.
pub type Fetcher<T> = Arc<dyn Fn(Arc<Engine>) -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;

/// Build a [`Fetcher`] from a backend call.
pub fn fetcher<T, F, Fut>(op: F) -> Fetcher<T>
where
    T: Send + 'static,
    F: Fn(Arc<dyn Backend>, Arc<Session>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    Arc::new(move |engine: Arc<Engine>| {
        let op = op.clone();
        async move { engine.authed(op).await }.boxed()
    })
}

/// Shared state of a [`Synced`] view, reachable from bus handlers.
struct Feed<T> {
    engine: Arc<Engine>,
    collection: Collection<T>,
    fetch: Fetcher<T>,
    /// Bumped by every invalidation
    wanted: AtomicU64,
    /// Highest `wanted` value a completed fetch has covered
    have: AtomicU64,
    /// Sequence number handed to each fetch as it starts
    issued: AtomicU64,
    /// Sequence number of the fetch whose records are in the collection
    applied: Mutex<u64>,
    /// Whether invalidations start a background fetch
    eager: AtomicBool,
    cancel: CancellationToken,
}

impl<T: Send + Sync + 'static> Feed<T> {
    fn is_stale(&self) -> bool {
        self.have.load(Ordering::SeqCst) < self.wanted.load(Ordering::SeqCst)
    }

    async fn refresh(&self) -> Result<Arc<Vec<T>>> {
        let target = self.wanted.load(Ordering::SeqCst);
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let fetch = (self.fetch)(Arc::clone(&self.engine));

        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AppError::Unmounted),
            result = fetch => result,
        };
        if self.cancel.is_cancelled() {
            return Err(AppError::Unmounted);
        }

        match fetched {
            Ok(records) => {
                let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
                if seq < *applied {
                    log::debug!(
                        "Dropping superseded refresh of {}",
                        self.collection.name()
                    );
                    return Ok(self.collection.get());
                }
                *applied = seq;
                let items = self.collection.replace(records);
                self.have.fetch_max(target, Ordering::SeqCst);
                Ok(items)
            }
            Err(e) => {
                log::warn!(
                    "Refresh of {} failed, keeping previous snapshot: {}",
                    self.collection.name(),
                    e
                );
                Err(e)
            }
        }
    }

    fn invalidate(self: &Arc<Self>, kind: EventKind) {
        self.wanted.fetch_add(1, Ordering::SeqCst);
        if !self.eager.load(Ordering::SeqCst) {
            return;
        }
        // Outside a runtime the view stays stale until its next read.
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let feed = Arc::clone(self);
        handle.spawn(async move {
            if let Err(e) = feed.refresh().await {
                log::debug!("Background refresh after {kind} failed: {e}");
            }
        });
    }
}

/// A view over one store collection, kept in sync through the bus.
pub struct Synced<T> {
    feed: Arc<Feed<T>>,
    scope: ViewScope,
}

impl<T: Send + Sync + 'static> Synced<T> {
    pub fn mount(
        engine: Arc<Engine>,
        collection: Collection<T>,
        events: &[EventKind],
        fetch: Fetcher<T>,
    ) -> Self {
        let scope = ViewScope::new();
        let feed = Arc::new(Feed {
            engine,
            collection,
            fetch,
            wanted: AtomicU64::new(1),
            have: AtomicU64::new(0),
            issued: AtomicU64::new(0),
            applied: Mutex::new(0),
            eager: AtomicBool::new(true),
            cancel: scope.token(),
        });

        for &kind in events {
            let weak: Weak<Feed<T>> = Arc::downgrade(&feed);
            let subscription = feed.engine.bus.subscribe(kind, move |kind| {
                if let Some(feed) = weak.upgrade() {
                    feed.invalidate(kind);
                }
                Ok(())
            });
            scope.hold(subscription);
        }

        Self { feed, scope }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.feed.engine
    }

    /// Latest snapshot, re-fetched first if the view is stale.
    pub async fn read(&self) -> Result<Arc<Vec<T>>> {
        if self.feed.is_stale() {
            self.refresh().await
        } else {
            Ok(self.snapshot())
        }
    }

    /// Re-fetch unconditionally.
    pub async fn refresh(&self) -> Result<Arc<Vec<T>>> {
        if !self.scope.is_open() {
            return Err(AppError::Unmounted);
        }
        self.feed.refresh().await
    }

    /// Latest snapshot without fetching.
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.feed.collection.get()
    }

    pub fn is_stale(&self) -> bool {
        self.feed.is_stale()
    }

    /// Mark stale without fetching.
    pub fn invalidate(&self) {
        self.feed.wanted.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether invalidations start a background fetch.
    pub fn set_eager(&self, eager: bool) {
        self.feed.eager.store(eager, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.scope.is_open()
    }

    pub fn teardown(&self) {
        self.scope.close();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{library, settle, signed_in};
    use super::*;
    use crate::backend::memory::{Failure, fixed_now};
    use crate::models::LendingRecord;
    use crate::session::Credentials;
    use std::time::Duration;

    fn borrows(engine: &Arc<Engine>) -> Synced<LendingRecord> {
        Synced::mount(
            Arc::clone(engine),
            engine.store().borrows.clone(),
            &[EventKind::LendingChanged],
            fetcher(|b, s| async move { b.active_borrows(&s).await }),
        )
    }

    #[tokio::test]
    async fn test_first_read_fetches_then_serves_snapshot() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        let view = borrows(&engine);

        assert!(view.is_stale());
        view.read().await.unwrap();
        view.read().await.unwrap();
        assert_eq!(backend.calls("active_borrows"), 1);
    }

    #[tokio::test]
    async fn test_event_triggers_background_refresh() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        let view = borrows(&engine);
        view.read().await.unwrap();

        engine.borrow_by_id("B001").await.unwrap();
        settle().await;

        assert!(!view.is_stale());
        assert_eq!(view.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        engine.borrow_by_id("B001").await.unwrap();
        let view = borrows(&engine);
        view.read().await.unwrap();
        let version = engine.store().borrows.version();

        backend.fail_next("active_borrows", Failure::Network);
        view.invalidate();
        assert!(view.read().await.is_err());
        assert_eq!(view.snapshot().len(), 1);
        assert_eq!(engine.store().borrows.version(), version);
        assert!(view.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_after_teardown_are_discarded() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        let view = borrows(&engine);
        view.read().await.unwrap();
        let version = engine.store().borrows.version();

        backend.set_latency(Some(Duration::from_secs(5)));
        engine.borrow_by_id("B001").await.unwrap();
        settle().await;
        view.teardown();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.store().borrows.version(), version);
        assert!(matches!(view.refresh().await, Err(AppError::Unmounted)));
        assert_eq!(engine.bus().subscriber_count(EventKind::LendingChanged), 0);
    }

    #[tokio::test]
    async fn test_lazy_view_only_marks_stale() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        let view = borrows(&engine);
        view.read().await.unwrap();
        view.set_eager(false);

        engine.borrow_by_id("B001").await.unwrap();
        settle().await;
        assert!(view.is_stale());
        assert_eq!(backend.calls("active_borrows"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_older_refresh_does_not_overwrite_newer() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let fetch: Fetcher<u64> = Arc::new(move |_engine: Arc<Engine>| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let delay = if n == 0 { 5 } else { 1 };
                tokio::time::sleep(Duration::from_secs(delay)).await;
                Ok::<_, AppError>(vec![n])
            }
            .boxed()
        });
        let view = Synced::mount(
            Arc::clone(&engine),
            Collection::new("numbers"),
            &[EventKind::LendingChanged],
            fetch,
        );

        engine.bus().publish(EventKind::LendingChanged);
        settle().await;
        engine.bus().publish(EventKind::LendingChanged);
        settle().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*view.snapshot(), vec![1]);
        assert!(!view.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_from_previous_session_is_dropped() {
        let backend = library();
        backend.seed_lending("user1", "B001", fixed_now(), None);
        let engine = signed_in(&backend, "user1", "pw").await;
        let slow = fetcher(|b, s| async move {
            let answer = b.active_borrows(&s).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            answer
        });
        let view: Synced<LendingRecord> = Synced::mount(
            Arc::clone(&engine),
            engine.store().borrows.clone(),
            &[EventKind::LendingChanged],
            slow,
        );

        engine.bus().publish(EventKind::LendingChanged);
        settle().await;
        engine.logout().await.unwrap();
        engine.login(&Credentials::new("user2", "pw")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(engine.store().borrows.get().is_empty());
        assert!(view.is_stale());
    }
}
