//! Unread badge and notification dropdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::bus::EventKind;
use crate::classify::{RelativeAge, relative_age};
use crate::engine::Engine;
use crate::error::Result;
use crate::models::{Notification, latest_first, unread_count};
use crate::views::{Synced, ViewScope, fetcher};

/// Header badge showing the unread count.
///
/// The session's poller keeps the count current; the badge additionally
/// re-fetches right after a read/delete action so it does not lag a poll.
pub struct UnreadBadge {
    engine: Arc<Engine>,
    count: watch::Receiver<u32>,
    scope: ViewScope,
}

impl UnreadBadge {
    pub fn mount(engine: Arc<Engine>) -> Self {
        let scope = ViewScope::new();
        let token = scope.token();
        let weak = Arc::downgrade(&engine);
        let subscription = engine
            .bus()
            .subscribe(EventKind::NotificationsChanged, move |_| {
                let (Some(engine), Ok(handle)) = (weak.upgrade(), Handle::try_current()) else {
                    return Ok(());
                };
                let token = token.clone();
                handle.spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        result = engine.refresh_unread() => {
                            if let Err(e) = result {
                                log::debug!("Unread refresh failed: {e}");
                            }
                        }
                    }
                });
                Ok(())
            });
        scope.hold(subscription);

        Self {
            count: engine.store().subscribe_unread(),
            engine,
            scope,
        }
    }

    pub fn count(&self) -> u32 {
        *self.count.borrow()
    }

    /// Wait for the next change of the count.
    pub async fn changed(&mut self) -> Option<u32> {
        self.count.changed().await.ok()?;
        Some(*self.count.borrow_and_update())
    }

    pub async fn refresh(&self) -> Result<u32> {
        self.engine.refresh_unread().await
    }

    pub fn teardown(&self) {
        self.scope.close();
    }
}

/// One dropdown entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRow {
    pub notification: Notification,
    pub age: RelativeAge,
}

/// The notification dropdown. The list is fetched when the panel opens, not
/// on a timer; while open it follows notification events.
pub struct NotificationPanel {
    feed: Synced<Notification>,
    open: AtomicBool,
    limit: usize,
}

impl NotificationPanel {
    pub fn mount(engine: Arc<Engine>) -> Self {
        let limit = engine.config().display.notification_limit;
        let collection = engine.store().notifications.clone();
        let feed = Synced::mount(
            engine,
            collection,
            &[EventKind::NotificationsChanged],
            fetcher(|b, s| async move { b.notifications(&s).await }),
        );
        feed.set_eager(false);
        Self {
            feed,
            open: AtomicBool::new(false),
            limit,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Open the panel. Opening an already open panel does not fetch again.
    pub async fn open(&self) -> Result<Vec<Notification>> {
        if self.open.swap(true, Ordering::SeqCst) {
            return Ok(self.items());
        }
        self.feed.set_eager(true);
        match self.feed.refresh().await {
            Ok(_) => Ok(self.items()),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.feed.set_eager(false);
    }

    /// Latest list, newest first, capped at the display limit.
    pub fn items(&self) -> Vec<Notification> {
        latest_first(self.feed.snapshot().to_vec(), self.limit)
    }

    pub fn rows(&self, now: DateTime<Utc>) -> Vec<NotificationRow> {
        self.items()
            .into_iter()
            .map(|notification| NotificationRow {
                age: relative_age(notification.created_at, now),
                notification,
            })
            .collect()
    }

    /// Unread entries in the loaded list.
    pub fn unread(&self) -> usize {
        unread_count(&self.feed.snapshot())
    }

    pub async fn mark_read(&self, notification_id: i64) -> Result<()> {
        self.feed.engine().mark_read(notification_id).await
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.feed.engine().mark_all_read().await
    }

    pub async fn delete(&self, notification_id: i64) -> Result<()> {
        self.feed.engine().delete_notification(notification_id).await
    }

    pub fn teardown(&self) {
        self.close();
        self.feed.teardown();
    }
}
