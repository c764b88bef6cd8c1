//! Unread-notification polling.
//!
//! One poller runs per authenticated session. It polls immediately, then on a
//! fixed interval, with at most one request outstanding. Failures are logged
//! and retried on the next tick; a 401 ends the session, which stops the
//! poller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::error::AppError;
use crate::session::{Session, SessionSlot};
use crate::store::Store;

/// Everything a poller needs, owned for the lifetime of the task.
pub struct PollTarget {
    pub backend: Arc<dyn Backend>,
    pub sessions: Arc<SessionSlot>,
    pub store: Arc<Store>,
    pub session: Arc<Session>,
}

/// Handle to a running poller. Dropping it stops the task.
pub struct UnreadPoller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl UnreadPoller {
    /// Start polling. Must be called from within a tokio runtime.
    pub fn spawn(target: PollTarget, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(target, interval, cancel.clone()));
        Self { cancel, handle }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for UnreadPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Resolves once `session` is no longer the current one.
async fn session_ended(
    rx: &mut watch::Receiver<Option<Arc<Session>>>,
    session: &Arc<Session>,
) {
    let _ = rx
        .wait_for(|current| !matches!(current, Some(active) if Arc::ptr_eq(active, session)))
        .await;
}

async fn run(target: PollTarget, interval: Duration, cancel: CancellationToken) {
    let PollTarget {
        backend,
        sessions,
        store,
        session,
    } = target;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut watcher = sessions.subscribe();
    let mut idle_since: Option<Instant> = None;

    log::info!(
        "Unread poller started for {} (interval={:?})",
        session.user_id(),
        interval
    );

    loop {
        let scheduled = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = session_ended(&mut watcher, &session) => break,
            at = ticker.tick() => at,
        };

        // A tick that came due while the previous poll was in flight is skipped.
        if idle_since.is_some_and(|idle| scheduled < idle) {
            log::debug!("Skipping overlapping unread poll tick");
            continue;
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = session_ended(&mut watcher, &session) => break,
            result = backend.unread_count(&session) => result,
        };
        idle_since = Some(Instant::now());

        match sessions.check(&session, result) {
            Ok(count) => {
                log::debug!("Unread count for {}: {}", session.user_id(), count);
                store.set_unread(count);
            }
            Err(AppError::SessionExpired) => {
                store.clear();
                break;
            }
            Err(e) => log::warn!("Unread poll failed: {e}"),
        }
    }

    log::info!("Unread poller stopped for {}", session.user_id());
}
