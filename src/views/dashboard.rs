use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::analytics::DashboardReport;
use crate::bus::EventKind;
use crate::engine::Engine;
use crate::error::{AppError, Result};
use crate::models::BookFilters;
use crate::views::ViewScope;

/// Admin dashboard.
///
/// Loads active lendings, lending history and the catalog together and
/// derives every chart from that one fetch. Any failed source fails the whole
/// load with a single [`AppError::Dashboard`]. The catalog stays local to the
/// report since search views keep their own results.
pub struct Dashboard {
    engine: Arc<Engine>,
    scope: ViewScope,
    stale: Arc<AtomicBool>,
    report: Mutex<Option<Arc<DashboardReport>>>,
}

impl Dashboard {
    pub fn mount(engine: Arc<Engine>) -> Self {
        let scope = ViewScope::new();
        let stale = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&stale);
        scope.hold(engine.bus().subscribe(EventKind::LendingChanged, move |_| {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }));
        Self {
            engine,
            scope,
            stale,
            report: Mutex::new(None),
        }
    }

    pub async fn load(&self) -> Result<Arc<DashboardReport>> {
        self.load_at(Utc::now()).await
    }

    pub async fn load_at(&self, now: DateTime<Utc>) -> Result<Arc<DashboardReport>> {
        if !self.scope.is_open() {
            return Err(AppError::Unmounted);
        }
        self.engine.sessions().require()?.require_admin()?;

        let engine = &self.engine;
        let sources = async {
            futures::try_join!(
                engine.authed_admin(|b, s| async move { b.admin_active_borrows(&s).await }),
                engine.authed_admin(|b, s| async move { b.admin_borrow_history(&s).await }),
                engine.authed_admin(|b, s| async move {
                    b.list_books(&s, &BookFilters::default()).await
                }),
            )
        };
        let token = self.scope.token();
        let fetched = tokio::select! {
            _ = token.cancelled() => return Err(AppError::Unmounted),
            result = sources => result,
        };

        let (active, history, books) = fetched.map_err(|e| {
            log::warn!("Dashboard load failed: {e}");
            if e.ends_session() {
                AppError::SessionExpired
            } else {
                AppError::Dashboard(e.user_message())
            }
        })?;

        let store = self.engine.store();
        let active = store.admin_active.replace(active);
        let history = store.admin_history.replace(history);

        let config = self.engine.config();
        let report = Arc::new(DashboardReport::build(
            &active,
            &history,
            &books,
            now,
            &config.analytics,
            config.display.recent_activity_limit,
        ));
        self.stale.store(false, Ordering::SeqCst);
        *self.report.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&report));
        Ok(report)
    }

    /// Last successfully built report.
    pub fn report(&self) -> Option<Arc<DashboardReport>> {
        self.report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a lending event arrived since the last load.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    pub fn teardown(&self) {
        self.scope.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{Failure, fixed_now};
    use crate::views::testing::{library, signed_in};

    #[tokio::test]
    async fn test_empty_library_has_full_window() {
        let backend = library();
        let admin = signed_in(&backend, "admin", "admin123").await;
        let dashboard = Dashboard::mount(admin);

        let report = dashboard.load_at(fixed_now()).await.unwrap();
        assert_eq!(report.monthly.len(), 6);
        assert_eq!(report.monthly[5].label, "2024-06");
        assert!(report.monthly.iter().all(|b| b.borrowed == 0 && b.returned == 0));
        assert_eq!(report.active_count, 0);
        assert_eq!(report.availability.total, 4);
        assert!(!dashboard.is_stale());
    }

    #[tokio::test]
    async fn test_lending_marks_stale() {
        let backend = library();
        let admin = signed_in(&backend, "admin", "admin123").await;
        let dashboard = Dashboard::mount(Arc::clone(&admin));
        dashboard.load_at(fixed_now()).await.unwrap();

        admin.borrow_by_id("B001").await.unwrap();
        assert!(dashboard.is_stale());
        let report = dashboard.load_at(fixed_now()).await.unwrap();
        assert_eq!(report.active_count, 1);
        assert_eq!(report.top_borrowers[0].user_id, "admin");
    }

    #[tokio::test]
    async fn test_one_failed_source_fails_whole_load() {
        let backend = library();
        let admin = signed_in(&backend, "admin", "admin123").await;
        let dashboard = Dashboard::mount(admin);

        backend.fail_next("admin_borrow_history", Failure::ServerFault);
        let err = dashboard.load_at(fixed_now()).await.unwrap_err();
        assert!(matches!(err, AppError::Dashboard(_)));
        assert!(dashboard.report().is_none());
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        let dashboard = Dashboard::mount(engine);

        let err = dashboard.load_at(fixed_now()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(backend.calls("admin_active_borrows"), 0);
    }
}
