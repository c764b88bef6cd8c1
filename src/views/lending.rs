//! Borrow list and history views.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::bus::EventKind;
use crate::classify::{
    HistoryFilter, LendingSummary, classify_lending, days_elapsed, days_until, due_instant,
    summarize,
};
use crate::engine::Engine;
use crate::error::Result;
use crate::models::{EffectiveStatus, LendingRecord};
use crate::views::{Synced, fetcher};

/// A lending with its derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct BorrowRow {
    pub record: LendingRecord,
    pub status: EffectiveStatus,
    pub days_elapsed: i64,
    /// Days until the due date starts; negative once overdue
    pub days_left: i64,
}

impl BorrowRow {
    pub fn derive(record: &LendingRecord, now: DateTime<Utc>) -> Self {
        Self {
            status: classify_lending(record, now),
            days_elapsed: days_elapsed(record.borrowed_at, now),
            days_left: days_until(due_instant(record.due_date), now),
            record: record.clone(),
        }
    }
}

fn rows(records: &[LendingRecord], now: DateTime<Utc>) -> Vec<BorrowRow> {
    records.iter().map(|r| BorrowRow::derive(r, now)).collect()
}

/// Active borrows: the caller's own, or every user's for administrators.
pub struct BorrowList {
    feed: Synced<LendingRecord>,
}

impl BorrowList {
    pub fn mine(engine: Arc<Engine>) -> Self {
        let collection = engine.store().borrows.clone();
        Self {
            feed: Synced::mount(
                engine,
                collection,
                &[EventKind::LendingChanged],
                fetcher(|b, s| async move { b.active_borrows(&s).await }),
            ),
        }
    }

    pub fn all(engine: Arc<Engine>) -> Self {
        let collection = engine.store().admin_active.clone();
        Self {
            feed: Synced::mount(
                engine,
                collection,
                &[EventKind::LendingChanged],
                fetcher(|b, s| async move {
                    s.require_admin()?;
                    b.admin_active_borrows(&s).await
                }),
            ),
        }
    }

    pub async fn load(&self, now: DateTime<Utc>) -> Result<Vec<BorrowRow>> {
        let records = self.feed.read().await?;
        Ok(rows(&records, now))
    }

    pub fn rows(&self, now: DateTime<Utc>) -> Vec<BorrowRow> {
        rows(&self.feed.snapshot(), now)
    }

    pub fn feed(&self) -> &Synced<LendingRecord> {
        &self.feed
    }

    pub fn teardown(&self) {
        self.feed.teardown();
    }
}

/// One filtered page of history plus the summary counters.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub summary: LendingSummary,
    pub rows: Vec<BorrowRow>,
}

pub struct HistoryView {
    feed: Synced<LendingRecord>,
}

impl HistoryView {
    pub fn mine(engine: Arc<Engine>) -> Self {
        let collection = engine.store().history.clone();
        Self {
            feed: Synced::mount(
                engine,
                collection,
                &[EventKind::LendingChanged],
                fetcher(|b, s| async move { b.borrow_history(&s).await }),
            ),
        }
    }

    pub fn all(engine: Arc<Engine>) -> Self {
        let collection = engine.store().admin_history.clone();
        Self {
            feed: Synced::mount(
                engine,
                collection,
                &[EventKind::LendingChanged],
                fetcher(|b, s| async move {
                    s.require_admin()?;
                    b.admin_borrow_history(&s).await
                }),
            ),
        }
    }

    pub async fn load(&self, filter: HistoryFilter, now: DateTime<Utc>) -> Result<HistoryPage> {
        let records = self.feed.read().await?;
        Ok(HistoryPage {
            summary: summarize(&records, now),
            rows: filter
                .apply(&records, now)
                .into_iter()
                .map(|r| BorrowRow::derive(r, now))
                .collect(),
        })
    }

    pub fn feed(&self) -> &Synced<LendingRecord> {
        &self.feed
    }

    pub fn teardown(&self) {
        self.feed.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::fixed_now;
    use crate::error::AppError;
    use crate::views::testing::{library, settle, signed_in};
    use chrono::TimeDelta;

    #[tokio::test]
    async fn test_return_is_visible_on_next_read() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        let list = BorrowList::mine(Arc::clone(&engine));
        let history = HistoryView::mine(Arc::clone(&engine));

        engine.borrow_by_id("B001").await.unwrap();
        let rows = list.load(fixed_now()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, EffectiveStatus::Borrowed);
        assert_eq!(rows[0].days_left, 14);

        engine.return_book("B001").await.unwrap();
        assert!(list.load(fixed_now()).await.unwrap().is_empty());

        let page = history.load(HistoryFilter::All, fixed_now()).await.unwrap();
        assert_eq!(page.rows[0].status, EffectiveStatus::Returned);
        assert_eq!(page.summary.returned, 1);
        assert!(page.rows[0].record.returned_at.is_some());
    }

    #[tokio::test]
    async fn test_overdue_rows() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        backend.seed_lending("user1", "B003", fixed_now() - TimeDelta::days(20), None);
        let list = BorrowList::mine(Arc::clone(&engine));

        let rows = list.load(fixed_now()).await.unwrap();
        assert_eq!(rows[0].status, EffectiveStatus::Overdue);
        assert_eq!(rows[0].days_elapsed, 20);

        let history = HistoryView::mine(engine);
        let page = history
            .load(HistoryFilter::Overdue, fixed_now())
            .await
            .unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.summary.overdue, 1);
    }

    #[tokio::test]
    async fn test_admin_list_covers_every_user() {
        let backend = library();
        backend.seed_lending("user1", "B001", fixed_now(), None);
        backend.seed_lending("user2", "B003", fixed_now(), None);
        let admin = signed_in(&backend, "admin", "admin123").await;

        let list = BorrowList::all(Arc::clone(&admin));
        assert_eq!(list.load(fixed_now()).await.unwrap().len(), 2);

        admin.admin_return(list.rows(fixed_now())[0].record.id).await.unwrap();
        settle().await;
        assert_eq!(list.rows(fixed_now()).len(), 1);
    }

    #[tokio::test]
    async fn test_admin_list_refused_for_users() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        let list = BorrowList::all(engine);
        assert!(matches!(
            list.load(fixed_now()).await,
            Err(AppError::Forbidden)
        ));
        assert_eq!(backend.calls("admin_active_borrows"), 0);
    }
}
