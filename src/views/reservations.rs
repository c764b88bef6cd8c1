use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::bus::EventKind;
use crate::classify::{ReservationState, classify_reservation_within, days_until};
use crate::engine::Engine;
use crate::error::Result;
use crate::models::ReservationRecord;
use crate::views::{Synced, fetcher};

#[derive(Debug, Clone, PartialEq)]
pub struct ReservationRow {
    pub record: ReservationRecord,
    pub state: ReservationState,
    pub days_left: i64,
}

/// The caller's reservations. A borrow can fulfil a reservation, so lending
/// events invalidate this list too.
pub struct ReservationList {
    feed: Synced<ReservationRecord>,
    window_days: i64,
}

impl ReservationList {
    pub fn mount(engine: Arc<Engine>) -> Self {
        let window_days = engine.config().display.expiring_soon_days;
        let collection = engine.store().reservations.clone();
        Self {
            feed: Synced::mount(
                engine,
                collection,
                &[EventKind::ReservationChanged, EventKind::LendingChanged],
                fetcher(|b, s| async move { b.reservations(&s).await }),
            ),
            window_days,
        }
    }

    fn derive(&self, records: &[ReservationRecord], now: DateTime<Utc>) -> Vec<ReservationRow> {
        records
            .iter()
            .map(|record| ReservationRow {
                state: classify_reservation_within(record, now, self.window_days),
                days_left: days_until(record.expires_at, now),
                record: record.clone(),
            })
            .collect()
    }

    pub async fn load(&self, now: DateTime<Utc>) -> Result<Vec<ReservationRow>> {
        let records = self.feed.read().await?;
        Ok(self.derive(&records, now))
    }

    pub fn rows(&self, now: DateTime<Utc>) -> Vec<ReservationRow> {
        self.derive(&self.feed.snapshot(), now)
    }

    pub fn teardown(&self) {
        self.feed.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::fixed_now;
    use crate::models::ReservationStatus;
    use crate::views::testing::{library, signed_in};
    use chrono::TimeDelta;

    #[tokio::test]
    async fn test_expiring_soon_and_cancel() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        let list = ReservationList::mount(Arc::clone(&engine));

        engine.reserve("B002").await.unwrap();
        let rows = list.load(fixed_now()).await.unwrap();
        assert_eq!(rows[0].days_left, 7);
        assert!(!rows[0].state.expiring_soon);
        assert!(rows[0].state.cancellable);

        let later = fixed_now() + TimeDelta::days(6);
        assert!(list.rows(later)[0].state.expiring_soon);

        engine.cancel_reservation(&rows[0].record).await.unwrap();
        let rows = list.load(later).await.unwrap();
        assert_eq!(rows[0].state.status, ReservationStatus::Cancelled);
        assert!(!rows[0].state.expiring_soon);
        assert!(!rows[0].state.cancellable);
    }
}
