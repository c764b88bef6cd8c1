// src/classify.rs

//! Status classification for lending, reservation and notification records.
//!
//! Every function here is pure: the caller supplies `now`, so list views and
//! the dashboard derive identical statuses from the same snapshot.
//!
//! Due dates are calendar dates. A book becomes overdue at the first instant
//! after midnight (UTC) that starts its due date, so a record whose due
//! instant equals `now` exactly is still `Borrowed`.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::models::{
    EffectiveStatus, LendingRecord, LendingStatus, ReservationRecord, ReservationStatus,
};

/// Milliseconds per day used for whole-day arithmetic.
pub const MS_PER_DAY: i64 = 86_400_000;

/// Default window for flagging reservations about to lapse.
pub const EXPIRING_SOON_DAYS: i64 = 2;

/// The instant a due date starts (midnight UTC).
pub fn due_instant(due_date: NaiveDate) -> DateTime<Utc> {
    due_date.and_time(NaiveTime::MIN).and_utc()
}

/// Strictly after the start of the due date.
pub fn is_past_due(due_date: NaiveDate, now: DateTime<Utc>) -> bool {
    now > due_instant(due_date)
}

/// Derive the user-facing status of a borrow.
pub fn classify_lending(record: &LendingRecord, now: DateTime<Utc>) -> EffectiveStatus {
    if record.returned_at.is_some() || record.status == LendingStatus::Returned {
        EffectiveStatus::Returned
    } else if is_past_due(record.due_date, now) {
        EffectiveStatus::Overdue
    } else {
        EffectiveStatus::Borrowed
    }
}

/// Whole days on loan, floored and never negative.
pub fn days_elapsed(borrowed_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - borrowed_at).num_milliseconds().max(0) / MS_PER_DAY
}

/// Days until `deadline`, rounded up. Negative once the deadline has passed
/// by more than a full day.
pub fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (deadline - now).num_milliseconds();
    let whole = ms.div_euclid(MS_PER_DAY);
    if ms.rem_euclid(MS_PER_DAY) == 0 {
        whole
    } else {
        whole + 1
    }
}

/// Derived view of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationState {
    pub status: ReservationStatus,
    pub expiring_soon: bool,
    pub cancellable: bool,
}

/// Classify a reservation with the default expiring-soon window.
pub fn classify_reservation(record: &ReservationRecord, now: DateTime<Utc>) -> ReservationState {
    classify_reservation_within(record, now, EXPIRING_SOON_DAYS)
}

/// Classify a reservation with a custom expiring-soon window.
pub fn classify_reservation_within(
    record: &ReservationRecord,
    now: DateTime<Utc>,
    window_days: i64,
) -> ReservationState {
    let active = record.status == ReservationStatus::Active;
    let remaining = days_until(record.expires_at, now);

    ReservationState {
        status: record.status,
        expiring_soon: active && (0..=window_days).contains(&remaining),
        cancellable: active,
    }
}

/// Counters shown above the borrow history list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LendingSummary {
    pub total: usize,
    pub borrowed: usize,
    pub returned: usize,
    pub overdue: usize,
}

/// Summarize a history snapshot. `borrowed` counts every record still out,
/// overdue ones included.
pub fn summarize(records: &[LendingRecord], now: DateTime<Utc>) -> LendingSummary {
    records
        .iter()
        .fold(LendingSummary::default(), |mut acc, record| {
            acc.total += 1;
            match classify_lending(record, now) {
                EffectiveStatus::Returned => acc.returned += 1,
                EffectiveStatus::Overdue => {
                    acc.borrowed += 1;
                    acc.overdue += 1;
                }
                EffectiveStatus::Borrowed => acc.borrowed += 1,
            }
            acc
        })
}

/// History list filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryFilter {
    #[default]
    All,
    Borrowed,
    Returned,
    Overdue,
}

impl HistoryFilter {
    pub fn accepts(&self, record: &LendingRecord, now: DateTime<Utc>) -> bool {
        let status = classify_lending(record, now);
        match self {
            Self::All => true,
            Self::Borrowed => status != EffectiveStatus::Returned,
            Self::Returned => status == EffectiveStatus::Returned,
            Self::Overdue => status == EffectiveStatus::Overdue,
        }
    }

    pub fn apply<'a>(
        &self,
        records: &'a [LendingRecord],
        now: DateTime<Utc>,
    ) -> Vec<&'a LendingRecord> {
        records.iter().filter(|r| self.accepts(r, now)).collect()
    }
}

impl std::str::FromStr for HistoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "borrowed" => Ok(Self::Borrowed),
            "returned" => Ok(Self::Returned),
            "overdue" => Ok(Self::Overdue),
            other => Err(format!("unknown history filter '{other}'")),
        }
    }
}

/// Coarse age of a notification for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeAge {
    JustNow,
    Minutes(i64),
    Hours(i64),
    Days(i64),
    On(NaiveDate),
}

pub fn relative_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> RelativeAge {
    let minutes = (now - created_at).num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;

    if minutes < 1 {
        RelativeAge::JustNow
    } else if minutes < 60 {
        RelativeAge::Minutes(minutes)
    } else if hours < 24 {
        RelativeAge::Hours(hours)
    } else if days < 7 {
        RelativeAge::Days(days)
    } else {
        RelativeAge::On(created_at.date_naive())
    }
}

impl fmt::Display for RelativeAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JustNow => write!(f, "just now"),
            Self::Minutes(n) => write!(f, "{n} min ago"),
            Self::Hours(n) => write!(f, "{n} h ago"),
            Self::Days(n) => write!(f, "{n} d ago"),
            Self::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ts(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn lending(due: &str, returned_at: Option<&str>) -> LendingRecord {
        LendingRecord {
            id: 1,
            user_id: "user1".into(),
            book_id: "B001".into(),
            title: "Title".into(),
            author: "Author".into(),
            borrowed_at: ts("2026-03-01T09:00:00Z"),
            due_date: date(due),
            returned_at: returned_at.map(ts),
            status: if returned_at.is_some() {
                LendingStatus::Returned
            } else {
                LendingStatus::Active
            },
        }
    }

    fn reservation(status: ReservationStatus, expires_at: DateTime<Utc>) -> ReservationRecord {
        ReservationRecord {
            id: 1,
            user_id: "user1".into(),
            book_id: "B002".into(),
            title: "Title".into(),
            author: "Author".into(),
            reserved_at: expires_at - Duration::days(7),
            expires_at,
            status,
        }
    }

    #[test]
    fn test_due_instant_exactly_now_is_borrowed() {
        let record = lending("2026-03-15", None);
        let now = ts("2026-03-15T00:00:00Z");
        assert_eq!(classify_lending(&record, now), EffectiveStatus::Borrowed);
    }

    #[test]
    fn test_one_ms_past_midnight_is_overdue() {
        let record = lending("2026-03-15", None);
        let now = ts("2026-03-15T00:00:00.001Z");
        assert_eq!(classify_lending(&record, now), EffectiveStatus::Overdue);
    }

    #[test]
    fn test_due_date_before_now_is_overdue() {
        let record = lending("2026-03-15", None);
        for now in ["2026-03-16T08:00:00Z", "2026-04-01T00:00:00Z", "2027-01-01T00:00:00Z"] {
            assert_eq!(classify_lending(&record, ts(now)), EffectiveStatus::Overdue);
        }
    }

    #[test]
    fn test_before_due_is_borrowed() {
        let record = lending("2026-03-15", None);
        let now = ts("2026-03-14T23:59:59Z");
        assert_eq!(classify_lending(&record, now), EffectiveStatus::Borrowed);
    }

    #[test]
    fn test_returned_wins_over_overdue() {
        let record = lending("2026-03-15", Some("2026-03-20T10:00:00Z"));
        let now = ts("2026-05-01T00:00:00Z");
        assert_eq!(classify_lending(&record, now), EffectiveStatus::Returned);
    }

    #[test]
    fn test_days_elapsed_floors_and_clamps() {
        let borrowed = ts("2026-03-01T09:00:00Z");
        assert_eq!(days_elapsed(borrowed, ts("2026-03-01T20:00:00Z")), 0);
        assert_eq!(days_elapsed(borrowed, ts("2026-03-03T08:59:59Z")), 1);
        assert_eq!(days_elapsed(borrowed, ts("2026-03-03T09:00:00Z")), 2);
        // Clock skew must not produce negative days.
        assert_eq!(days_elapsed(borrowed, ts("2026-02-28T09:00:00Z")), 0);
    }

    #[test]
    fn test_days_until_rounds_up() {
        let now = ts("2026-10-18T12:00:00Z");
        assert_eq!(days_until(now, now), 0);
        assert_eq!(days_until(now + Duration::hours(1), now), 1);
        assert_eq!(days_until(now + Duration::days(2), now), 2);
        assert_eq!(days_until(now + Duration::days(2) + Duration::seconds(1), now), 3);
        assert_eq!(days_until(now - Duration::hours(1), now), 0);
        assert_eq!(days_until(now - Duration::hours(25), now), -1);
    }

    #[test]
    fn test_expiring_soon_window() {
        let now = ts("2026-10-18T12:00:00Z");
        let cases = [
            (now + Duration::hours(5), true),
            (now + Duration::days(2), true),
            (now + Duration::days(2) + Duration::hours(1), false),
            (now + Duration::days(6), false),
            (now - Duration::days(3), false),
        ];
        for (expires_at, expected) in cases {
            let record = reservation(ReservationStatus::Active, expires_at);
            assert_eq!(
                classify_reservation(&record, now).expiring_soon,
                expected,
                "expires_at {expires_at}"
            );
        }
    }

    #[test]
    fn test_terminal_reservations_never_expiring_soon() {
        let now = ts("2026-10-18T12:00:00Z");
        for status in [
            ReservationStatus::Fulfilled,
            ReservationStatus::Expired,
            ReservationStatus::Cancelled,
        ] {
            let state = classify_reservation(&reservation(status, now + Duration::hours(3)), now);
            assert_eq!(state.status, status);
            assert!(!state.expiring_soon);
            assert!(!state.cancellable);
        }
    }

    #[test]
    fn test_summary_and_filters() {
        let now = ts("2026-03-20T00:00:00Z");
        let records = vec![
            lending("2026-03-10", None),
            lending("2026-03-30", None),
            lending("2026-03-12", Some("2026-03-11T10:00:00Z")),
        ];

        let summary = summarize(&records, now);
        assert_eq!(
            summary,
            LendingSummary {
                total: 3,
                borrowed: 2,
                returned: 1,
                overdue: 1,
            }
        );

        assert_eq!(HistoryFilter::Overdue.apply(&records, now).len(), 1);
        assert_eq!(HistoryFilter::Borrowed.apply(&records, now).len(), 2);
        assert_eq!(HistoryFilter::Returned.apply(&records, now).len(), 1);
        assert_eq!(HistoryFilter::All.apply(&records, now).len(), 3);
        assert_eq!("OVERDUE".parse::<HistoryFilter>(), Ok(HistoryFilter::Overdue));
    }

    #[test]
    fn test_relative_age() {
        let now = ts("2026-10-18T12:00:00Z");
        assert_eq!(relative_age(now, now), RelativeAge::JustNow);
        assert_eq!(relative_age(now - Duration::minutes(5), now).to_string(), "5 min ago");
        assert_eq!(relative_age(now - Duration::hours(3), now), RelativeAge::Hours(3));
        assert_eq!(relative_age(now - Duration::days(2), now), RelativeAge::Days(2));
        assert_eq!(
            relative_age(now - Duration::days(10), now).to_string(),
            "2026-10-08"
        );
    }
}
