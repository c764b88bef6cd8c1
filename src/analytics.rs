// src/analytics.rs

//! Dashboard aggregates.
//!
//! Pure functions over bulk snapshots. Everything is recomputed on each
//! dashboard load; nothing here keeps state.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::classify::{classify_lending, summarize};
use crate::models::{AnalyticsConfig, Book, EffectiveStatus, LendingRecord};

/// Borrow and return counts for one calendar month (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyBucket {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub borrowed: usize,
    pub returned: usize,
}

/// Month index counting from year 0, so month arithmetic is plain integers.
fn month_index(at: DateTime<Utc>) -> i64 {
    i64::from(at.year()) * 12 + i64::from(at.month0())
}

/// Trailing `window` calendar months ending with the current one, oldest
/// first. Months without activity are included with zero counts.
pub fn monthly_series(
    history: &[LendingRecord],
    now: DateTime<Utc>,
    window: u32,
) -> Vec<MonthlyBucket> {
    let current = month_index(now);

    (0..i64::from(window))
        .rev()
        .map(|back| {
            let index = current - back;
            let year = index.div_euclid(12) as i32;
            let month = index.rem_euclid(12) as u32 + 1;
            let borrowed = history
                .iter()
                .filter(|r| month_index(r.borrowed_at) == index)
                .count();
            let returned = history
                .iter()
                .filter_map(|r| r.returned_at)
                .filter(|at| month_index(*at) == index)
                .count();
            MonthlyBucket {
                year,
                month,
                label: format!("{year}-{month:02}"),
                borrowed,
                returned,
            }
        })
        .collect()
}

/// Pie-chart counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusDistribution {
    /// Active and not yet due
    pub borrowed: usize,
    pub overdue: usize,
    /// Returned, ever
    pub returned: usize,
}

pub fn status_distribution(
    active: &[LendingRecord],
    history: &[LendingRecord],
    now: DateTime<Utc>,
) -> StatusDistribution {
    let current = summarize(active, now);
    StatusDistribution {
        borrowed: current.borrowed - current.overdue,
        overdue: current.overdue,
        returned: history.iter().filter(|r| r.is_returned()).count(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BorrowerRanking {
    pub user_id: String,
    pub active: usize,
}

/// Users with the most active borrows, descending. Equal counts keep the
/// order in which the user first appears in `active`.
pub fn top_borrowers(active: &[LendingRecord], limit: usize) -> Vec<BorrowerRanking> {
    let mut ranking: Vec<BorrowerRanking> = Vec::new();
    for record in active.iter().filter(|r| !r.is_returned()) {
        match ranking.iter_mut().find(|r| r.user_id == record.user_id) {
            Some(entry) => entry.active += 1,
            None => ranking.push(BorrowerRanking {
                user_id: record.user_id.clone(),
                active: 1,
            }),
        }
    }
    // sort_by is stable, so ties stay in first-seen order
    ranking.sort_by(|a, b| b.active.cmp(&a.active));
    ranking.truncate(limit);
    ranking
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopyAvailability {
    pub total: u32,
    pub available: u32,
    pub borrowed: u32,
    /// Percentage of copies out, rounded. Zero for an empty catalog.
    pub utilization: u32,
}

pub fn copy_availability(books: &[Book]) -> CopyAvailability {
    let total: u32 = books.iter().map(|b| b.total_copies).sum();
    let available: u32 = books.iter().map(|b| b.available_copies).sum();
    let borrowed = total.saturating_sub(available);
    let utilization = if total == 0 {
        0
    } else {
        (f64::from(borrowed) / f64::from(total) * 100.0).round() as u32
    };
    CopyAvailability {
        total,
        available,
        borrowed,
        utilization,
    }
}

/// One row of the "recent activity" list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRow {
    pub record: LendingRecord,
    pub status: &'static str,
}

/// The `limit` most recently borrowed active records, newest first.
pub fn recent_activity(
    active: &[LendingRecord],
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<ActivityRow> {
    let mut rows: Vec<&LendingRecord> = active.iter().collect();
    rows.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at));
    rows.into_iter()
        .take(limit)
        .map(|record| ActivityRow {
            status: classify_lending(record, now).as_str(),
            record: record.clone(),
        })
        .collect()
}

/// Everything the admin dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub generated_at: DateTime<Utc>,
    pub active_count: usize,
    pub overdue_count: usize,
    pub monthly: Vec<MonthlyBucket>,
    pub distribution: StatusDistribution,
    pub top_borrowers: Vec<BorrowerRanking>,
    pub availability: CopyAvailability,
    pub recent: Vec<ActivityRow>,
}

impl DashboardReport {
    pub fn build(
        active: &[LendingRecord],
        history: &[LendingRecord],
        books: &[Book],
        now: DateTime<Utc>,
        config: &AnalyticsConfig,
        recent_limit: usize,
    ) -> Self {
        let overdue_count = active
            .iter()
            .filter(|r| classify_lending(r, now) == EffectiveStatus::Overdue)
            .count();
        Self {
            generated_at: now,
            active_count: active.len(),
            overdue_count,
            monthly: monthly_series(history, now, config.monthly_window),
            distribution: status_distribution(active, history, now),
            top_borrowers: top_borrowers(active, config.top_borrowers),
            availability: copy_availability(books),
            recent: recent_activity(active, now, recent_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LendingStatus;
    use chrono::{NaiveDate, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn record(id: i64, user: &str, borrowed: DateTime<Utc>, returned: Option<DateTime<Utc>>) -> LendingRecord {
        LendingRecord {
            id,
            user_id: user.into(),
            book_id: format!("B{id:03}"),
            title: "T".into(),
            author: "A".into(),
            borrowed_at: borrowed,
            due_date: borrowed.date_naive() + chrono::TimeDelta::days(14),
            returned_at: returned,
            status: if returned.is_some() {
                LendingStatus::Returned
            } else {
                LendingStatus::Active
            },
        }
    }

    fn book(total: u32, available: u32) -> Book {
        crate::backend::memory::sample_book("B", "T", "A", total, available)
    }

    #[test]
    fn test_empty_history_has_six_zero_buckets() {
        let series = monthly_series(&[], at(2024, 6, 15), 6);
        assert_eq!(series.len(), 6);
        assert!(series.iter().all(|b| b.borrowed == 0 && b.returned == 0));
        assert_eq!(series[0].label, "2024-01");
        assert_eq!(series[5].label, "2024-06");
    }

    #[test]
    fn test_series_crosses_year_boundary() {
        let history = vec![
            record(1, "u1", at(2023, 11, 3), Some(at(2024, 1, 2))),
            record(2, "u1", at(2024, 2, 10), None),
            record(3, "u2", at(2023, 6, 1), None),
        ];
        let series = monthly_series(&history, at(2024, 2, 20), 6);

        let labels: Vec<_> = series.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            ["2023-09", "2023-10", "2023-11", "2023-12", "2024-01", "2024-02"]
        );
        assert_eq!(series[2].borrowed, 1);
        assert_eq!(series[4].returned, 1);
        assert_eq!(series[5].borrowed, 1);
        // June 2023 is outside the window
        assert_eq!(series.iter().map(|b| b.borrowed).sum::<usize>(), 2);
    }

    #[test]
    fn test_ranking_ties_keep_first_seen_order() {
        let active = vec![
            record(1, "u1", at(2024, 6, 1), None),
            record(2, "u2", at(2024, 6, 1), None),
            record(3, "u1", at(2024, 6, 2), None),
            record(4, "u3", at(2024, 6, 2), None),
            record(5, "u2", at(2024, 6, 3), None),
        ];
        let ranking = top_borrowers(&active, 5);
        let flat: Vec<_> = ranking
            .iter()
            .map(|r| (r.user_id.as_str(), r.active))
            .collect();
        assert_eq!(flat, [("u1", 2), ("u2", 2), ("u3", 1)]);
    }

    #[test]
    fn test_ranking_truncates() {
        let active: Vec<_> = (0..8)
            .map(|i| record(i, &format!("u{i}"), at(2024, 6, 1), None))
            .collect();
        assert_eq!(top_borrowers(&active, 5).len(), 5);
    }

    #[test]
    fn test_utilization() {
        assert_eq!(copy_availability(&[]).utilization, 0);
        assert_eq!(copy_availability(&[book(0, 0)]).utilization, 0);

        let stats = copy_availability(&[book(3, 1), book(3, 3)]);
        assert_eq!((stats.total, stats.available, stats.borrowed), (6, 4, 2));
        // 2/6 = 33.3%
        assert_eq!(stats.utilization, 33);
        assert_eq!(copy_availability(&[book(3, 1)]).utilization, 67);
    }

    #[test]
    fn test_distribution() {
        let now = at(2024, 6, 15);
        let active = vec![
            record(1, "u1", at(2024, 6, 10), None),
            record(2, "u1", at(2024, 5, 1), None),
        ];
        let history = vec![
            record(3, "u1", at(2024, 4, 1), Some(at(2024, 4, 5))),
            active[0].clone(),
        ];
        let dist = status_distribution(&active, &history, now);
        assert_eq!(
            dist,
            StatusDistribution {
                borrowed: 1,
                overdue: 1,
                returned: 1
            }
        );
    }

    #[test]
    fn test_report_recent_is_newest_first() {
        let now = at(2024, 6, 15);
        let active: Vec<_> = (1..=12)
            .map(|d| record(d, "u1", at(2024, 6, d as u32), None))
            .collect();
        let config = AnalyticsConfig {
            monthly_window: 6,
            top_borrowers: 5,
        };
        let report = DashboardReport::build(&active, &[], &[], now, &config, 10);

        assert_eq!(report.recent.len(), 10);
        assert_eq!(report.recent[0].record.id, 12);
        assert_eq!(report.active_count, 12);
        // Only the June 1 borrow is past the start of its due date.
        assert_eq!(report.overdue_count, 1);
        assert_eq!(
            report.recent[9].record.due_date,
            NaiveDate::from_ymd_opt(2024, 6, 17).unwrap()
        );
    }
}
