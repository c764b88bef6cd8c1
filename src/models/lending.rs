//! Lending (borrow) records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::calendar_date;

/// Persisted status of a borrow as stored by the borrow service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LendingStatus {
    /// The book is still out.
    #[serde(rename = "borrowed", alias = "active")]
    Active,
    /// Terminal.
    #[serde(rename = "returned")]
    Returned,
}

/// Status shown to the user, derived from the persisted fields and the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveStatus {
    Borrowed,
    Overdue,
    Returned,
}

impl EffectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Borrowed => "borrowed",
            Self::Overdue => "overdue",
            Self::Returned => "returned",
        }
    }
}

/// A single borrow of a book by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LendingRecord {
    pub id: i64,

    pub user_id: String,

    pub book_id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub author: String,

    pub borrowed_at: DateTime<Utc>,

    /// Calendar due date; the book is overdue from midnight (UTC) of this day.
    #[serde(with = "calendar_date")]
    pub due_date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_at: Option<DateTime<Utc>>,

    pub status: LendingStatus,
}

impl LendingRecord {
    /// `returned_at` is present exactly when the status is `Returned`.
    pub fn is_consistent(&self) -> bool {
        self.returned_at.is_some() == (self.status == LendingStatus::Returned)
    }

    pub fn is_returned(&self) -> bool {
        self.status == LendingStatus::Returned || self.returned_at.is_some()
    }

    /// Mark the record returned at `at`. Returned records are terminal, so a
    /// second call keeps the original return time.
    pub fn mark_returned(&mut self, at: DateTime<Utc>) {
        if self.status == LendingStatus::Returned {
            return;
        }
        self.status = LendingStatus::Returned;
        self.returned_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVE_JSON: &str = r#"{
        "id": 7,
        "user_id": "user1",
        "book_id": "B001",
        "title": "Rust",
        "author": "Ferris",
        "borrowed_at": "2026-03-01T09:30:00Z",
        "due_date": "2026-03-15",
        "status": "borrowed"
    }"#;

    #[test]
    fn test_parse_active_record() {
        let record: LendingRecord = serde_json::from_str(ACTIVE_JSON).unwrap();
        assert_eq!(record.status, LendingStatus::Active);
        assert_eq!(
            record.due_date,
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
        );
        assert!(record.returned_at.is_none());
        assert!(record.is_consistent());
    }

    #[test]
    fn test_due_date_accepts_timestamp_form() {
        let json = ACTIVE_JSON.replace("\"2026-03-15\"", "\"2026-03-15T00:00:00Z\"");
        let record: LendingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(
            record.due_date,
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
        );
    }

    #[test]
    fn test_active_alias() {
        let json = ACTIVE_JSON.replace("\"borrowed\"", "\"active\"");
        let record: LendingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.status, LendingStatus::Active);
    }

    #[test]
    fn test_mark_returned_is_terminal() {
        let mut record: LendingRecord = serde_json::from_str(ACTIVE_JSON).unwrap();
        let first = "2026-03-10T12:00:00Z".parse().unwrap();
        let second = "2026-03-11T12:00:00Z".parse().unwrap();

        record.mark_returned(first);
        record.mark_returned(second);

        assert_eq!(record.status, LendingStatus::Returned);
        assert_eq!(record.returned_at, Some(first));
        assert!(record.is_consistent());
    }

    #[test]
    fn test_serializes_wire_status() {
        let record: LendingRecord = serde_json::from_str(ACTIVE_JSON).unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "borrowed");
        assert_eq!(value["due_date"], "2026-03-15");
        assert!(value.get("returned_at").is_none());
    }
}
