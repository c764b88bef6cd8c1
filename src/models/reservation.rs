//! Reservation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reservation lifecycle. Everything but `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Active,
    Fulfilled,
    Expired,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Fulfilled => "fulfilled",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// A hold placed on a book with no available copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub id: i64,

    pub user_id: String,

    pub book_id: String,

    #[serde(rename = "book_title", default)]
    pub title: String,

    #[serde(rename = "book_author", default)]
    pub author: String,

    pub reserved_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    pub status: ReservationStatus,
}

impl ReservationRecord {
    pub fn is_cancellable(&self) -> bool {
        self.status == ReservationStatus::Active
    }
}
