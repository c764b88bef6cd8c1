// src/models/mod.rs

//! Domain models for the lending client.
//!
//! Wire shapes of the gateway's JSON payloads, plus the configuration
//! structures.

mod book;
mod cart;
mod config;
mod copy;
mod lending;
mod notification;
mod reservation;

// Re-export all public types
pub use book::{Book, BookFilters};
pub use cart::{CartItem, merge_item, total_price, total_quantity};
pub use config::{
    AnalyticsConfig, Config, DisplayConfig, GatewayConfig, LoggingConfig, PollingConfig,
};
pub use copy::{CopyRecord, CopyStatus, CopyUpdate, NewCopy};
pub use lending::{EffectiveStatus, LendingRecord, LendingStatus};
pub use notification::{Notification, NotificationKind, latest_first, unread_count};
pub use reservation::{ReservationRecord, ReservationStatus};

/// Unread counter payload of `GET /notifications/unread-count`.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct UnreadCount {
    pub count: u32,
}

/// Serde adapter for calendar dates.
///
/// The borrow service emits `YYYY-MM-DD`, but some database drivers render
/// the same column as a midnight timestamp; both are accepted.
pub(crate) mod calendar_date {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveDate, String> {
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, FORMAT) {
            return Ok(date);
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.date_naive())
            .map_err(|e| format!("invalid calendar date '{raw}': {e}"))
    }
}
