//! User notifications produced by the notification service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification category. Unknown wire values map to `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    Overdue,
    DueSoon,
    ReservationAvailable,
    Other(String),
}

impl From<String> for NotificationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "overdue" => Self::Overdue,
            "due_soon" => Self::DueSoon,
            "reservation_available" => Self::ReservationAvailable,
            _ => Self::Other(value),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Overdue => "overdue".to_string(),
            NotificationKind::DueSoon => "due_soon".to_string(),
            NotificationKind::ReservationAvailable => "reservation_available".to_string(),
            NotificationKind::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,

    pub user_id: String,

    #[serde(rename = "type")]
    pub kind: NotificationKind,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<i64>,

    #[serde(default)]
    pub is_read: bool,

    pub created_at: DateTime<Utc>,
}

/// Order most-recent-first and keep at most `limit` entries.
pub fn latest_first(mut notifications: Vec<Notification>, limit: usize) -> Vec<Notification> {
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notifications.truncate(limit);
    notifications
}

/// Unread entries in a list.
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.is_read).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make(id: i64, minutes_ago: i64, is_read: bool) -> Notification {
        Notification {
            id,
            user_id: "user1".into(),
            kind: NotificationKind::DueSoon,
            title: format!("n{id}"),
            message: String::new(),
            related_id: None,
            is_read,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_unknown_kind_is_other() {
        let json = r#"{"id":1,"user_id":"u","type":"system","created_at":"2026-01-01T00:00:00Z"}"#;
        let parsed: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.kind, NotificationKind::Other("system".into()));

        let value = serde_json::to_value(&parsed).unwrap();
        assert_eq!(value["type"], "system");
    }

    #[test]
    fn test_known_kinds() {
        for (raw, kind) in [
            ("overdue", NotificationKind::Overdue),
            ("due_soon", NotificationKind::DueSoon),
            ("reservation_available", NotificationKind::ReservationAvailable),
        ] {
            assert_eq!(NotificationKind::from(raw.to_string()), kind);
        }
    }

    #[test]
    fn test_latest_first_caps_list() {
        let list = (0..60).map(|i| make(i, i, false)).collect::<Vec<_>>();
        let shown = latest_first(list, 50);

        assert_eq!(shown.len(), 50);
        assert_eq!(shown[0].id, 0);
        assert!(shown.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn test_unread_count() {
        let list = vec![make(1, 1, false), make(2, 2, true), make(3, 3, false)];
        assert_eq!(unread_count(&list), 2);
    }
}
