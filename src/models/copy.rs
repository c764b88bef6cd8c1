//! Physical book copies, managed by administrators.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Available,
    Borrowed,
    Maintenance,
    Lost,
}

impl CopyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Borrowed => "borrowed",
            Self::Maintenance => "maintenance",
            Self::Lost => "lost",
        }
    }
}

/// A copy as listed by the admin copy endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyRecord {
    pub id: i64,
    pub book_id: String,
    pub copy_number: u32,
    pub status: CopyStatus,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub acquired_date: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_author: Option<String>,
}

/// Body of `POST /admin/copies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCopy {
    pub book_id: String,
    pub copy_number: u32,
    pub status: CopyStatus,
    pub location: String,
    pub acquired_date: String,
    pub notes: String,
}

/// Body of `PUT /admin/copies/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyUpdate {
    pub status: CopyStatus,
    pub location: String,
    pub acquired_date: String,
    pub notes: String,
}

impl From<&CopyRecord> for CopyUpdate {
    fn from(copy: &CopyRecord) -> Self {
        Self {
            status: copy.status,
            location: copy.location.clone(),
            acquired_date: copy.acquired_date.clone(),
            notes: copy.notes.clone(),
        }
    }
}
