//! Family models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A family: the tenant that owns shared lists, trackers and notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Family document as persisted in `families` (keyed by family id).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FamilyRecord {
    pub fn into_family(self, id: String) -> Family {
        Family {
            id,
            name: self.name,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

/// Family listing entry with its member count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilySummary {
    pub id: String,
    pub name: String,
    pub member_count: u64,
}
