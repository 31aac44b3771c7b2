//! Domain entities
//!
//! Local materializations of remote gallery records plus the auxiliary
//! records (labels, attachments, sync-log rows) the store keeps for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publication state of a locally stored case entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Published,
    Draft,
    Private,
    Archived,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Draft => "draft",
            Self::Private => "private",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "published" => Some(Self::Published),
            "draft" => Some(Self::Draft),
            "private" => Some(Self::Private),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// One locally materialized case record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseEntity {
    pub id: i64,
    pub entity_type: String,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating or updating an entity. The store assigns
/// id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDraft {
    pub entity_type: String,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub status: EntityStatus,
}

/// A categorization label (category or procedure) inside one taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,
    pub taxonomy: String,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<i64>,
}

/// Result of a label upsert: the label id plus whether a row was created.
#[derive(Debug, Clone, Copy)]
pub struct LabelUpsert {
    pub id: i64,
    pub created: bool,
}

/// Role of an image attachment within a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Primary,
    Before,
    After,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Before => "before",
            Self::After => "after",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(Self::Primary),
            "before" => Some(Self::Before),
            "after" => Some(Self::After),
            _ => None,
        }
    }
}

/// An image attachment row referencing a file on durable storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseImage {
    pub id: i64,
    pub entity_id: i64,
    pub kind: ImageKind,
    pub file_path: String,
    pub position: i32,
}

/// Fields supplied when attaching an image.
#[derive(Debug, Clone)]
pub struct ImageDraft {
    pub kind: ImageKind,
    pub file_path: String,
    pub position: i32,
}

/// One row of the sync log: a single stage run with its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRunRecord {
    pub run_id: String,
    pub stage: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: String,
    pub created: i64,
    pub updated: i64,
    pub failed: i64,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_status_round_trips_through_str() {
        for status in [
            EntityStatus::Published,
            EntityStatus::Draft,
            EntityStatus::Private,
            EntityStatus::Archived,
        ] {
            assert_eq!(EntityStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EntityStatus::parse("trashed"), None);
    }

    #[test]
    fn image_kind_round_trips_through_str() {
        for kind in [ImageKind::Primary, ImageKind::Before, ImageKind::After] {
            assert_eq!(ImageKind::parse(kind.as_str()), Some(kind));
        }
    }
}
