//! Remote gallery API read contract.
//!
//! The engine only consumes the remote API; everything it needs is captured
//! by `GalleryClient` and the wire types below. Authentication (bearer
//! token) and the base endpoint are construction-time configuration of the
//! concrete client. There is deliberately no retry/backoff layer here; the
//! pipeline tolerates failure at the case level only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::SyncResult;

/// Full category/procedure sidebar as reported by the remote API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryTree {
    pub categories: Vec<RemoteCategory>,
}

impl CategoryTree {
    /// Total number of categories plus nested procedures.
    pub fn node_count(&self) -> usize {
        self.categories.iter().map(|c| 1 + c.procedures.len()).sum()
    }

    /// Iterate over every procedure in the tree.
    pub fn procedures(&self) -> impl Iterator<Item = &RemoteProcedure> {
        self.categories.iter().flat_map(|c| c.procedures.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub procedures: Vec<RemoteProcedure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProcedure {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub case_count: Option<u64>,
}

/// One page of a procedure's case-id listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseIdPage {
    pub ids: Vec<String>,
    pub has_more: bool,
}

/// Full payload of one remote case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasePayload {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub procedure_ids: Vec<String>,
    #[serde(default)]
    pub photos: Vec<RemotePhoto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePhoto {
    pub url: String,
    #[serde(default)]
    pub kind: RemotePhotoKind,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemotePhotoKind {
    #[default]
    Primary,
    Before,
    After,
}

/// Read contract of the remote gallery API.
#[async_trait]
pub trait GalleryClient: Send + Sync {
    /// Fetch the full category/procedure sidebar.
    async fn fetch_categories(&self) -> SyncResult<CategoryTree>;

    /// Fetch one page of case ids for a procedure. Pages are 1-based.
    async fn fetch_case_ids(&self, procedure_id: &str, page: u32) -> SyncResult<CaseIdPage>;

    /// Fetch the full payload of one case.
    async fn fetch_case(&self, case_id: &str) -> SyncResult<CasePayload>;

    /// Download raw image bytes for local materialization.
    async fn fetch_image(&self, url: &str) -> SyncResult<Vec<u8>>;

    /// Report a case view back to the remote service.
    async fn track_view(&self, case_id: &str) -> SyncResult<()>;

    /// Cheap round-trip probe used by pre-flight and readiness checks.
    async fn health_check(&self) -> SyncResult<()>;
}
