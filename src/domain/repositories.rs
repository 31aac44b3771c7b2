//! Content-entity store interface.
//!
//! The underlying store (entities, metadata, labels, settings, TTL cache,
//! sync log, case map) is an external collaborator; the engine only depends
//! on these primitives. A sqlx/sqlite implementation lives in
//! `infrastructure::content_store`.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use super::entities::{
    CaseEntity, CaseImage, EntityDraft, EntityStatus, ImageDraft, Label, LabelUpsert,
    SyncRunRecord,
};
use super::errors::SyncResult;

#[async_trait]
pub trait ContentStore: Send + Sync {
    // --- entities -------------------------------------------------------

    async fn create_entity(&self, draft: &EntityDraft) -> SyncResult<i64>;
    async fn update_entity(&self, id: i64, draft: &EntityDraft) -> SyncResult<()>;
    async fn get_entity(&self, id: i64) -> SyncResult<Option<CaseEntity>>;
    async fn list_entities(&self, entity_type: &str) -> SyncResult<Vec<CaseEntity>>;
    async fn set_entity_status(&self, id: i64, status: EntityStatus) -> SyncResult<()>;
    async fn set_entity_slug(&self, id: i64, slug: &str) -> SyncResult<()>;
    /// Removes the entity together with its metadata, label assignments and
    /// attachment rows. Deletion never leaves orphaned associations behind.
    async fn delete_entity(&self, id: i64) -> SyncResult<()>;

    // --- metadata -------------------------------------------------------

    async fn set_meta(&self, entity_id: i64, key: &str, value: &str) -> SyncResult<()>;
    async fn get_meta(&self, entity_id: i64, key: &str) -> SyncResult<Option<String>>;
    async fn list_meta(&self, entity_id: i64) -> SyncResult<Vec<(String, String)>>;
    async fn delete_meta(&self, entity_id: i64, key: &str) -> SyncResult<()>;

    // --- categorization labels -----------------------------------------

    /// Insert or update a label keyed by (taxonomy, slug).
    async fn upsert_label(
        &self,
        taxonomy: &str,
        name: &str,
        slug: &str,
        parent_id: Option<i64>,
    ) -> SyncResult<LabelUpsert>;
    async fn get_label_by_slug(&self, taxonomy: &str, slug: &str) -> SyncResult<Option<Label>>;
    async fn list_labels(&self, taxonomy: &str) -> SyncResult<Vec<Label>>;
    async fn set_label_slug(&self, label_id: i64, slug: &str) -> SyncResult<()>;
    /// Replace the entity's label assignments.
    async fn assign_labels(&self, entity_id: i64, label_ids: &[i64]) -> SyncResult<()>;
    async fn labels_for_entity(&self, entity_id: i64) -> SyncResult<Vec<Label>>;

    // --- image attachments ---------------------------------------------

    async fn attach_image(&self, entity_id: i64, image: &ImageDraft) -> SyncResult<i64>;
    async fn list_images(&self, entity_id: i64) -> SyncResult<Vec<CaseImage>>;
    /// Drop all attachment rows of an entity (files are the media store's
    /// concern).
    async fn remove_images(&self, entity_id: i64) -> SyncResult<()>;

    // --- persistent settings -------------------------------------------

    async fn get_setting(&self, key: &str) -> SyncResult<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> SyncResult<()>;
    async fn delete_setting(&self, key: &str) -> SyncResult<()>;
    async fn settings_with_prefix(&self, prefix: &str) -> SyncResult<BTreeMap<String, String>>;

    // --- TTL cache ------------------------------------------------------

    async fn cache_get(&self, key: &str) -> SyncResult<Option<String>>;
    async fn cache_set(&self, key: &str, value: &str, ttl: Duration) -> SyncResult<()>;
    /// Flush the whole cache; Stage 3 calls this between batches to bound
    /// memory growth.
    async fn cache_clear(&self) -> SyncResult<()>;

    // --- sync log & case map -------------------------------------------

    async fn record_sync_run(&self, record: &SyncRunRecord) -> SyncResult<()>;
    async fn sync_log_available(&self) -> SyncResult<bool>;
    async fn list_sync_runs(&self, limit: u32) -> SyncResult<Vec<SyncRunRecord>>;

    async fn map_case(&self, case_id: &str, entity_id: i64) -> SyncResult<()>;
    async fn entity_for_case(&self, case_id: &str) -> SyncResult<Option<i64>>;
    async fn list_case_mappings(&self) -> SyncResult<Vec<(String, i64)>>;
    async fn unmap_case(&self, case_id: &str) -> SyncResult<()>;

    // --- plumbing -------------------------------------------------------

    /// Trivial round-trip used by pre-flight connectivity checks.
    async fn ping(&self) -> SyncResult<()>;

    /// Relax integrity enforcement for a bulk write pass. Every `begin_bulk`
    /// must be paired with `end_bulk` on both success and failure paths.
    async fn begin_bulk(&self) -> SyncResult<()>;
    async fn end_bulk(&self) -> SyncResult<()>;
}
