//! Cross-entity integrity checks and the best-effort repair pass.
//!
//! `check_data_integrity` runs five independent, non-short-circuiting
//! checks; a failure in one domain never hides findings in another.
//! `fix_data_issues` is non-authoritative: it logs every action taken for
//! operator review and must only ever run when explicitly requested.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

use crate::domain::constants::{settings, CASE_ENTITY_TYPE, META_REMOTE_CASE_ID, PROCEDURE_TAXONOMY};
use crate::domain::entities::CaseEntity;
use crate::domain::errors::SyncResult;
use crate::domain::value_objects::{synthetic_case_id, unique_slug};

use super::report::{CheckReport, FixReport, IntegrityReport};
use super::DataValidator;

impl DataValidator {
    /// Run all five integrity checks and return the combined report.
    pub async fn check_data_integrity(&self) -> SyncResult<IntegrityReport> {
        let entities = self.store.list_entities(CASE_ENTITY_TYPE).await?;
        let local_mode = self.in_local_mode().await?;

        let mut checks = BTreeMap::new();
        checks.insert("entities".to_string(), self.check_entities(&entities));
        checks.insert("labels".to_string(), self.check_labels().await?);
        checks.insert("metadata".to_string(), self.check_metadata(&entities, local_mode).await?);
        checks.insert("images".to_string(), self.check_images(&entities).await?);
        checks.insert("sync_mapping".to_string(), self.check_sync_mapping().await?);

        let report = IntegrityReport::from_checks(checks);
        info!(
            "🔍 integrity check: valid={} errors={} warnings={}",
            report.overall_valid, report.total_errors, report.total_warnings
        );
        Ok(report)
    }

    fn check_entities(&self, entities: &[CaseEntity]) -> CheckReport {
        let mut report = CheckReport::passing();
        let mut seen_slugs: HashMap<&str, i64> = HashMap::new();

        for entity in entities {
            if entity.title.trim().is_empty() {
                report.error(format!("entity {} has an empty title", entity.id));
            }
            if let Some(first) = seen_slugs.get(entity.slug.as_str()) {
                report.error(format!(
                    "entity {} duplicates slug '{}' of entity {first}",
                    entity.id, entity.slug
                ));
            } else {
                seen_slugs.insert(&entity.slug, entity.id);
            }
        }
        report
    }

    async fn check_labels(&self) -> SyncResult<CheckReport> {
        let mut report = CheckReport::passing();
        let labels = self.store.list_labels(PROCEDURE_TAXONOMY).await?;
        let ids: HashSet<i64> = labels.iter().map(|l| l.id).collect();
        let mut seen_slugs: HashMap<&str, i64> = HashMap::new();

        for label in &labels {
            if label.name.trim().is_empty() {
                report.error(format!("label {} has an empty name", label.id));
            }
            if let Some(first) = seen_slugs.get(label.slug.as_str()) {
                report.error(format!(
                    "label {} duplicates slug '{}' of label {first}",
                    label.id, label.slug
                ));
            } else {
                seen_slugs.insert(&label.slug, label.id);
            }
            if let Some(parent_id) = label.parent_id {
                if !ids.contains(&parent_id) {
                    report.error(format!(
                        "label {} references missing parent {parent_id}",
                        label.id
                    ));
                }
            }
        }
        Ok(report)
    }

    async fn check_metadata(
        &self,
        entities: &[CaseEntity],
        local_mode: bool,
    ) -> SyncResult<CheckReport> {
        let mut report = CheckReport::passing();
        for entity in entities {
            let mut has_case_id = false;
            for (key, value) in self.store.list_meta(entity.id).await? {
                if key == META_REMOTE_CASE_ID {
                    has_case_id = true;
                }
                if looks_like_json(&value) && serde_json::from_str::<serde_json::Value>(&value).is_err() {
                    report.error(format!(
                        "entity {} metadata '{key}' holds unparseable JSON",
                        entity.id
                    ));
                }
            }
            if local_mode && !has_case_id {
                report.error(format!(
                    "entity {} is missing its remote case id metadata",
                    entity.id
                ));
            }
        }
        Ok(report)
    }

    async fn check_images(&self, entities: &[CaseEntity]) -> SyncResult<CheckReport> {
        let mut report = CheckReport::passing();
        for entity in entities {
            for image in self.store.list_images(entity.id).await? {
                let exists = tokio::fs::try_exists(&image.file_path).await.unwrap_or(false);
                if !exists {
                    report.error(format!(
                        "entity {} {} image missing on disk: {}",
                        entity.id,
                        image.kind.as_str(),
                        image.file_path
                    ));
                }
            }
        }
        Ok(report)
    }

    async fn check_sync_mapping(&self) -> SyncResult<CheckReport> {
        let mut report = CheckReport::passing();
        for (case_id, entity_id) in self.store.list_case_mappings().await? {
            if self.store.get_entity(entity_id).await?.is_none() {
                report.error(format!(
                    "case map row '{case_id}' references missing entity {entity_id}"
                ));
            }
        }
        if !self.store.sync_log_available().await? {
            report.error("sync log table is missing".to_string());
        }
        Ok(report)
    }

    /// Best-effort repairs: synthetic case ids, slug dedup, removal of
    /// unparseable JSON metadata. Every action is logged for review.
    pub async fn fix_data_issues(&self) -> SyncResult<FixReport> {
        let mut fixes = FixReport::default();
        let entities = self.store.list_entities(CASE_ENTITY_TYPE).await?;
        let local_mode = self.in_local_mode().await?;

        // Missing remote case ids get a temporary synthetic stand-in.
        if local_mode {
            for entity in &entities {
                if self.store.get_meta(entity.id, META_REMOTE_CASE_ID).await?.is_none() {
                    let synthetic = synthetic_case_id();
                    self.store.set_meta(entity.id, META_REMOTE_CASE_ID, &synthetic).await?;
                    fixes.record(format!(
                        "assigned synthetic case id {synthetic} to entity {}",
                        entity.id
                    ));
                }
            }
        }

        // Duplicate slugs: the first holder keeps the slug, later ones are
        // renamed to unique variants.
        let mut taken: HashSet<String> = HashSet::new();
        for entity in &entities {
            if taken.contains(&entity.slug) {
                let renamed = unique_slug(&entity.slug, &taken);
                self.store.set_entity_slug(entity.id, &renamed).await?;
                fixes.record(format!(
                    "renamed duplicate slug '{}' of entity {} to '{renamed}'",
                    entity.slug, entity.id
                ));
                taken.insert(renamed);
            } else {
                taken.insert(entity.slug.clone());
            }
        }

        // Unparseable JSON metadata is deleted, not repaired.
        for entity in &entities {
            for (key, value) in self.store.list_meta(entity.id).await? {
                if looks_like_json(&value)
                    && serde_json::from_str::<serde_json::Value>(&value).is_err()
                {
                    self.store.delete_meta(entity.id, &key).await?;
                    fixes.record(format!(
                        "deleted unparseable JSON metadata '{key}' from entity {}",
                        entity.id
                    ));
                }
            }
        }

        info!("🔧 repair pass applied {} fixes", fixes.fixed_count());
        Ok(fixes)
    }

    pub(crate) async fn in_local_mode(&self) -> SyncResult<bool> {
        Ok(self
            .store
            .get_setting(settings::MODE)
            .await?
            .as_deref()
            == Some("local"))
    }
}

/// Metadata values that announce themselves as JSON documents.
fn looks_like_json(value: &str) -> bool {
    let trimmed = value.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}
