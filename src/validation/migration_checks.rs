//! Mode-specific migration readiness checks.
//!
//! Dispatch is a plain enum match: one arm per target mode, one shared
//! report shape.

use tracing::info;

use crate::domain::constants::{CASE_ENTITY_TYPE, META_REMOTE_CASE_ID, PROCEDURE_TAXONOMY};
use crate::domain::entities::EntityStatus;
use crate::domain::errors::SyncResult;
use crate::domain::migration::MigrationMode;

use super::report::CheckReport;
use super::DataValidator;

impl DataValidator {
    /// Check whether the installation is fit for the given target mode.
    pub async fn validate_migration(&self, target: MigrationMode) -> SyncResult<CheckReport> {
        let report = match target {
            MigrationMode::Local => self.validate_local_readiness().await?,
            MigrationMode::Api => self.validate_api_readiness().await?,
        };
        info!(
            "🧭 migration readiness for {} mode: valid={} ({} errors, {} warnings)",
            target.as_str(),
            report.valid,
            report.errors.len(),
            report.warnings.len()
        );
        Ok(report)
    }

    /// Locally-stored mode needs materialized entities. Missing metadata
    /// and broken images degrade quality but do not block the switch, so
    /// they surface as warnings.
    async fn validate_local_readiness(&self) -> SyncResult<CheckReport> {
        let mut report = CheckReport::passing();

        let entities = self.store.list_entities(CASE_ENTITY_TYPE).await?;
        if entities.is_empty() {
            report.error("no case entities exist; run the sync pipeline first");
            return Ok(report);
        }
        report.note(format!("{} case entities present", entities.len()));

        let labels = self.store.list_labels(PROCEDURE_TAXONOMY).await?;
        report.note(format!("{} procedure labels present", labels.len()));

        for entity in &entities {
            if self.store.get_meta(entity.id, META_REMOTE_CASE_ID).await?.is_none() {
                report.warn(format!("entity {} is missing its remote case id metadata", entity.id));
            }
            for image in self.store.list_images(entity.id).await? {
                if !tokio::fs::try_exists(&image.file_path).await.unwrap_or(false) {
                    report.warn(format!(
                        "entity {} references a missing image file: {}",
                        entity.id, image.file_path
                    ));
                }
            }
        }
        Ok(report)
    }

    /// API-driven mode needs working credentials, verified by a live
    /// round trip. Entities left publicly visible are flagged.
    async fn validate_api_readiness(&self) -> SyncResult<CheckReport> {
        let mut report = CheckReport::passing();

        if self.gallery_config.api_token.trim().is_empty() {
            report.error("gallery API token is not configured");
            return Ok(report);
        }
        if let Err(e) = self.gallery.health_check().await {
            report.error(format!("gallery API is unreachable: {e}"));
        }

        let visible = self
            .store
            .list_entities(CASE_ENTITY_TYPE)
            .await?
            .iter()
            .filter(|e| e.status == EntityStatus::Published)
            .count();
        if visible > 0 {
            report.warn(format!(
                "{visible} locally stored case entities are still publicly visible"
            ));
        }
        Ok(report)
    }
}
