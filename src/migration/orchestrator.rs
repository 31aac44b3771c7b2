//! Migration orchestrator.
//!
//! Sequences option validation → preconditions → status transition →
//! backup → pre-flight → mode-specific body → validation gate → final
//! status. The public entry points never propagate an error: every failure
//! is logged with its context and mapped to a `failed` status and a
//! `false` return.
//!
//! The running-migration guard is advisory: the status check and the
//! status write are two separate store calls, so two operators racing can
//! both pass it. Closing that gap needs a store-level lease.

use std::sync::Arc;
use tracing::{error, info};

use crate::domain::constants::{settings, CASE_ENTITY_TYPE, META_REMOTE_CASE_ID, MIN_FREE_DISK_BYTES};
use crate::domain::entities::EntityStatus;
use crate::domain::errors::{SyncError, SyncResult};
use crate::domain::gallery::GalleryClient;
use crate::domain::migration::{
    CleanupPolicy, MigrationMode, MigrationOptions, MigrationStatus, MigrationType,
};
use crate::domain::repositories::ContentStore;
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::media_store::MediaStore;
use crate::infrastructure::system_probe;
use crate::sync::SyncPipeline;
use crate::validation::DataValidator;

use super::backup::BackupManager;
use super::transfer::{DataTransfer, ExportDocument, ImportReport};
use crate::domain::artifacts::ArtifactKind;

pub struct MigrationOrchestrator {
    store: Arc<dyn ContentStore>,
    gallery: Arc<dyn GalleryClient>,
    pipeline: Arc<SyncPipeline>,
    validator: Arc<DataValidator>,
    backup: BackupManager,
    transfer: DataTransfer,
    artifacts: ArtifactStore,
    media: MediaStore,
    config: AppConfig,
}

impl MigrationOrchestrator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        gallery: Arc<dyn GalleryClient>,
        pipeline: Arc<SyncPipeline>,
        validator: Arc<DataValidator>,
        artifacts: ArtifactStore,
        media: MediaStore,
        config: AppConfig,
    ) -> Self {
        let backup = BackupManager::new(store.clone());
        let transfer = DataTransfer::new(store.clone(), artifacts.clone());
        Self { store, gallery, pipeline, validator, backup, transfer, artifacts, media, config }
    }

    /// Switch the installation to locally-stored mode. Returns whether the
    /// migration succeeded; the outcome is also persisted in the status
    /// singleton.
    pub async fn migrate_to_local(&self, options: &MigrationOptions) -> bool {
        self.run_migration(MigrationType::ToLocal, options).await
    }

    /// Switch the installation back to API-driven mode.
    pub async fn migrate_to_api(&self, options: &MigrationOptions) -> bool {
        self.run_migration(MigrationType::ToApi, options).await
    }

    async fn run_migration(&self, direction: MigrationType, options: &MigrationOptions) -> bool {
        // Option and precondition failures return early without touching
        // the status singleton: a concurrent run owns it.
        if let Err(e) = options.validate() {
            error!("migration {direction:?} rejected: {e} (options: {options:?})");
            return false;
        }
        if let Err(e) = self.check_preconditions().await {
            error!("migration {direction:?} precondition failed: {e}");
            return false;
        }

        if let Err(e) = self
            .set_status(MigrationStatus::running(direction, "migration started"))
            .await
        {
            error!("migration {direction:?} could not persist status: {e}");
            return false;
        }

        match self.execute(direction, options).await {
            Ok(message) => {
                info!("✅ migration {direction:?} completed: {message}");
                let status = MigrationStatus::finished(direction, true, message);
                if let Err(e) = self.set_status(status).await {
                    error!("migration {direction:?} succeeded but status write failed: {e}");
                }
                true
            }
            Err(e) => {
                error!(
                    "migration {direction:?} failed: {e} (options: {options:?})"
                );
                let status = MigrationStatus::finished(direction, false, e.to_string());
                if let Err(status_err) = self.set_status(status).await {
                    error!("migration {direction:?} status write failed after error: {status_err}");
                }
                false
            }
        }
    }

    /// Steps (d)–(g): backup, pre-flight, body, validation gate.
    async fn execute(
        &self,
        direction: MigrationType,
        options: &MigrationOptions,
    ) -> SyncResult<String> {
        self.backup.create_backup().await?;
        self.preflight(direction).await?;

        let message = match direction {
            MigrationType::ToLocal => {
                let report = self.pipeline.run_full_sync(options.batch_size).await?;
                if !report.completed() {
                    return Err(SyncError::Fatal(anyhow::anyhow!(
                        "full sync ended in state {:?}: {}",
                        report.state,
                        report.message
                    )));
                }
                self.store.set_setting(settings::MODE, "local").await?;
                let summary = report.stage3.as_ref();
                format!(
                    "migrated to locally-stored mode ({} created, {} updated, {} failed)",
                    summary.map_or(0, |s| s.created),
                    summary.map_or(0, |s| s.updated),
                    summary.map_or(0, |s| s.failed)
                )
            }
            MigrationType::ToApi => {
                let cleaned = self.cleanup_local_entities(options).await?;
                if !options.preserve_data {
                    self.artifacts.delete(ArtifactKind::SyncData).await?;
                    self.artifacts.delete(ArtifactKind::Manifest).await?;
                    self.artifacts.delete(ArtifactKind::Stage3Summary).await?;
                }
                self.store.set_setting(settings::MODE, "api").await?;
                format!("migrated to API-driven mode ({cleaned} entities cleaned up)")
            }
        };

        let target = match direction {
            MigrationType::ToLocal => MigrationMode::Local,
            MigrationType::ToApi => MigrationMode::Api,
        };
        let readiness = self.validator.validate_migration(target).await?;
        if !readiness.valid {
            return Err(SyncError::Validation(format!(
                "post-migration validation failed: {}",
                readiness.errors.join("; ")
            )));
        }

        Ok(message)
    }

    /// Step (b): no concurrent migration, enough memory. The time budget
    /// bound is enforced during option validation.
    async fn check_preconditions(&self) -> SyncResult<()> {
        if let Some(status) = self.status().await? {
            if status.is_running() {
                return Err(SyncError::Precondition(
                    "another migration is already running".to_string(),
                ));
            }
        }
        let available = system_probe::available_memory();
        if available < self.config.sync.min_available_memory_bytes {
            return Err(SyncError::Precondition(format!(
                "available memory {available} below required {}",
                self.config.sync.min_available_memory_bytes
            )));
        }
        Ok(())
    }

    /// Step (e): store round trip, writable durable storage, and for the
    /// to-local direction remote connectivity plus free disk space.
    async fn preflight(&self, direction: MigrationType) -> SyncResult<()> {
        self.store
            .ping()
            .await
            .map_err(|e| SyncError::Connectivity(format!("content store unreachable: {e}")))?;
        self.artifacts.probe_writable().await?;

        if direction == MigrationType::ToLocal {
            self.gallery.health_check().await?;
            let free = system_probe::free_disk_space(&self.config.storage.data_dir);
            if free < MIN_FREE_DISK_BYTES {
                return Err(SyncError::Precondition(format!(
                    "free disk space {free} below required {MIN_FREE_DISK_BYTES}"
                )));
            }
        }
        Ok(())
    }

    /// Apply the configured cleanup policy to every local case entity.
    /// Returns the number of entities touched.
    async fn cleanup_local_entities(&self, options: &MigrationOptions) -> SyncResult<u64> {
        let entities = self.store.list_entities(CASE_ENTITY_TYPE).await?;
        let mut cleaned = 0u64;
        for entity in entities {
            match options.cleanup {
                CleanupPolicy::Archive => {
                    self.store.set_entity_status(entity.id, EntityStatus::Archived).await?;
                }
                CleanupPolicy::Hide => {
                    self.store.set_entity_status(entity.id, EntityStatus::Private).await?;
                }
                CleanupPolicy::Delete => {
                    // Media files and the case mapping go with the entity;
                    // nothing is left orphaned.
                    if let Some(case_id) =
                        self.store.get_meta(entity.id, META_REMOTE_CASE_ID).await?
                    {
                        self.media.remove_case(&case_id).await?;
                        self.store.unmap_case(&case_id).await?;
                    }
                    self.store.delete_entity(entity.id).await?;
                }
            }
            cleaned += 1;
        }
        Ok(cleaned)
    }

    /// Restore the most recent backup. False when none exists; errors are
    /// logged and reported as failure, never thrown.
    pub async fn rollback(&self) -> bool {
        match self.backup.rollback().await {
            Ok(restored) => restored,
            Err(e) => {
                error!("rollback failed: {e}");
                false
            }
        }
    }

    pub async fn export_data(&self) -> SyncResult<ExportDocument> {
        self.transfer.export_data().await
    }

    pub async fn import_data(&self, doc: &serde_json::Value) -> SyncResult<ImportReport> {
        self.transfer.import_data(doc).await
    }

    pub async fn status(&self) -> SyncResult<Option<MigrationStatus>> {
        match self.store.get_setting(settings::MIGRATION_STATUS).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_status(&self, status: MigrationStatus) -> SyncResult<()> {
        self.store
            .set_setting(settings::MIGRATION_STATUS, &serde_json::to_string(&status)?)
            .await
    }
}
