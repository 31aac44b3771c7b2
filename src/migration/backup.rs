//! Pre-migration backup and rollback.
//!
//! A single snapshot slot: creating a backup overwrites the previous one,
//! rollback consumes and clears it. Rollback with no backup present is a
//! full no-op that returns false, which also makes double rollback safe.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::domain::constants::{settings, CASE_ENTITY_TYPE};
use crate::domain::errors::SyncResult;
use crate::domain::migration::MigrationBackup;
use crate::domain::repositories::ContentStore;

pub struct BackupManager {
    store: Arc<dyn ContentStore>,
}

impl BackupManager {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Snapshot engine settings and entity publication states. Runs
    /// immediately before any migration mutation.
    pub async fn create_backup(&self) -> SyncResult<()> {
        let mut snapshot = self.store.settings_with_prefix(settings::PREFIX).await?;
        // The snapshot must not nest the previous backup, and restoring a
        // "running" migration status would wedge the installation.
        snapshot.remove(settings::MIGRATION_BACKUP);
        snapshot.remove(settings::MIGRATION_STATUS);

        let mut entity_statuses = BTreeMap::new();
        for entity in self.store.list_entities(CASE_ENTITY_TYPE).await? {
            entity_statuses.insert(entity.id, entity.status);
        }

        let backup = MigrationBackup { created_at: Utc::now(), settings: snapshot, entity_statuses };
        self.store
            .set_setting(settings::MIGRATION_BACKUP, &serde_json::to_string(&backup)?)
            .await?;
        info!(
            "🗄️ backup created: {} settings, {} entity statuses",
            backup.settings.len(),
            backup.entity_statuses.len()
        );
        Ok(())
    }

    pub async fn has_backup(&self) -> SyncResult<bool> {
        Ok(self.store.get_setting(settings::MIGRATION_BACKUP).await?.is_some())
    }

    /// Restore the snapshot. Returns false without touching anything when
    /// no backup exists.
    pub async fn rollback(&self) -> SyncResult<bool> {
        let Some(raw) = self.store.get_setting(settings::MIGRATION_BACKUP).await? else {
            return Ok(false);
        };
        let backup: MigrationBackup = serde_json::from_str(&raw)?;

        // Engine settings created after the snapshot are removed, recorded
        // ones restored verbatim.
        let current = self.store.settings_with_prefix(settings::PREFIX).await?;
        for key in current.keys() {
            if key == settings::MIGRATION_BACKUP || key == settings::MIGRATION_STATUS {
                continue;
            }
            if !backup.settings.contains_key(key) {
                self.store.delete_setting(key).await?;
            }
        }
        for (key, value) in &backup.settings {
            self.store.set_setting(key, value).await?;
        }

        for (entity_id, status) in &backup.entity_statuses {
            self.store.set_entity_status(*entity_id, *status).await?;
        }

        self.store.delete_setting(settings::MIGRATION_BACKUP).await?;
        self.store.delete_setting(settings::MIGRATION_STATUS).await?;
        info!(
            "↩️ rollback restored {} settings and {} entity statuses",
            backup.settings.len(),
            backup.entity_statuses.len()
        );
        Ok(true)
    }
}
