//! Migration data model: direction, status singleton, pre-migration backup,
//! and operator-supplied options with their cross-field validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::constants::MIN_TIME_BUDGET_SECS;
use super::entities::EntityStatus;
use super::errors::{SyncError, SyncResult};

/// Direction of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationType {
    ToLocal,
    ToApi,
}

/// Which mode an installation runs in; also the target of readiness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    Local,
    Api,
}

impl MigrationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Api => "api",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Process-wide migration status singleton. Persisted as a setting and
/// overwritten on every transition; only one migration may be `Running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub migration_type: Option<MigrationType>,
    pub state: MigrationState,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl MigrationStatus {
    pub fn idle() -> Self {
        Self {
            migration_type: None,
            state: MigrationState::Idle,
            message: String::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn running(migration_type: MigrationType, message: impl Into<String>) -> Self {
        Self {
            migration_type: Some(migration_type),
            state: MigrationState::Running,
            message: message.into(),
            updated_at: Utc::now(),
        }
    }

    pub fn finished(
        migration_type: MigrationType,
        success: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            migration_type: Some(migration_type),
            state: if success { MigrationState::Completed } else { MigrationState::Failed },
            message: message.into(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == MigrationState::Running
    }
}

/// The single most-recent pre-migration snapshot. Overwritten by each new
/// migration, consumed and cleared by rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationBackup {
    pub created_at: DateTime<Utc>,
    pub settings: BTreeMap<String, String>,
    pub entity_statuses: BTreeMap<i64, EntityStatus>,
}

/// What to do with local case entities when switching back to API mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Keep entities, mark them archived.
    Archive,
    /// Keep entities, hide them from public view.
    Hide,
    /// Remove entities together with metadata, labels and attachments.
    Delete,
}

/// Operator-supplied options for either migration direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Keep locally stored data (artifacts, media files) after the switch.
    pub preserve_data: bool,
    /// Cleanup applied to local case entities on a to-api migration.
    pub cleanup: CleanupPolicy,
    /// Override of the configured Stage 3 batch size.
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Optional execution budget the caller imposes on the whole operation.
    #[serde(default)]
    pub time_budget_secs: Option<u64>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            preserve_data: true,
            cleanup: CleanupPolicy::Archive,
            batch_size: None,
            time_budget_secs: None,
        }
    }
}

impl MigrationOptions {
    /// Cross-field validation, run before any state is touched.
    pub fn validate(&self) -> SyncResult<()> {
        if self.cleanup == CleanupPolicy::Archive && !self.preserve_data {
            return Err(SyncError::Validation(
                "cleanup policy 'archive' requires preserve_data".to_string(),
            ));
        }
        if let Some(batch) = self.batch_size {
            if batch == 0 {
                return Err(SyncError::Validation("batch_size must be at least 1".to_string()));
            }
        }
        if let Some(budget) = self.time_budget_secs {
            if budget < MIN_TIME_BUDGET_SECS {
                return Err(SyncError::Validation(format!(
                    "time budget of {budget}s is below the {MIN_TIME_BUDGET_SECS}s minimum"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_without_preserve_is_rejected() {
        let options = MigrationOptions {
            preserve_data: false,
            cleanup: CleanupPolicy::Archive,
            ..MigrationOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn delete_without_preserve_is_allowed() {
        let options = MigrationOptions {
            preserve_data: false,
            cleanup: CleanupPolicy::Delete,
            ..MigrationOptions::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn zero_batch_and_short_budget_are_rejected() {
        let mut options = MigrationOptions { batch_size: Some(0), ..MigrationOptions::default() };
        assert!(options.validate().is_err());
        options.batch_size = Some(10);
        options.time_budget_secs = Some(5);
        assert!(options.validate().is_err());
    }

    #[test]
    fn status_transitions() {
        let status = MigrationStatus::running(MigrationType::ToLocal, "sync in progress");
        assert!(status.is_running());
        let done = MigrationStatus::finished(MigrationType::ToLocal, true, "ok");
        assert_eq!(done.state, MigrationState::Completed);
        let failed = MigrationStatus::finished(MigrationType::ToApi, false, "boom");
        assert_eq!(failed.state, MigrationState::Failed);
    }
}
