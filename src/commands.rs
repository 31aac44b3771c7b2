//! Operator-facing command surface.
//!
//! Invoked by an external admin layer; every call returns a
//! success/failure envelope with either a payload or an error. The wire
//! format beyond this envelope is the caller's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::AppState;
use crate::domain::artifacts::{ArtifactKind, Stage3Summary};
use crate::domain::errors::SyncError;
use crate::domain::migration::{MigrationOptions, MigrationStatus, MigrationType};
use crate::migration::{ExportDocument, ImportReport};
use crate::sync::{FullSyncReport, Stage1Report, Stage2Report, SyncProgress};
use crate::validation::{FixReport, IntegrityReport};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub recoverable: bool,
}

/// Response envelope shared by every command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorInfo>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, timestamp: Utc::now() }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorInfo { code: code.into(), message: message.into(), recoverable }),
            timestamp: Utc::now(),
        }
    }

    fn from_error(e: &SyncError) -> Self {
        Self::failure(e.code(), e.to_string(), e.recoverable())
    }
}

/// Payload of `start_stage`, tagged by the stage that ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageOutcome {
    Categories(Stage1Report),
    Manifest(Stage2Report),
    Cases(Stage3Summary),
}

/// Run one pipeline stage by number (1–3).
pub async fn start_stage(state: &AppState, stage: u8) -> ApiResponse<StageOutcome> {
    info!("▶️ operator requested stage {stage}");
    let result = match stage {
        1 => state.pipeline.run_category_stage().await.map(StageOutcome::Categories),
        2 => state.pipeline.run_manifest_stage().await.map(StageOutcome::Manifest),
        3 => state.pipeline.run_case_stage(None).await.map(StageOutcome::Cases),
        other => {
            return ApiResponse::failure(
                "VALIDATION",
                format!("unknown stage {other}; expected 1, 2 or 3"),
                false,
            )
        }
    };
    match result {
        Ok(outcome) => ApiResponse::success(outcome),
        Err(e) => ApiResponse::from_error(&e),
    }
}

/// Run stages 1 → 2 → 3 in one call.
pub async fn run_full_sync(state: &AppState) -> ApiResponse<FullSyncReport> {
    info!("▶️ operator requested full sync");
    match state.pipeline.run_full_sync(None).await {
        Ok(report) => ApiResponse::success(report),
        Err(e) => ApiResponse::from_error(&e),
    }
}

/// Current progress slot; clients poll this every few seconds.
pub async fn get_progress(state: &AppState) -> ApiResponse<SyncProgress> {
    ApiResponse::success(state.progress.snapshot().await)
}

/// Request a stop. Takes effect at the next stage boundary; an in-flight
/// batch always finishes.
pub async fn request_stop(state: &AppState) -> ApiResponse<bool> {
    state.progress.request_stop().await;
    info!("⏹️ operator requested stop");
    ApiResponse::success(true)
}

/// Delete one artifact, forcing its stage to run again. Returns whether a
/// document actually existed.
pub async fn delete_artifact(state: &AppState, kind: &str) -> ApiResponse<bool> {
    let Some(kind) = ArtifactKind::parse(kind) else {
        return ApiResponse::failure(
            "VALIDATION",
            format!("unknown artifact kind '{kind}'"),
            false,
        );
    };
    match state.artifacts.delete(kind).await {
        Ok(existed) => ApiResponse::success(existed),
        Err(e) => ApiResponse::from_error(&e),
    }
}

/// Run a migration in the given direction. The envelope's success mirrors
/// the migration outcome; the persisted status carries the details either
/// way.
pub async fn migrate(
    state: &AppState,
    direction: MigrationType,
    options: &MigrationOptions,
) -> ApiResponse<MigrationStatus> {
    let succeeded = match direction {
        MigrationType::ToLocal => state.orchestrator.migrate_to_local(options).await,
        MigrationType::ToApi => state.orchestrator.migrate_to_api(options).await,
    };
    let status = state.orchestrator.status().await.ok().flatten();
    if succeeded {
        match status {
            Some(status) => ApiResponse::success(status),
            None => ApiResponse::failure("FATAL", "migration status missing after success", false),
        }
    } else {
        let message = status
            .map(|s| s.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "migration failed; see logs".to_string());
        ApiResponse::failure("MIGRATION_FAILED", message, true)
    }
}

/// Restore the most recent pre-migration backup.
pub async fn rollback(state: &AppState) -> ApiResponse<bool> {
    let restored = state.orchestrator.rollback().await;
    ApiResponse::success(restored)
}

/// Run the five-domain integrity check.
pub async fn validate(state: &AppState) -> ApiResponse<IntegrityReport> {
    match state.validator.check_data_integrity().await {
        Ok(report) => ApiResponse::success(report),
        Err(e) => ApiResponse::from_error(&e),
    }
}

/// Best-effort repair pass. Only ever runs on an explicit operator
/// request; the returned log lists every action taken.
pub async fn repair_data(state: &AppState) -> ApiResponse<FixReport> {
    match state.validator.fix_data_issues().await {
        Ok(report) => ApiResponse::success(report),
        Err(e) => ApiResponse::from_error(&e),
    }
}

pub async fn export_data(state: &AppState) -> ApiResponse<ExportDocument> {
    match state.orchestrator.export_data().await {
        Ok(document) => ApiResponse::success(document),
        Err(e) => ApiResponse::from_error(&e),
    }
}

pub async fn import_data(state: &AppState, doc: &serde_json::Value) -> ApiResponse<ImportReport> {
    match state.orchestrator.import_data(doc).await {
        Ok(report) => ApiResponse::success(report),
        Err(e) => ApiResponse::from_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_success_and_failure_shapes() {
        let ok: ApiResponse<u32> = ApiResponse::success(7);
        assert!(ok.success);
        assert_eq!(ok.data, Some(7));
        assert!(ok.error.is_none());

        let err: ApiResponse<u32> = ApiResponse::failure("VALIDATION", "bad", false);
        assert!(!err.success);
        assert!(err.data.is_none());
        assert_eq!(err.error.unwrap().code, "VALIDATION");
    }
}
