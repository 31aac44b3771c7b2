//! Three-stage sync pipeline.
//!
//! Each stage is an independently triggerable call whose state lives in the
//! artifact store, so stages can run in separate requests and resume a
//! partially finished cycle. Full Sync chains the stages in one call with
//! each stage's progress rescaled into a third of the total.
//!
//! Cancellation is coarse by design: the stop flag is checked only at stage
//! boundaries, never inside a batch, and aborting leaves completed stages'
//! artifacts intact.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::domain::artifacts::Stage3Summary;
use crate::domain::errors::SyncResult;
use crate::domain::gallery::GalleryClient;
use crate::domain::repositories::ContentStore;
use crate::domain::value_objects::RunId;
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::config::SyncConfig;
use crate::infrastructure::media_store::MediaStore;

use super::progress::{ProgressScope, ProgressTracker};

/// Stage 1 outcome: label upserts performed for the category sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage1Report {
    pub created: u64,
    pub updated: u64,
    pub total: u64,
}

/// Stage 2 outcome. `reused` is true when a manifest already existed and
/// the stage returned its counts without contacting the remote API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage2Report {
    pub procedures: u64,
    pub total_cases: u64,
    pub reused: bool,
}

/// Full Sync state machine. `Failed` is reachable from any running state;
/// `Stopped` only at stage boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FullSyncState {
    Idle,
    Stage1Running,
    Stage1Done,
    Stage2Running,
    Stage2Done,
    Stage3Running,
    Completed,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullSyncReport {
    pub state: FullSyncState,
    pub stage1: Option<Stage1Report>,
    pub stage2: Option<Stage2Report>,
    pub stage3: Option<Stage3Summary>,
    pub message: String,
}

impl FullSyncReport {
    fn new() -> Self {
        Self {
            state: FullSyncState::Idle,
            stage1: None,
            stage2: None,
            stage3: None,
            message: String::new(),
        }
    }

    pub fn completed(&self) -> bool {
        self.state == FullSyncState::Completed
    }
}

pub struct SyncPipeline {
    pub(crate) gallery: Arc<dyn GalleryClient>,
    pub(crate) store: Arc<dyn ContentStore>,
    pub(crate) artifacts: ArtifactStore,
    pub(crate) media: MediaStore,
    pub(crate) progress: ProgressTracker,
    pub(crate) config: SyncConfig,
}

impl SyncPipeline {
    pub fn new(
        gallery: Arc<dyn GalleryClient>,
        store: Arc<dyn ContentStore>,
        artifacts: ArtifactStore,
        media: MediaStore,
        progress: ProgressTracker,
        config: SyncConfig,
    ) -> Self {
        Self { gallery, store, artifacts, media, progress, config }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Run stages 1 → 2 → 3 sequentially. Each stage occupies a third of
    /// the progress range. Returns a report whose terminal state is
    /// `Completed` or `Stopped`; a stage error propagates after the
    /// progress slot is released.
    pub async fn run_full_sync(
        &self,
        batch_size_override: Option<usize>,
    ) -> SyncResult<FullSyncReport> {
        let run_id = RunId::new();
        let mut report = FullSyncReport::new();
        self.progress.begin("full sync: starting").await;
        info!("🔄 full sync {run_id} starting");

        // Stage 1.
        report.state = FullSyncState::Stage1Running;
        let scope = self.progress.scoped(0.0, 33.0);
        match self.category_stage_with_scope(run_id, &scope).await {
            Ok(stage1) => {
                report.stage1 = Some(stage1);
                report.state = FullSyncState::Stage1Done;
            }
            Err(e) => return self.fail(report, e).await,
        }
        if self.progress.stop_requested().await {
            return Ok(self.stop(report, "stopped after stage 1").await);
        }

        // Stage 2.
        report.state = FullSyncState::Stage2Running;
        let scope = self.progress.scoped(33.0, 33.0);
        match self.manifest_stage_with_scope(run_id, &scope).await {
            Ok(stage2) => {
                report.stage2 = Some(stage2);
                report.state = FullSyncState::Stage2Done;
            }
            Err(e) => return self.fail(report, e).await,
        }
        if self.progress.stop_requested().await {
            return Ok(self.stop(report, "stopped after stage 2").await);
        }

        // Stage 3.
        report.state = FullSyncState::Stage3Running;
        let scope = self.progress.scoped(66.0, 34.0);
        match self.case_stage_with_scope(run_id, &scope, batch_size_override).await {
            Ok(stage3) => {
                report.stage3 = Some(stage3);
                report.state = FullSyncState::Completed;
            }
            Err(e) => return self.fail(report, e).await,
        }

        report.message = "full sync completed".to_string();
        self.progress.update(100.0, "full sync completed").await;
        self.progress.finish("full sync completed").await;
        info!("✅ full sync {run_id} completed");
        Ok(report)
    }

    async fn stop(&self, mut report: FullSyncReport, message: &str) -> FullSyncReport {
        report.state = FullSyncState::Stopped;
        report.message = message.to_string();
        self.progress.finish(message).await;
        info!("⏹️ full sync {message}");
        report
    }

    async fn fail(
        &self,
        mut report: FullSyncReport,
        e: crate::domain::errors::SyncError,
    ) -> SyncResult<FullSyncReport> {
        let failed_during = report.state;
        report.state = FullSyncState::Failed;
        report.message = e.to_string();
        error!("full sync failed during {failed_during:?}: {e}");
        self.progress.finish(format!("full sync failed: {e}")).await;
        Err(e)
    }

    pub(crate) async fn record_run(
        &self,
        run_id: RunId,
        stage: &str,
        started_at: chrono::DateTime<Utc>,
        status: &str,
        counts: (i64, i64, i64),
        error_text: Option<String>,
    ) {
        let record = crate::domain::entities::SyncRunRecord {
            run_id: run_id.to_string(),
            stage: stage.to_string(),
            started_at,
            finished_at: Utc::now(),
            status: status.to_string(),
            created: counts.0,
            updated: counts.1,
            failed: counts.2,
            error: error_text,
        };
        // Sync-log bookkeeping must not mask the stage outcome.
        if let Err(e) = self.store.record_sync_run(&record).await {
            error!("failed to append sync log row for stage {stage}: {e}");
        }
    }

    pub(crate) fn full_scope(&self) -> ProgressScope {
        self.progress.scoped(0.0, 100.0)
    }
}
