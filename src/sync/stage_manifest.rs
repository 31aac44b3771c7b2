//! Stage 2: manifest build.
//!
//! Requires the SyncData artifact. Paginates each procedure's case-id
//! listing until exhausted and writes the Manifest that gates Stage 3. If a
//! manifest already exists the stage returns its counts immediately without
//! contacting the remote API; delete the artifact to force a rebuild.

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::info;

use crate::domain::artifacts::{Manifest, ManifestEntry};
use crate::domain::errors::{SyncError, SyncResult};
use crate::domain::value_objects::RunId;

use super::pipeline::{Stage2Report, SyncPipeline};
use super::progress::ProgressScope;

impl SyncPipeline {
    /// Run Stage 2 standalone, occupying the whole progress range.
    pub async fn run_manifest_stage(&self) -> SyncResult<Stage2Report> {
        let run_id = RunId::new();
        self.progress.begin("stage 2: building case manifest").await;
        let scope = self.full_scope();
        let result = self.manifest_stage_with_scope(run_id, &scope).await;
        match &result {
            Ok(report) if report.reused => {
                self.progress
                    .finish(format!("stage 2: manifest already present ({} cases)", report.total_cases))
                    .await;
            }
            Ok(report) => {
                self.progress
                    .finish(format!("stage 2 complete: {} cases indexed", report.total_cases))
                    .await;
            }
            Err(e) => self.progress.finish(format!("stage 2 failed: {e}")).await,
        }
        result
    }

    pub(crate) async fn manifest_stage_with_scope(
        &self,
        run_id: RunId,
        scope: &ProgressScope,
    ) -> SyncResult<Stage2Report> {
        let started_at = Utc::now();
        match self.manifest_stage_body(scope).await {
            Ok(report) => {
                if !report.reused {
                    self.record_run(
                        run_id,
                        "manifest",
                        started_at,
                        "completed",
                        (report.total_cases as i64, 0, 0),
                        None,
                    )
                    .await;
                }
                Ok(report)
            }
            Err(e) => {
                self.record_run(
                    run_id,
                    "manifest",
                    started_at,
                    "failed",
                    (0, 0, 0),
                    Some(e.to_string()),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn manifest_stage_body(&self, scope: &ProgressScope) -> SyncResult<Stage2Report> {
        // Idempotence guarantee: an existing manifest short-circuits the
        // stage, reporting stored counts without re-fetching anything.
        if let Some(existing) = self.artifacts.read_manifest().await? {
            info!("📒 manifest already present, reporting existing counts");
            scope.report(100.0, "manifest already present").await;
            return Ok(Stage2Report {
                procedures: existing.entries.len() as u64,
                total_cases: existing.total_cases(),
                reused: true,
            });
        }

        let sync_data = self.artifacts.read_sync_data().await?.ok_or_else(|| {
            SyncError::Precondition(
                "sync data artifact missing; run the category stage first".to_string(),
            )
        })?;

        let procedures: Vec<_> = sync_data
            .tree
            .procedures()
            .map(|p| (p.id.clone(), p.name.clone()))
            .collect();
        let total_procedures = procedures.len().max(1) as f32;

        let mut entries: BTreeMap<String, ManifestEntry> = BTreeMap::new();
        for (index, (procedure_id, procedure_name)) in procedures.iter().enumerate() {
            let mut case_ids: Vec<String> = Vec::new();
            let mut page = 1u32;
            loop {
                let listing = self.gallery.fetch_case_ids(procedure_id, page).await?;
                case_ids.extend(listing.ids);
                if !listing.has_more {
                    break;
                }
                page += 1;
            }

            scope
                .report(
                    (index + 1) as f32 / total_procedures * 100.0,
                    format!("indexed {} ({} cases)", procedure_name, case_ids.len()),
                )
                .await;

            entries.insert(
                procedure_id.clone(),
                ManifestEntry {
                    procedure_name: procedure_name.clone(),
                    case_count: case_ids.len() as u64,
                    case_ids,
                },
            );
        }

        let manifest = Manifest { generated_at: Utc::now(), entries };
        let report = Stage2Report {
            procedures: manifest.entries.len() as u64,
            total_cases: manifest.total_cases(),
            reused: false,
        };
        self.artifacts.write_manifest(&manifest).await?;
        info!(
            "📒 stage 2 complete: {} procedures, {} cases indexed",
            report.procedures, report.total_cases
        );
        Ok(report)
    }
}
