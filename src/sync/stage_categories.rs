//! Stage 1: category sync.
//!
//! Fetches the remote category/procedure sidebar, upserts one local label
//! per node keyed by normalized slug, and writes the SyncData artifact that
//! gates Stage 2. Re-running updates existing labels instead of duplicating
//! them.

use chrono::Utc;
use tracing::info;

use crate::domain::artifacts::SyncData;
use crate::domain::constants::PROCEDURE_TAXONOMY;
use crate::domain::errors::SyncResult;
use crate::domain::value_objects::{slugify, RunId};

use super::pipeline::{Stage1Report, SyncPipeline};
use super::progress::ProgressScope;

impl SyncPipeline {
    /// Run Stage 1 standalone, occupying the whole progress range.
    pub async fn run_category_stage(&self) -> SyncResult<Stage1Report> {
        let run_id = RunId::new();
        self.progress.begin("stage 1: syncing categories").await;
        let scope = self.full_scope();
        let result = self.category_stage_with_scope(run_id, &scope).await;
        match &result {
            Ok(report) => {
                self.progress
                    .finish(format!(
                        "stage 1 complete: {} created, {} updated",
                        report.created, report.updated
                    ))
                    .await;
            }
            Err(e) => self.progress.finish(format!("stage 1 failed: {e}")).await,
        }
        result
    }

    pub(crate) async fn category_stage_with_scope(
        &self,
        run_id: RunId,
        scope: &ProgressScope,
    ) -> SyncResult<Stage1Report> {
        let started_at = Utc::now();
        match self.category_stage_body(scope).await {
            Ok(report) => {
                self.record_run(
                    run_id,
                    "categories",
                    started_at,
                    "completed",
                    (report.created as i64, report.updated as i64, 0),
                    None,
                )
                .await;
                Ok(report)
            }
            Err(e) => {
                self.record_run(
                    run_id,
                    "categories",
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

    async fn category_stage_body(&self, scope: &ProgressScope) -> SyncResult<Stage1Report> {
        scope.report(0.0, "fetching category sidebar").await;
        let tree = self.gallery.fetch_categories().await?;

        let total_nodes = tree.node_count().max(1) as f32;
        let mut created = 0u64;
        let mut updated = 0u64;
        let mut processed = 0u64;

        for category in &tree.categories {
            let slug_source = category.slug.as_deref().unwrap_or(&category.name);
            let parent = self
                .store
                .upsert_label(PROCEDURE_TAXONOMY, &category.name, &slugify(slug_source), None)
                .await?;
            if parent.created {
                created += 1;
            } else {
                updated += 1;
            }
            processed += 1;

            for procedure in &category.procedures {
                let slug_source = procedure.slug.as_deref().unwrap_or(&procedure.name);
                let upserted = self
                    .store
                    .upsert_label(
                        PROCEDURE_TAXONOMY,
                        &procedure.name,
                        &slugify(slug_source),
                        Some(parent.id),
                    )
                    .await?;
                if upserted.created {
                    created += 1;
                } else {
                    updated += 1;
                }
                processed += 1;
            }

            scope
                .report(
                    processed as f32 / total_nodes * 100.0,
                    format!("synced category {}", category.name),
                )
                .await;
        }

        self.artifacts
            .write_sync_data(&SyncData { generated_at: Utc::now(), tree })
            .await?;

        let report = Stage1Report { created, updated, total: created + updated };
        info!(
            "📁 stage 1 complete: {} labels created, {} updated",
            report.created, report.updated
        );
        scope.report(100.0, "category sync complete").await;
        Ok(report)
    }
}
