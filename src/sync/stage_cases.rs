//! Stage 3: case materialization.
//!
//! Requires the Manifest. Processes case ids in batches: each case payload
//! is fetched, upserted as a local entity keyed by its remote case id,
//! its images downloaded into the media store, and its procedure labels
//! assigned. One failing case never aborts the stage; failures are counted
//! and kept in a capped error list. Between batches the pipeline clears
//! the store's read cache and sleeps briefly to bound burst load.
//!
//! Upserts are idempotent and image attachment replaces rather than
//! appends, so a run killed mid-batch can simply be re-invoked.

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::artifacts::Stage3Summary;
use crate::domain::constants::{CASE_ENTITY_TYPE, META_PROCEDURE_IDS, META_REMOTE_CASE_ID, PROCEDURE_TAXONOMY};
use crate::domain::entities::{EntityDraft, EntityStatus, ImageDraft, ImageKind};
use crate::domain::errors::{SyncError, SyncResult};
use crate::domain::gallery::{CasePayload, RemotePhotoKind};
use crate::domain::value_objects::{slugify, RunId};

use super::pipeline::SyncPipeline;
use super::progress::ProgressScope;

enum UpsertOutcome {
    Created,
    Updated,
}

impl SyncPipeline {
    /// Run Stage 3 standalone, occupying the whole progress range.
    pub async fn run_case_stage(
        &self,
        batch_size_override: Option<usize>,
    ) -> SyncResult<Stage3Summary> {
        let run_id = RunId::new();
        self.progress.begin("stage 3: materializing cases").await;
        let scope = self.full_scope();
        let result = self.case_stage_with_scope(run_id, &scope, batch_size_override).await;
        match &result {
            Ok(summary) => {
                self.progress
                    .finish(format!(
                        "stage 3 complete: {} created, {} updated, {} failed",
                        summary.created, summary.updated, summary.failed
                    ))
                    .await;
            }
            Err(e) => self.progress.finish(format!("stage 3 failed: {e}")).await,
        }
        result
    }

    pub(crate) async fn case_stage_with_scope(
        &self,
        run_id: RunId,
        scope: &ProgressScope,
        batch_size_override: Option<usize>,
    ) -> SyncResult<Stage3Summary> {
        let started_at = Utc::now();
        match self.case_stage_body(scope, batch_size_override).await {
            Ok(summary) => {
                self.record_run(
                    run_id,
                    "cases",
                    started_at,
                    "completed",
                    (summary.created as i64, summary.updated as i64, summary.failed as i64),
                    None,
                )
                .await;
                Ok(summary)
            }
            Err(e) => {
                self.record_run(run_id, "cases", started_at, "failed", (0, 0, 0), Some(e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    async fn case_stage_body(
        &self,
        scope: &ProgressScope,
        batch_size_override: Option<usize>,
    ) -> SyncResult<Stage3Summary> {
        let manifest = self.artifacts.read_manifest().await?.ok_or_else(|| {
            SyncError::Precondition(
                "manifest artifact missing; run the manifest stage first".to_string(),
            )
        })?;

        let cases: Vec<(String, Vec<String>)> = manifest.distinct_cases().into_iter().collect();
        let batch_size = batch_size_override.unwrap_or(self.config.batch_size).max(1);

        // Procedure id → local label id, resolved once up front.
        let mut label_ids: HashMap<String, i64> = HashMap::new();
        for (procedure_id, entry) in &manifest.entries {
            let slug = slugify(&entry.procedure_name);
            match self.store.get_label_by_slug(PROCEDURE_TAXONOMY, &slug).await? {
                Some(label) => {
                    label_ids.insert(procedure_id.clone(), label.id);
                }
                None => warn!("no local label for procedure {procedure_id} (slug {slug})"),
            }
        }

        let mut summary = Stage3Summary {
            completed_at: Utc::now(),
            created: 0,
            updated: 0,
            failed: 0,
            processed: 0,
            total: cases.len() as u64,
            errors: Vec::new(),
            suppressed_errors: 0,
        };

        self.store.begin_bulk().await?;
        let body = self.process_batches(&cases, batch_size, &label_ids, &mut summary, scope).await;
        // Integrity enforcement is restored whether or not the pass failed.
        let epilogue = self.store.end_bulk().await;
        body?;
        epilogue?;

        summary.completed_at = Utc::now();
        self.artifacts.write_stage3_summary(&summary).await?;
        info!(
            "📦 stage 3 complete: {} created, {} updated, {} failed of {}",
            summary.created, summary.updated, summary.failed, summary.total
        );
        Ok(summary)
    }

    async fn process_batches(
        &self,
        cases: &[(String, Vec<String>)],
        batch_size: usize,
        label_ids: &HashMap<String, i64>,
        summary: &mut Stage3Summary,
        scope: &ProgressScope,
    ) -> SyncResult<()> {
        let total = summary.total.max(1);
        let batch_count = cases.len().div_ceil(batch_size);

        for (batch_index, batch) in cases.chunks(batch_size).enumerate() {
            let fetches =
                join_all(batch.iter().map(|(case_id, _)| self.gallery.fetch_case(case_id))).await;

            for ((case_id, procedure_ids), fetched) in batch.iter().zip(fetches) {
                match fetched {
                    Ok(payload) => {
                        match self.materialize_case(&payload, procedure_ids, label_ids).await {
                            Ok(UpsertOutcome::Created) => summary.created += 1,
                            Ok(UpsertOutcome::Updated) => summary.updated += 1,
                            Err(e) => {
                                summary.failed += 1;
                                summary.record_error(format!("case {case_id}: {e}"));
                            }
                        }
                    }
                    Err(e) => {
                        summary.failed += 1;
                        summary.record_error(format!("case {case_id}: fetch failed: {e}"));
                    }
                }
                summary.processed += 1;
            }

            scope
                .report(
                    summary.processed as f32 / total as f32 * 100.0,
                    format!("materialized batch {}/{}", batch_index + 1, batch_count),
                )
                .await;

            if batch_index + 1 < batch_count {
                self.store.cache_clear().await?;
                tokio::time::sleep(Duration::from_millis(self.config.inter_batch_delay_ms)).await;
            }
        }
        Ok(())
    }

    /// Create or update the local entity for one case payload. Presence of
    /// a mapping for the remote case id decides update vs. create.
    async fn materialize_case(
        &self,
        payload: &CasePayload,
        manifest_procedure_ids: &[String],
        label_ids: &HashMap<String, i64>,
    ) -> SyncResult<UpsertOutcome> {
        let title = payload
            .title
            .clone()
            .unwrap_or_else(|| format!("Case {}", payload.id));
        let draft = EntityDraft {
            entity_type: CASE_ENTITY_TYPE.to_string(),
            title,
            slug: format!("case-{}", slugify(&payload.id)),
            body: payload.details.clone(),
            status: EntityStatus::Published,
        };

        let (entity_id, outcome) = match self.store.entity_for_case(&payload.id).await? {
            Some(id) => {
                self.store.update_entity(id, &draft).await?;
                (id, UpsertOutcome::Updated)
            }
            None => {
                let id = self.store.create_entity(&draft).await?;
                self.store.map_case(&payload.id, id).await?;
                (id, UpsertOutcome::Created)
            }
        };

        self.store.set_meta(entity_id, META_REMOTE_CASE_ID, &payload.id).await?;

        let mut procedures: Vec<String> = manifest_procedure_ids.to_vec();
        for extra in &payload.procedure_ids {
            if !procedures.contains(extra) {
                procedures.push(extra.clone());
            }
        }
        self.store
            .set_meta(entity_id, META_PROCEDURE_IDS, &serde_json::to_string(&procedures)?)
            .await?;

        // Replace attachments wholesale; files are overwritten in place so
        // a resumed run cannot double-attach.
        self.store.remove_images(entity_id).await?;
        for (index, photo) in payload.photos.iter().enumerate() {
            let bytes = self.gallery.fetch_image(&photo.url).await?;
            let file_name = image_file_name(&photo.url, photo.kind, index);
            let path = self.media.save_image(&payload.id, &file_name, &bytes).await?;
            let kind = match photo.kind {
                RemotePhotoKind::Primary => ImageKind::Primary,
                RemotePhotoKind::Before => ImageKind::Before,
                RemotePhotoKind::After => ImageKind::After,
            };
            self.store
                .attach_image(
                    entity_id,
                    &ImageDraft {
                        kind,
                        file_path: path.display().to_string(),
                        position: index as i32,
                    },
                )
                .await?;
        }

        let assigned: Vec<i64> =
            procedures.iter().filter_map(|p| label_ids.get(p)).copied().collect();
        self.store.assign_labels(entity_id, &assigned).await?;

        Ok(outcome)
    }
}

/// File name for a downloaded photo: the URL's final path segment when it
/// has one, otherwise a deterministic kind-indexed name.
fn image_file_name(url: &str, kind: RemotePhotoKind, index: usize) -> String {
    let fallback = || {
        let kind = match kind {
            RemotePhotoKind::Primary => "primary",
            RemotePhotoKind::Before => "before",
            RemotePhotoKind::After => "after",
        };
        format!("{kind}-{}.jpg", index + 1)
    };
    match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.last().map(str::to_string))
            .filter(|segment| segment.contains('.'))
            .unwrap_or_else(fallback),
        Err(_) => fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_file_name_prefers_url_segment() {
        assert_eq!(
            image_file_name("https://cdn.example/photos/before-123.png", RemotePhotoKind::Before, 0),
            "before-123.png"
        );
    }

    #[test]
    fn image_file_name_falls_back_to_kind_and_index() {
        assert_eq!(
            image_file_name("https://cdn.example/photos/raw", RemotePhotoKind::After, 2),
            "after-3.jpg"
        );
        assert_eq!(image_file_name("not a url", RemotePhotoKind::Primary, 0), "primary-1.jpg");
    }
}
