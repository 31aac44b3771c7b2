//! Full-fidelity export and guarded import.
//!
//! Export serializes settings, labels, case entities (with metadata, label
//! assignments and attachment rows) and a reference snapshot of the last
//! sync statistics. Import validates the whole payload before writing
//! anything: a rejected document leaves the store untouched.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

use crate::domain::artifacts::Stage3Summary;
use crate::domain::constants::{
    settings, CASE_ENTITY_TYPE, EXPORT_FORMAT_VERSION, MAX_IMPORT_BYTES, MAX_IMPORT_DEPTH,
    META_REMOTE_CASE_ID, PROCEDURE_TAXONOMY,
};
use crate::domain::entities::{CaseImage, EntityDraft, EntityStatus, ImageDraft, ImageKind};
use crate::domain::errors::{SyncError, SyncResult};
use crate::domain::repositories::ContentStore;
use crate::infrastructure::artifact_store::ArtifactStore;

static SCRIPT_MARKERS: Lazy<Regex> =
    Lazy::new(|| {
        // The serialized form escapes quotes, so the attribute pattern
        // tolerates a backslash before the opening quote.
        Regex::new(r#"(?i)<script|javascript:|\bon\w+\s*=\s*\\?['"]"#).expect("static regex")
    });

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub settings: BTreeMap<String, String>,
    pub labels: Vec<ExportedLabel>,
    pub cases: Vec<ExportedCase>,
    pub stats: ExportStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedLabel {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub parent_slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedCase {
    pub title: String,
    pub slug: String,
    pub body: String,
    pub status: EntityStatus,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(default)]
    pub label_slugs: Vec<String>,
    #[serde(default)]
    pub images: Vec<ExportedImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedImage {
    pub kind: ImageKind,
    pub file_path: String,
    pub position: i32,
}

/// Reference snapshot of sync statistics at export time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStats {
    pub case_count: u64,
    pub label_count: u64,
    #[serde(default)]
    pub last_stage3: Option<Stage3Summary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub labels_imported: u64,
    pub cases_imported: u64,
    pub settings_imported: u64,
}

pub struct DataTransfer {
    store: Arc<dyn ContentStore>,
    artifacts: ArtifactStore,
}

impl DataTransfer {
    pub fn new(store: Arc<dyn ContentStore>, artifacts: ArtifactStore) -> Self {
        Self { store, artifacts }
    }

    pub async fn export_data(&self) -> SyncResult<ExportDocument> {
        let settings_map = self.store.settings_with_prefix(settings::PREFIX).await?;

        let raw_labels = self.store.list_labels(PROCEDURE_TAXONOMY).await?;
        let slug_by_id: HashMap<i64, String> =
            raw_labels.iter().map(|l| (l.id, l.slug.clone())).collect();
        let labels: Vec<ExportedLabel> = raw_labels
            .iter()
            .map(|l| ExportedLabel {
                name: l.name.clone(),
                slug: l.slug.clone(),
                parent_slug: l.parent_id.and_then(|p| slug_by_id.get(&p).cloned()),
            })
            .collect();

        let mut cases = Vec::new();
        for entity in self.store.list_entities(CASE_ENTITY_TYPE).await? {
            let meta: BTreeMap<String, String> =
                self.store.list_meta(entity.id).await?.into_iter().collect();
            let label_slugs = self
                .store
                .labels_for_entity(entity.id)
                .await?
                .into_iter()
                .map(|l| l.slug)
                .collect();
            let images = self
                .store
                .list_images(entity.id)
                .await?
                .into_iter()
                .map(|CaseImage { kind, file_path, position, .. }| ExportedImage {
                    kind,
                    file_path,
                    position,
                })
                .collect();
            cases.push(ExportedCase {
                title: entity.title,
                slug: entity.slug,
                body: entity.body,
                status: entity.status,
                meta,
                label_slugs,
                images,
            });
        }

        let stats = ExportStats {
            case_count: cases.len() as u64,
            label_count: labels.len() as u64,
            last_stage3: self.artifacts.read_stage3_summary().await?,
        };

        info!("📤 exported {} cases, {} labels", stats.case_count, stats.label_count);
        Ok(ExportDocument {
            version: EXPORT_FORMAT_VERSION,
            timestamp: Utc::now(),
            settings: settings_map,
            labels,
            cases,
            stats,
        })
    }

    /// Validate, then import labels (parents before children), entities,
    /// and finally settings. Any validation failure aborts before the
    /// first write.
    pub async fn import_data(&self, doc: &serde_json::Value) -> SyncResult<ImportReport> {
        let document = Self::validate_payload(doc)?;

        let mut report = ImportReport::default();

        // Labels: repeated passes resolve parents exported before children
        // in any order; a cycle or dangling parent aborts the import.
        let mut pending: Vec<&ExportedLabel> = document.labels.iter().collect();
        let mut imported: HashMap<String, i64> = HashMap::new();
        while !pending.is_empty() {
            let before = pending.len();
            let mut remaining = Vec::new();
            for label in pending {
                let parent_id = match &label.parent_slug {
                    None => None,
                    Some(parent_slug) => match imported.get(parent_slug) {
                        Some(id) => Some(*id),
                        None => {
                            remaining.push(label);
                            continue;
                        }
                    },
                };
                let upserted = self
                    .store
                    .upsert_label(PROCEDURE_TAXONOMY, &label.name, &label.slug, parent_id)
                    .await?;
                imported.insert(label.slug.clone(), upserted.id);
                report.labels_imported += 1;
            }
            if remaining.len() == before {
                return Err(SyncError::Validation(format!(
                    "{} labels reference parents missing from the payload",
                    remaining.len()
                )));
            }
            pending = remaining;
        }

        // Entities with metadata, label assignments and attachment rows.
        for case in &document.cases {
            let draft = EntityDraft {
                entity_type: CASE_ENTITY_TYPE.to_string(),
                title: case.title.clone(),
                slug: case.slug.clone(),
                body: case.body.clone(),
                status: case.status,
            };
            let entity_id = self.store.create_entity(&draft).await?;
            for (key, value) in &case.meta {
                self.store.set_meta(entity_id, key, value).await?;
            }
            if let Some(case_id) = case.meta.get(META_REMOTE_CASE_ID) {
                self.store.map_case(case_id, entity_id).await?;
            }
            let label_ids: Vec<i64> =
                case.label_slugs.iter().filter_map(|slug| imported.get(slug)).copied().collect();
            self.store.assign_labels(entity_id, &label_ids).await?;
            for image in &case.images {
                self.store
                    .attach_image(
                        entity_id,
                        &ImageDraft {
                            kind: image.kind,
                            file_path: image.file_path.clone(),
                            position: image.position,
                        },
                    )
                    .await?;
            }
            report.cases_imported += 1;
        }

        // Settings last; the backup/status singletons are never imported.
        for (key, value) in &document.settings {
            if key == settings::MIGRATION_BACKUP || key == settings::MIGRATION_STATUS {
                continue;
            }
            self.store.set_setting(key, value).await?;
            report.settings_imported += 1;
        }

        info!(
            "📥 imported {} labels, {} cases, {} settings",
            report.labels_imported, report.cases_imported, report.settings_imported
        );
        Ok(report)
    }

    /// All structural screening happens here, before any write.
    fn validate_payload(doc: &serde_json::Value) -> SyncResult<ExportDocument> {
        let version = doc
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| SyncError::Validation("payload is missing 'version'".to_string()))?;
        if doc.get("timestamp").is_none() {
            return Err(SyncError::Validation("payload is missing 'timestamp'".to_string()));
        }
        if version > u64::from(EXPORT_FORMAT_VERSION) {
            return Err(SyncError::Validation(format!(
                "payload version {version} is newer than supported version {EXPORT_FORMAT_VERSION}"
            )));
        }

        let serialized = serde_json::to_string(doc)?;
        if serialized.len() > MAX_IMPORT_BYTES {
            return Err(SyncError::Validation(format!(
                "payload of {} bytes exceeds the {MAX_IMPORT_BYTES} byte cap",
                serialized.len()
            )));
        }
        if json_depth(doc) > MAX_IMPORT_DEPTH {
            return Err(SyncError::Validation(format!(
                "payload nesting exceeds the depth cap of {MAX_IMPORT_DEPTH}"
            )));
        }
        if SCRIPT_MARKERS.is_match(&serialized) {
            return Err(SyncError::Validation(
                "payload contains script-injection markers".to_string(),
            ));
        }

        let document: ExportDocument = serde_json::from_value(doc.clone())
            .map_err(|e| SyncError::Validation(format!("payload has invalid shape: {e}")))?;

        // Parent references must resolve within the payload itself, checked
        // here so a bad document cannot leave labels half-imported.
        let slugs: std::collections::HashSet<&str> =
            document.labels.iter().map(|l| l.slug.as_str()).collect();
        let dangling = document
            .labels
            .iter()
            .filter(|l| l.parent_slug.as_deref().is_some_and(|p| !slugs.contains(p)))
            .count();
        if dangling > 0 {
            return Err(SyncError::Validation(format!(
                "{dangling} labels reference parents missing from the payload"
            )));
        }

        Ok(document)
    }
}

fn json_depth(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Array(items) => {
            1 + items.iter().map(json_depth).max().unwrap_or(0)
        }
        serde_json::Value::Object(map) => {
            1 + map.values().map(json_depth).max().unwrap_or(0)
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn depth_counts_nested_containers() {
        assert_eq!(json_depth(&json!(1)), 0);
        assert_eq!(json_depth(&json!({"a": 1})), 1);
        assert_eq!(json_depth(&json!({"a": {"b": [1]}})), 3);
    }

    #[test]
    fn script_markers_are_detected() {
        assert!(SCRIPT_MARKERS.is_match("<ScRiPt>alert(1)</script>"));
        assert!(SCRIPT_MARKERS.is_match("javascript:void(0)"));
        assert!(SCRIPT_MARKERS.is_match(r#"<img onerror="x">"#));
        assert!(!SCRIPT_MARKERS.is_match("a plain description of a procedure"));
    }

    #[test]
    fn script_markers_survive_json_escaping() {
        let serialized = serde_json::to_string(&json!({"body": "<img onerror=\"x\">"})).unwrap();
        assert!(SCRIPT_MARKERS.is_match(&serialized));
    }

    #[test]
    fn future_version_is_rejected_before_shape_parsing() {
        let doc = json!({"version": EXPORT_FORMAT_VERSION + 1, "timestamp": "2026-01-01T00:00:00Z"});
        let err = DataTransfer::validate_payload(&doc).unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        assert!(err.to_string().contains("newer"));
    }

    #[test]
    fn missing_version_is_rejected() {
        let doc = json!({"timestamp": "2026-01-01T00:00:00Z"});
        assert!(DataTransfer::validate_payload(&doc).is_err());
    }
}
