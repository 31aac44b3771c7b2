//! Export/import: full-fidelity round trip and the import guard rails.

mod common;

use std::sync::Arc;

use case_gallery_sync::domain::constants::{CASE_ENTITY_TYPE, PROCEDURE_TAXONOMY};
use case_gallery_sync::domain::repositories::ContentStore;
use common::{test_state, MockGalleryClient};

#[tokio::test]
async fn export_import_round_trip_preserves_structure() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (source, _source_dir) = test_state(mock.clone()).await;

    source.pipeline.run_full_sync(None).await.unwrap();
    source.store.set_setting("gallery_mode", "local").await.unwrap();
    let document = source.orchestrator.export_data().await.unwrap();
    assert_eq!(document.stats.case_count, mock.total_distinct_cases());
    assert_eq!(document.stats.label_count, 5);
    assert!(document.stats.last_stage3.is_some());

    let doc_value = serde_json::to_value(&document).unwrap();
    let (target, _target_dir) = test_state(Arc::new(MockGalleryClient::with_sample_data())).await;
    let report = target.orchestrator.import_data(&doc_value).await.unwrap();

    assert_eq!(report.cases_imported, mock.total_distinct_cases());
    assert_eq!(report.labels_imported, 5);
    assert!(report.settings_imported >= 1);

    // Parent links were rebuilt through slugs.
    let labels = target.store.list_labels(PROCEDURE_TAXONOMY).await.unwrap();
    let body = labels.iter().find(|l| l.slug == "body").unwrap();
    let tummy = labels.iter().find(|l| l.slug == "tummy-tuck").unwrap();
    assert_eq!(tummy.parent_id, Some(body.id));

    // Case mappings were rebuilt from the remote case id metadata.
    assert!(target.store.entity_for_case("c3").await.unwrap().is_some());
    assert_eq!(
        target.store.get_setting("gallery_mode").await.unwrap().as_deref(),
        Some("local")
    );
}

#[tokio::test]
async fn import_rejects_a_future_version_with_no_partial_writes() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (state, _dir) = test_state(mock).await;

    let doc = serde_json::json!({
        "version": 99,
        "timestamp": "2026-08-01T00:00:00Z",
        "settings": {"gallery_mode": "local"},
        "labels": [{"name": "Body", "slug": "body"}],
        "cases": [],
        "stats": {"case_count": 0, "label_count": 1}
    });
    let err = state.orchestrator.import_data(&doc).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION");

    assert!(state.store.list_entities(CASE_ENTITY_TYPE).await.unwrap().is_empty());
    assert!(state.store.list_labels(PROCEDURE_TAXONOMY).await.unwrap().is_empty());
    assert!(state.store.get_setting("gallery_mode").await.unwrap().is_none());
}

#[tokio::test]
async fn import_rejects_payloads_nested_past_the_depth_cap() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (state, _dir) = test_state(mock).await;

    let mut nested = serde_json::json!("leaf");
    for _ in 0..20 {
        nested = serde_json::json!({ "inner": nested });
    }
    let doc = serde_json::json!({
        "version": 1,
        "timestamp": "2026-08-01T00:00:00Z",
        "settings": {},
        "labels": [],
        "cases": [],
        "stats": {"case_count": 0, "label_count": 0, "extra": nested}
    });

    let err = state.orchestrator.import_data(&doc).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
    assert!(err.to_string().contains("depth"));
    assert!(state.store.list_entities(CASE_ENTITY_TYPE).await.unwrap().is_empty());
}

#[tokio::test]
async fn import_rejects_script_injection_markers() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (state, _dir) = test_state(mock).await;

    let doc = serde_json::json!({
        "version": 1,
        "timestamp": "2026-08-01T00:00:00Z",
        "settings": {},
        "labels": [],
        "cases": [{
            "title": "Case",
            "slug": "case",
            "body": "<script>alert(1)</script>",
            "status": "published"
        }],
        "stats": {"case_count": 1, "label_count": 0}
    });

    let err = state.orchestrator.import_data(&doc).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
    assert!(state.store.list_entities(CASE_ENTITY_TYPE).await.unwrap().is_empty());
}

#[tokio::test]
async fn import_rejects_labels_with_unresolvable_parents() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (state, _dir) = test_state(mock).await;

    let doc = serde_json::json!({
        "version": 1,
        "timestamp": "2026-08-01T00:00:00Z",
        "settings": {},
        "labels": [{"name": "Orphan", "slug": "orphan", "parent_slug": "never-exported"}],
        "cases": [],
        "stats": {"case_count": 0, "label_count": 1}
    });

    let err = state.orchestrator.import_data(&doc).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
    assert!(err.to_string().contains("parents"));
}
