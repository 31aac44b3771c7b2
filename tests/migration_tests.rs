//! Orchestrator behavior: preconditions, backup/rollback, both migration
//! directions, and the advisory running guard.

mod common;

use std::sync::Arc;

use case_gallery_sync::domain::constants::{settings, CASE_ENTITY_TYPE};
use case_gallery_sync::domain::entities::EntityStatus;
use case_gallery_sync::domain::migration::{
    CleanupPolicy, MigrationOptions, MigrationState, MigrationStatus, MigrationType,
};
use case_gallery_sync::domain::repositories::ContentStore;
use case_gallery_sync::migration::BackupManager;
use common::{test_state, MockGalleryClient};

#[tokio::test]
async fn rollback_without_backup_returns_false_and_changes_nothing() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (state, _dir) = test_state(mock).await;

    state.store.set_setting("gallery_mode", "api").await.unwrap();
    assert!(!state.orchestrator.rollback().await);
    assert_eq!(
        state.store.get_setting("gallery_mode").await.unwrap().as_deref(),
        Some("api")
    );
}

#[tokio::test]
async fn rollback_restores_settings_and_entity_statuses() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (state, _dir) = test_state(mock).await;

    // Seed three engine settings and one published entity.
    for (key, value) in [
        ("gallery_mode", "api"),
        ("gallery_page_size", "10"),
        ("gallery_default_sort", "newest"),
    ] {
        state.store.set_setting(key, value).await.unwrap();
    }
    state.pipeline.run_full_sync(None).await.unwrap();
    let entities = state.store.list_entities(CASE_ENTITY_TYPE).await.unwrap();
    assert_eq!(entities[0].status, EntityStatus::Published);
    let entity_id = entities[0].id;

    let backup = BackupManager::new(state.store.clone());
    backup.create_backup().await.unwrap();

    // Mutate everything the backup covers.
    state.store.set_setting("gallery_mode", "local").await.unwrap();
    state.store.set_setting("gallery_page_size", "50").await.unwrap();
    state.store.delete_setting("gallery_default_sort").await.unwrap();
    state.store.set_setting("gallery_new_flag", "1").await.unwrap();
    state.store.set_entity_status(entity_id, EntityStatus::Archived).await.unwrap();

    assert!(state.orchestrator.rollback().await);

    assert_eq!(state.store.get_setting("gallery_mode").await.unwrap().as_deref(), Some("api"));
    assert_eq!(state.store.get_setting("gallery_page_size").await.unwrap().as_deref(), Some("10"));
    assert_eq!(
        state.store.get_setting("gallery_default_sort").await.unwrap().as_deref(),
        Some("newest")
    );
    // A setting created after the backup does not survive rollback.
    assert!(state.store.get_setting("gallery_new_flag").await.unwrap().is_none());
    let entity = state.store.get_entity(entity_id).await.unwrap().unwrap();
    assert_eq!(entity.status, EntityStatus::Published);

    // The backup was consumed; a second rollback is a no-op.
    assert!(!state.orchestrator.rollback().await);
}

#[tokio::test]
async fn migrate_to_local_happy_path() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (state, _dir) = test_state(mock.clone()).await;

    let succeeded = state.orchestrator.migrate_to_local(&MigrationOptions::default()).await;
    assert!(succeeded);

    let status = state.orchestrator.status().await.unwrap().unwrap();
    assert_eq!(status.state, MigrationState::Completed);
    assert_eq!(status.migration_type, Some(MigrationType::ToLocal));

    assert_eq!(state.store.get_setting(settings::MODE).await.unwrap().as_deref(), Some("local"));
    let entities = state.store.list_entities(CASE_ENTITY_TYPE).await.unwrap();
    assert_eq!(entities.len(), mock.total_distinct_cases() as usize);
}

#[tokio::test]
async fn migrate_to_local_fails_when_the_gallery_is_unreachable() {
    let mut mock = MockGalleryClient::with_sample_data();
    mock.healthy = false;
    let (state, _dir) = test_state(Arc::new(mock)).await;

    let succeeded = state.orchestrator.migrate_to_local(&MigrationOptions::default()).await;
    assert!(!succeeded);

    let status = state.orchestrator.status().await.unwrap().unwrap();
    assert_eq!(status.state, MigrationState::Failed);
    assert!(!status.message.is_empty());

    // The backup taken before pre-flight is still there for rollback.
    assert!(state.orchestrator.rollback().await);
}

#[tokio::test]
async fn migrate_to_api_archives_local_entities() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (state, _dir) = test_state(mock).await;

    assert!(state.orchestrator.migrate_to_local(&MigrationOptions::default()).await);
    assert!(state.orchestrator.migrate_to_api(&MigrationOptions::default()).await);

    assert_eq!(state.store.get_setting(settings::MODE).await.unwrap().as_deref(), Some("api"));
    let entities = state.store.list_entities(CASE_ENTITY_TYPE).await.unwrap();
    assert!(!entities.is_empty());
    assert!(entities.iter().all(|e| e.status == EntityStatus::Archived));
}

#[tokio::test]
async fn migrate_to_api_delete_policy_removes_entities_and_mappings() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (state, _dir) = test_state(mock).await;
    assert!(state.orchestrator.migrate_to_local(&MigrationOptions::default()).await);

    let options = MigrationOptions {
        preserve_data: false,
        cleanup: CleanupPolicy::Delete,
        ..MigrationOptions::default()
    };
    assert!(state.orchestrator.migrate_to_api(&options).await);

    assert!(state.store.list_entities(CASE_ENTITY_TYPE).await.unwrap().is_empty());
    assert!(state.store.list_case_mappings().await.unwrap().is_empty());
    // Artifacts went with the data.
    assert!(state.artifacts.read_sync_data().await.unwrap().is_none());
    assert!(state.artifacts.read_manifest().await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_option_combinations_are_rejected_before_any_mutation() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (state, _dir) = test_state(mock).await;

    let options = MigrationOptions {
        preserve_data: false,
        cleanup: CleanupPolicy::Archive,
        ..MigrationOptions::default()
    };
    assert!(!state.orchestrator.migrate_to_api(&options).await);

    // Nothing ran: no status, no backup.
    assert!(state.orchestrator.status().await.unwrap().is_none());
    assert!(state.store.get_setting(settings::MIGRATION_BACKUP).await.unwrap().is_none());
}

#[tokio::test]
async fn a_running_migration_blocks_a_second_one() {
    let mock = Arc::new(MockGalleryClient::with_sample_data());
    let (state, _dir) = test_state(mock).await;

    let running = MigrationStatus::running(MigrationType::ToApi, "in progress elsewhere");
    state
        .store
        .set_setting(settings::MIGRATION_STATUS, &serde_json::to_string(&running).unwrap())
        .await
        .unwrap();

    assert!(!state.orchestrator.migrate_to_local(&MigrationOptions::default()).await);

    // The blocked attempt must not overwrite the owner's status.
    let status = state.orchestrator.status().await.unwrap().unwrap();
    assert_eq!(status.state, MigrationState::Running);
    assert_eq!(status.message, "in progress elsewhere");
}
