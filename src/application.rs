//! Application layer: wiring of stores, clients and services into one
//! shared state consumed by the operator command surface.

use anyhow::Result;
use std::sync::Arc;

use crate::domain::gallery::GalleryClient;
use crate::domain::repositories::ContentStore;
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::content_store::SqliteContentStore;
use crate::infrastructure::database_connection::DatabaseConnection;
use crate::infrastructure::gallery_client::HttpGalleryClient;
use crate::infrastructure::media_store::MediaStore;
use crate::migration::MigrationOrchestrator;
use crate::sync::{ProgressTracker, SyncPipeline};
use crate::validation::DataValidator;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn ContentStore>,
    pub gallery: Arc<dyn GalleryClient>,
    pub artifacts: ArtifactStore,
    pub progress: ProgressTracker,
    pub pipeline: Arc<SyncPipeline>,
    pub validator: Arc<DataValidator>,
    pub orchestrator: Arc<MigrationOrchestrator>,
}

impl AppState {
    /// Production wiring: sqlite content store plus the HTTP gallery
    /// client, both from configuration.
    pub async fn initialize(config: AppConfig) -> Result<Self> {
        let db = DatabaseConnection::new(&config.storage.database_url).await?;
        db.migrate().await?;
        let store: Arc<dyn ContentStore> = Arc::new(SqliteContentStore::new(db.pool().clone()));
        let gallery: Arc<dyn GalleryClient> = Arc::new(HttpGalleryClient::new(&config.gallery)?);
        Ok(Self::assemble(config, store, gallery))
    }

    /// Wiring with externally supplied collaborators; tests inject an
    /// in-memory store and a scripted gallery client here.
    pub fn assemble(
        config: AppConfig,
        store: Arc<dyn ContentStore>,
        gallery: Arc<dyn GalleryClient>,
    ) -> Self {
        let artifacts = ArtifactStore::new(config.artifact_dir());
        let media = MediaStore::new(config.media_dir());
        let progress = ProgressTracker::new();

        let pipeline = Arc::new(SyncPipeline::new(
            gallery.clone(),
            store.clone(),
            artifacts.clone(),
            media.clone(),
            progress.clone(),
            config.sync.clone(),
        ));
        let validator = Arc::new(DataValidator::new(
            store.clone(),
            gallery.clone(),
            config.gallery.clone(),
        ));
        let orchestrator = Arc::new(MigrationOrchestrator::new(
            store.clone(),
            gallery.clone(),
            pipeline.clone(),
            validator.clone(),
            artifacts.clone(),
            media,
            config.clone(),
        ));

        Self { config, store, gallery, artifacts, progress, pipeline, validator, orchestrator }
    }
}
