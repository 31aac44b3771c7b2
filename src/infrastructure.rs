//! Infrastructure layer: database connections, remote API access, durable
//! artifact/media storage, configuration, logging and host probes.

pub mod artifact_store;
pub mod config;
pub mod content_store;
pub mod database_connection;
pub mod gallery_client;
pub mod logging;
pub mod media_store;
pub mod system_probe;

// Re-export commonly used items
pub use artifact_store::ArtifactStore;
pub use config::{AppConfig, ConfigManager};
pub use content_store::SqliteContentStore;
pub use database_connection::DatabaseConnection;
pub use gallery_client::HttpGalleryClient;
pub use media_store::MediaStore;
