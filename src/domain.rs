//! Domain module - core business model of the sync and migration engine
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod artifacts;
pub mod constants;
pub mod entities;
pub mod errors;
pub mod gallery;
pub mod migration;
pub mod repositories;
pub mod value_objects;

// Re-export commonly used items for convenience
pub use artifacts::{ArtifactKind, Manifest, ManifestEntry, Stage3Summary, SyncData};
pub use entities::{
    CaseEntity, CaseImage, EntityDraft, EntityStatus, ImageDraft, ImageKind, Label, LabelUpsert,
    SyncRunRecord,
};
pub use errors::{SyncError, SyncResult};
pub use gallery::{CaseIdPage, CasePayload, CategoryTree, GalleryClient};
pub use migration::{
    CleanupPolicy, MigrationBackup, MigrationMode, MigrationOptions, MigrationState,
    MigrationStatus, MigrationType,
};
pub use repositories::ContentStore;
