//! Data validation: integrity checks, best-effort repair, and migration
//! readiness probes.

pub mod integrity;
pub mod migration_checks;
pub mod report;

use std::sync::Arc;

use crate::domain::gallery::GalleryClient;
use crate::domain::repositories::ContentStore;
use crate::infrastructure::config::GalleryConfig;

pub use report::{CheckReport, FixReport, IntegrityReport};

pub struct DataValidator {
    pub(crate) store: Arc<dyn ContentStore>,
    pub(crate) gallery: Arc<dyn GalleryClient>,
    pub(crate) gallery_config: GalleryConfig,
}

impl DataValidator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        gallery: Arc<dyn GalleryClient>,
        gallery_config: GalleryConfig,
    ) -> Self {
        Self { store, gallery, gallery_config }
    }
}
