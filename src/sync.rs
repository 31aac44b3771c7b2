//! Sync pipeline: three independently triggerable stages plus the shared
//! progress slot. State between invocations lives in the artifact store.

pub mod pipeline;
pub mod progress;
mod stage_cases;
mod stage_categories;
mod stage_manifest;

pub use pipeline::{FullSyncReport, FullSyncState, Stage1Report, Stage2Report, SyncPipeline};
pub use progress::{ProgressScope, ProgressTracker, SyncProgress};
