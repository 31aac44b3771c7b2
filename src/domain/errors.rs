//! Error taxonomy for the sync and migration engine.
//!
//! Stage- and orchestrator-level failures abort the running operation and
//! surface as one of these variants. Per-case failures inside the Stage 3
//! batch loop are data, not control flow; see `CaseFailure` in the pipeline.

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid remote credentials / endpoint configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Concurrent migration detected, missing prerequisite artifact,
    /// insufficient storage/memory/time budget.
    #[error("precondition not met: {0}")]
    Precondition(String),

    /// Remote gallery API or content store unreachable.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Structural, option or import-payload failure.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("artifact I/O error: {0}")]
    Artifact(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else caught at an orchestration boundary.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl SyncError {
    /// Stable machine-readable code used by the operator response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION",
            Self::Precondition(_) => "PRECONDITION",
            Self::Connectivity(_) => "CONNECTIVITY",
            Self::Validation(_) => "VALIDATION",
            Self::Storage(_) => "STORAGE",
            Self::Artifact(_) => "ARTIFACT",
            Self::Serialization(_) => "SERIALIZATION",
            Self::Fatal(_) => "FATAL",
        }
    }

    /// Whether the caller can reasonably retry the same call after fixing
    /// external state (as opposed to a bug or corrupted payload).
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            Self::Precondition(_) | Self::Connectivity(_) | Self::Storage(_) | Self::Artifact(_)
        )
    }
}
