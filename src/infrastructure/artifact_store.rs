//! Durable artifact storage.
//!
//! Each artifact is one JSON document in the artifact directory. Artifacts
//! carry pipeline state across invocations and are individually deletable
//! by an operator to force a stage to run again.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::domain::artifacts::{ArtifactKind, Manifest, Stage3Summary, SyncData};
use crate::domain::errors::{SyncError, SyncResult};

#[derive(Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    pub async fn exists(&self, kind: ArtifactKind) -> bool {
        fs::try_exists(self.path(kind)).await.unwrap_or(false)
    }

    pub async fn delete(&self, kind: ArtifactKind) -> SyncResult<bool> {
        let path = self.path(kind);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("🗑️ deleted artifact {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SyncError::Artifact(e)),
        }
    }

    async fn write<T: Serialize>(&self, kind: ArtifactKind, value: &T) -> SyncResult<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path(kind);
        let body = serde_json::to_vec_pretty(value)?;
        // Write-then-rename keeps a reader from observing a torn document.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &path).await?;
        debug!("💾 wrote artifact {}", path.display());
        Ok(())
    }

    async fn read<T: DeserializeOwned>(&self, kind: ArtifactKind) -> SyncResult<Option<T>> {
        let path = self.path(kind);
        let body = match fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::Artifact(e)),
        };
        Ok(Some(serde_json::from_slice(&body)?))
    }

    pub async fn write_sync_data(&self, data: &SyncData) -> SyncResult<()> {
        self.write(ArtifactKind::SyncData, data).await
    }

    pub async fn read_sync_data(&self) -> SyncResult<Option<SyncData>> {
        self.read(ArtifactKind::SyncData).await
    }

    pub async fn write_manifest(&self, manifest: &Manifest) -> SyncResult<()> {
        self.write(ArtifactKind::Manifest, manifest).await
    }

    pub async fn read_manifest(&self) -> SyncResult<Option<Manifest>> {
        self.read(ArtifactKind::Manifest).await
    }

    pub async fn write_stage3_summary(&self, summary: &Stage3Summary) -> SyncResult<()> {
        self.write(ArtifactKind::Stage3Summary, summary).await
    }

    pub async fn read_stage3_summary(&self) -> SyncResult<Option<Stage3Summary>> {
        self.read(ArtifactKind::Stage3Summary).await
    }

    /// Pre-flight write probe: can we create and remove a file here?
    pub async fn probe_writable(&self) -> SyncResult<()> {
        fs::create_dir_all(&self.dir).await?;
        let probe = self.dir.join(".write_probe");
        fs::write(&probe, b"probe").await?;
        fs::remove_file(&probe).await?;
        Ok(())
    }
}
