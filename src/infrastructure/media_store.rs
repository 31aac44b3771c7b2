//! Local media storage for downloaded case images.
//!
//! Files live under `<media_dir>/<case_id>/`; attachment rows in the
//! content store reference these paths. Re-materializing a case overwrites
//! its files in place, so resuming a killed run cannot duplicate them.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::errors::SyncResult;

#[derive(Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist image bytes for a case; returns the stored file path.
    pub async fn save_image(
        &self,
        case_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> SyncResult<PathBuf> {
        let case_dir = self.dir.join(sanitize(case_id));
        fs::create_dir_all(&case_dir).await?;
        let path = case_dir.join(sanitize(file_name));
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Remove every stored file of a case. Missing directories are fine.
    pub async fn remove_case(&self, case_id: &str) -> SyncResult<()> {
        let case_dir = self.dir.join(sanitize(case_id));
        match fs::remove_dir_all(&case_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn file_exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }
}

/// Keep stored names flat: path separators and parent references are
/// replaced so a remote-supplied name cannot escape the media directory.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == ':' { '_' } else { c })
        .collect();
    cleaned.replace("..", "_")
}
