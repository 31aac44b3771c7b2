//! Configuration infrastructure
//!
//! Layered configuration: built-in defaults, then an optional TOML file in
//! the application config directory, then `GALLERY_SYNC_*` environment
//! overrides. The resolved `AppConfig` is immutable for the lifetime of a
//! process; operators edit the file and restart.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub gallery: GalleryConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Remote gallery API access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// Base URL of the remote gallery API.
    pub api_base_url: String,
    /// Bearer token for the configured gallery. Empty means unconfigured.
    pub api_token: String,
    /// Request timeout in seconds. Remote calls are short-lived.
    pub request_timeout_seconds: u64,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://app.galleryservice.example/api/v1".to_string(),
            api_token: String::new(),
            request_timeout_seconds: 30,
        }
    }
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Case ids processed per Stage 3 batch.
    pub batch_size: usize,
    /// Pause between Stage 3 batches in milliseconds.
    pub inter_batch_delay_ms: u64,
    /// Minimum available memory required before a migration starts (bytes).
    pub min_available_memory_bytes: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            inter_batch_delay_ms: 250,
            min_available_memory_bytes: 128 * 1024 * 1024,
        }
    }
}

/// Durable storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sqlite database URL for the content store.
    pub database_url: String,
    /// Directory holding sync artifacts and downloaded media.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = default_data_dir();
        Self {
            database_url: format!("sqlite://{}", base.join("gallery.db").display()),
            data_dir: base,
        }
    }
}

/// Logging configuration consumed by `infrastructure::logging`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter, e.g. "info" or "case_gallery_sync=debug".
    pub filter: String,
    /// Also write a daily-rolled log file under `log_dir`.
    pub file_output: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file_output: true,
            log_dir: default_data_dir().join("logs"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gallery: GalleryConfig::default(),
            sync: SyncConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn artifact_dir(&self) -> PathBuf {
        self.storage.data_dir.join("artifacts")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.storage.data_dir.join("media")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("case-gallery-sync")
}

/// Loads the layered configuration.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("platform config directory unavailable")?
            .join("case-gallery-sync");
        Ok(Self { config_path: config_dir.join("config.toml") })
    }

    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self { config_path: path.as_ref().to_path_buf() }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Resolve defaults → file (if present) → environment overrides.
    pub fn load(&self) -> Result<AppConfig> {
        let defaults = Config::try_from(&AppConfig::default())
            .context("failed to serialize built-in defaults")?;

        let mut builder = Config::builder().add_source(defaults);
        if self.config_path.exists() {
            info!("loading configuration from {}", self.config_path.display());
            builder = builder.add_source(
                File::from(self.config_path.clone()).format(FileFormat::Toml),
            );
        }
        builder = builder.add_source(
            Environment::with_prefix("GALLERY_SYNC").separator("__"),
        );

        let resolved: AppConfig = builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("configuration has invalid shape")?;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.gallery.request_timeout_seconds, 30);
        assert!(config.sync.batch_size > 0);
        assert!(config.storage.database_url.starts_with("sqlite://"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let manager = ConfigManager::with_path("/nonexistent/config.toml");
        let config = manager.load().expect("defaults should load");
        assert_eq!(config.sync.batch_size, AppConfig::default().sync.batch_size);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sync]\nbatch_size = 7\n").unwrap();
        let config = ConfigManager::with_path(&path).load().unwrap();
        assert_eq!(config.sync.batch_size, 7);
    }
}
