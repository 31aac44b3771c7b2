//! Shared test fixtures: a scripted gallery client with call counters and
//! an app state wired to an in-memory sqlite store and tempdir storage.

// Each test binary compiles this module separately and uses a subset of it.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

use case_gallery_sync::application::AppState;
use case_gallery_sync::domain::errors::{SyncError, SyncResult};
use case_gallery_sync::domain::gallery::{
    CaseIdPage, CasePayload, CategoryTree, GalleryClient, RemoteCategory, RemotePhoto,
    RemotePhotoKind, RemoteProcedure,
};
use case_gallery_sync::domain::repositories::ContentStore;
use case_gallery_sync::infrastructure::config::AppConfig;
use case_gallery_sync::infrastructure::content_store::SqliteContentStore;
use case_gallery_sync::infrastructure::database_connection::DatabaseConnection;
use case_gallery_sync::sync::ProgressTracker;

/// Scripted remote gallery. Every fetch is counted so tests can assert
/// which calls a stage did (or did not) make.
pub struct MockGalleryClient {
    pub tree: CategoryTree,
    /// procedure id → pages of case ids, in listing order.
    pub case_pages: HashMap<String, Vec<Vec<String>>>,
    pub cases: HashMap<String, CasePayload>,
    pub failing_cases: HashSet<String>,
    pub healthy: bool,
    pub categories_calls: AtomicU32,
    pub case_id_calls: AtomicU32,
    pub case_calls: AtomicU32,
    /// When set, `fetch_categories` requests a stop on this tracker,
    /// simulating an operator pressing stop while stage 1 runs.
    pub stop_during_categories: Mutex<Option<ProgressTracker>>,
}

impl MockGalleryClient {
    /// Two categories, three procedures, five distinct cases (one shared
    /// between two procedures), id listings paginated two per page.
    pub fn with_sample_data() -> Self {
        let tree = CategoryTree {
            categories: vec![
                RemoteCategory {
                    id: "cat-body".into(),
                    name: "Body".into(),
                    slug: None,
                    procedures: vec![
                        RemoteProcedure {
                            id: "p1".into(),
                            name: "Tummy Tuck".into(),
                            slug: None,
                            case_count: Some(3),
                        },
                        RemoteProcedure {
                            id: "p2".into(),
                            name: "Liposuction".into(),
                            slug: None,
                            case_count: Some(2),
                        },
                    ],
                },
                RemoteCategory {
                    id: "cat-face".into(),
                    name: "Face".into(),
                    slug: None,
                    procedures: vec![RemoteProcedure {
                        id: "p3".into(),
                        name: "Facelift".into(),
                        slug: None,
                        case_count: Some(1),
                    }],
                },
            ],
        };

        let mut case_pages = HashMap::new();
        case_pages.insert("p1".to_string(), vec![
            vec!["c1".to_string(), "c2".to_string()],
            vec!["c3".to_string()],
        ]);
        case_pages.insert("p2".to_string(), vec![vec!["c3".to_string(), "c4".to_string()]]);
        case_pages.insert("p3".to_string(), vec![vec!["c5".to_string()]]);

        let mut cases = HashMap::new();
        for (case_id, procedures) in [
            ("c1", vec!["p1"]),
            ("c2", vec!["p1"]),
            ("c3", vec!["p1", "p2"]),
            ("c4", vec!["p2"]),
            ("c5", vec!["p3"]),
        ] {
            cases.insert(
                case_id.to_string(),
                CasePayload {
                    id: case_id.to_string(),
                    title: Some(format!("Case {case_id}")),
                    details: format!("details for {case_id}"),
                    procedure_ids: procedures.into_iter().map(String::from).collect(),
                    photos: vec![
                        RemotePhoto {
                            url: format!("https://cdn.example/{case_id}/before.jpg"),
                            kind: RemotePhotoKind::Before,
                            caption: None,
                        },
                        RemotePhoto {
                            url: format!("https://cdn.example/{case_id}/after.jpg"),
                            kind: RemotePhotoKind::After,
                            caption: None,
                        },
                    ],
                },
            );
        }

        Self {
            tree,
            case_pages,
            cases,
            failing_cases: HashSet::new(),
            healthy: true,
            categories_calls: AtomicU32::new(0),
            case_id_calls: AtomicU32::new(0),
            case_calls: AtomicU32::new(0),
            stop_during_categories: Mutex::new(None),
        }
    }

    pub fn total_distinct_cases(&self) -> u64 {
        5
    }
}

#[async_trait]
impl GalleryClient for MockGalleryClient {
    async fn fetch_categories(&self) -> SyncResult<CategoryTree> {
        if !self.healthy {
            return Err(SyncError::Connectivity("remote gallery is down".into()));
        }
        self.categories_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(tracker) = self.stop_during_categories.lock().await.as_ref() {
            tracker.request_stop().await;
        }
        Ok(self.tree.clone())
    }

    async fn fetch_case_ids(&self, procedure_id: &str, page: u32) -> SyncResult<CaseIdPage> {
        if !self.healthy {
            return Err(SyncError::Connectivity("remote gallery is down".into()));
        }
        self.case_id_calls.fetch_add(1, Ordering::SeqCst);
        let pages = self.case_pages.get(procedure_id).cloned().unwrap_or_default();
        let index = page.saturating_sub(1) as usize;
        Ok(CaseIdPage {
            ids: pages.get(index).cloned().unwrap_or_default(),
            has_more: index + 1 < pages.len(),
        })
    }

    async fn fetch_case(&self, case_id: &str) -> SyncResult<CasePayload> {
        if !self.healthy {
            return Err(SyncError::Connectivity("remote gallery is down".into()));
        }
        self.case_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_cases.contains(case_id) {
            return Err(SyncError::Connectivity(format!("case {case_id} fetch timed out")));
        }
        self.cases
            .get(case_id)
            .cloned()
            .ok_or_else(|| SyncError::Validation(format!("unknown case {case_id}")))
    }

    async fn fetch_image(&self, _url: &str) -> SyncResult<Vec<u8>> {
        if !self.healthy {
            return Err(SyncError::Connectivity("remote gallery is down".into()));
        }
        Ok(vec![0xFF, 0xD8, 0xFF, 0xE0])
    }

    async fn track_view(&self, _case_id: &str) -> SyncResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> SyncResult<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(SyncError::Connectivity("remote gallery is down".into()))
        }
    }
}

/// Config rooted in a tempdir, with preconditions relaxed so tests do not
/// depend on host resources.
pub fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.gallery.api_token = "test-token".to_string();
    config.storage.data_dir = dir.to_path_buf();
    config.storage.database_url = "sqlite::memory:".to_string();
    config.sync.batch_size = 2;
    config.sync.inter_batch_delay_ms = 0;
    config.sync.min_available_memory_bytes = 0;
    config.logging.file_output = false;
    config
}

pub async fn in_memory_store() -> Arc<dyn ContentStore> {
    let db = DatabaseConnection::in_memory().await.expect("in-memory database");
    db.migrate().await.expect("schema creation");
    Arc::new(SqliteContentStore::new(db.pool().clone()))
}

/// App state over an in-memory store and the given mock client. The
/// returned tempdir owns artifact and media storage; keep it alive for the
/// duration of the test.
pub async fn test_state(mock: Arc<MockGalleryClient>) -> (AppState, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(dir.path());
    let store = in_memory_store().await;
    (AppState::assemble(config, store, mock), dir)
}
