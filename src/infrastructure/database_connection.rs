//! Database connection and pool management
//!
//! Handles SQLite connections for the content store using sqlx. The schema
//! is created with idempotent statements at startup; there is no separate
//! migration history.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS entities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_type TEXT NOT NULL,
        title TEXT NOT NULL,
        slug TEXT NOT NULL,
        body TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'draft',
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entity_meta (
        entity_id INTEGER NOT NULL,
        meta_key TEXT NOT NULL,
        meta_value TEXT NOT NULL,
        PRIMARY KEY (entity_id, meta_key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS labels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        taxonomy TEXT NOT NULL,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        parent_id INTEGER,
        UNIQUE (taxonomy, slug)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entity_labels (
        entity_id INTEGER NOT NULL,
        label_id INTEGER NOT NULL,
        PRIMARY KEY (entity_id, label_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attachments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        file_path TEXT NOT NULL,
        position INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cache_entries (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        expires_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL,
        stage TEXT NOT NULL,
        started_at DATETIME NOT NULL,
        finished_at DATETIME NOT NULL,
        status TEXT NOT NULL,
        created INTEGER NOT NULL DEFAULT 0,
        updated INTEGER NOT NULL DEFAULT 0,
        failed INTEGER NOT NULL DEFAULT 0,
        error TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS case_map (
        case_id TEXT PRIMARY KEY,
        entity_id INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_entities_type ON entities (entity_type)",
    "CREATE INDEX IF NOT EXISTS idx_entities_slug ON entities (slug)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_entity ON attachments (entity_id)",
    "CREATE INDEX IF NOT EXISTS idx_labels_taxonomy ON labels (taxonomy)",
    "CREATE INDEX IF NOT EXISTS idx_case_map_entity ON case_map (entity_id)",
];

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Make sure the database file and its directory exist before sqlx
        // opens the pool.
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        if db_path != ":memory:" && !db_path.is_empty() {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if !Path::new(db_path).exists() {
                std::fs::File::create(db_path)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database on a single pooled connection. Used by tests and
    /// dry runs; a second connection would see a different empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn connects_and_migrates_on_disk() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test.db");
        let database_url = format!("sqlite:{}", db_path.to_string_lossy());

        let db = DatabaseConnection::new(&database_url).await?;
        db.migrate().await?;
        assert!(!db.pool().is_closed());

        // Schema creation is idempotent.
        db.migrate().await?;
        Ok(())
    }

    #[tokio::test]
    async fn in_memory_database_migrates() -> Result<()> {
        let db = DatabaseConnection::in_memory().await?;
        db.migrate().await?;
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entities")
            .fetch_one(db.pool())
            .await?;
        assert_eq!(row.0, 0);
        Ok(())
    }
}
