//! Sqlite implementation of the content-entity store.
//!
//! Dynamic sqlx queries with manual row extraction; compile-time query
//! macros would require an offline schema snapshot. The store keeps every
//! association (metadata, labels, attachments) in its own table and removes
//! them alongside the owning entity.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::{
    CaseEntity, CaseImage, EntityDraft, EntityStatus, ImageDraft, ImageKind, Label, LabelUpsert,
    SyncRunRecord,
};
use crate::domain::errors::{SyncError, SyncResult};
use crate::domain::repositories::ContentStore;

#[derive(Clone)]
pub struct SqliteContentStore {
    pool: Arc<SqlitePool>,
}

impl SqliteContentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn entity_from_row(row: &sqlx::sqlite::SqliteRow) -> SyncResult<CaseEntity> {
        let status_raw: String = row.get("status");
        let status = EntityStatus::parse(&status_raw).ok_or_else(|| {
            SyncError::Storage(sqlx::Error::Decode(
                format!("unknown entity status '{status_raw}'").into(),
            ))
        })?;
        Ok(CaseEntity {
            id: row.get("id"),
            entity_type: row.get("entity_type"),
            title: row.get("title"),
            slug: row.get("slug"),
            body: row.get("body"),
            status,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn image_from_row(row: &sqlx::sqlite::SqliteRow) -> SyncResult<CaseImage> {
        let kind_raw: String = row.get("kind");
        let kind = ImageKind::parse(&kind_raw).ok_or_else(|| {
            SyncError::Storage(sqlx::Error::Decode(
                format!("unknown attachment kind '{kind_raw}'").into(),
            ))
        })?;
        Ok(CaseImage {
            id: row.get("id"),
            entity_id: row.get("entity_id"),
            kind,
            file_path: row.get("file_path"),
            position: row.get("position"),
        })
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn create_entity(&self, draft: &EntityDraft) -> SyncResult<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO entities (entity_type, title, slug, body, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.entity_type)
        .bind(&draft.title)
        .bind(&draft.slug)
        .bind(&draft.body)
        .bind(draft.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_entity(&self, id: i64, draft: &EntityDraft) -> SyncResult<()> {
        sqlx::query(
            r#"
            UPDATE entities
            SET entity_type = ?, title = ?, slug = ?, body = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&draft.entity_type)
        .bind(&draft.title)
        .bind(&draft.slug)
        .bind(&draft.body)
        .bind(draft.status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn get_entity(&self, id: i64) -> SyncResult<Option<CaseEntity>> {
        let row = sqlx::query(
            "SELECT id, entity_type, title, slug, body, status, created_at, updated_at \
             FROM entities WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;
        row.map(|r| Self::entity_from_row(&r)).transpose()
    }

    async fn list_entities(&self, entity_type: &str) -> SyncResult<Vec<CaseEntity>> {
        let rows = sqlx::query(
            "SELECT id, entity_type, title, slug, body, status, created_at, updated_at \
             FROM entities WHERE entity_type = ? ORDER BY id",
        )
        .bind(entity_type)
        .fetch_all(&*self.pool)
        .await?;
        rows.iter().map(Self::entity_from_row).collect()
    }

    async fn set_entity_status(&self, id: i64, status: EntityStatus) -> SyncResult<()> {
        sqlx::query("UPDATE entities SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn set_entity_slug(&self, id: i64, slug: &str) -> SyncResult<()> {
        sqlx::query("UPDATE entities SET slug = ?, updated_at = ? WHERE id = ?")
            .bind(slug)
            .bind(Utc::now())
            .bind(id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn delete_entity(&self, id: i64) -> SyncResult<()> {
        sqlx::query("DELETE FROM entity_meta WHERE entity_id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;
        sqlx::query("DELETE FROM entity_labels WHERE entity_id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;
        sqlx::query("DELETE FROM attachments WHERE entity_id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;
        sqlx::query("DELETE FROM entities WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn set_meta(&self, entity_id: i64, key: &str, value: &str) -> SyncResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO entity_meta (entity_id, meta_key, meta_value) VALUES (?, ?, ?)",
        )
        .bind(entity_id)
        .bind(key)
        .bind(value)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn get_meta(&self, entity_id: i64, key: &str) -> SyncResult<Option<String>> {
        let row = sqlx::query(
            "SELECT meta_value FROM entity_meta WHERE entity_id = ? AND meta_key = ?",
        )
        .bind(entity_id)
        .bind(key)
        .fetch_optional(&*self.pool)
        .await?;
        Ok(row.map(|r| r.get("meta_value")))
    }

    async fn list_meta(&self, entity_id: i64) -> SyncResult<Vec<(String, String)>> {
        let rows = sqlx::query(
            "SELECT meta_key, meta_value FROM entity_meta WHERE entity_id = ? ORDER BY meta_key",
        )
        .bind(entity_id)
        .fetch_all(&*self.pool)
        .await?;
        Ok(rows.iter().map(|r| (r.get("meta_key"), r.get("meta_value"))).collect())
    }

    async fn delete_meta(&self, entity_id: i64, key: &str) -> SyncResult<()> {
        sqlx::query("DELETE FROM entity_meta WHERE entity_id = ? AND meta_key = ?")
            .bind(entity_id)
            .bind(key)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_label(
        &self,
        taxonomy: &str,
        name: &str,
        slug: &str,
        parent_id: Option<i64>,
    ) -> SyncResult<LabelUpsert> {
        let existing = sqlx::query("SELECT id FROM labels WHERE taxonomy = ? AND slug = ?")
            .bind(taxonomy)
            .bind(slug)
            .fetch_optional(&*self.pool)
            .await?;

        if let Some(row) = existing {
            let id: i64 = row.get("id");
            sqlx::query("UPDATE labels SET name = ?, parent_id = ? WHERE id = ?")
                .bind(name)
                .bind(parent_id)
                .bind(id)
                .execute(&*self.pool)
                .await?;
            Ok(LabelUpsert { id, created: false })
        } else {
            let result = sqlx::query(
                "INSERT INTO labels (taxonomy, name, slug, parent_id) VALUES (?, ?, ?, ?)",
            )
            .bind(taxonomy)
            .bind(name)
            .bind(slug)
            .bind(parent_id)
            .execute(&*self.pool)
            .await?;
            Ok(LabelUpsert { id: result.last_insert_rowid(), created: true })
        }
    }

    async fn get_label_by_slug(&self, taxonomy: &str, slug: &str) -> SyncResult<Option<Label>> {
        let row = sqlx::query(
            "SELECT id, taxonomy, name, slug, parent_id FROM labels \
             WHERE taxonomy = ? AND slug = ?",
        )
        .bind(taxonomy)
        .bind(slug)
        .fetch_optional(&*self.pool)
        .await?;
        Ok(row.map(|r| Label {
            id: r.get("id"),
            taxonomy: r.get("taxonomy"),
            name: r.get("name"),
            slug: r.get("slug"),
            parent_id: r.get("parent_id"),
        }))
    }

    async fn list_labels(&self, taxonomy: &str) -> SyncResult<Vec<Label>> {
        let rows = sqlx::query(
            "SELECT id, taxonomy, name, slug, parent_id FROM labels \
             WHERE taxonomy = ? ORDER BY id",
        )
        .bind(taxonomy)
        .fetch_all(&*self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| Label {
                id: r.get("id"),
                taxonomy: r.get("taxonomy"),
                name: r.get("name"),
                slug: r.get("slug"),
                parent_id: r.get("parent_id"),
            })
            .collect())
    }

    async fn set_label_slug(&self, label_id: i64, slug: &str) -> SyncResult<()> {
        sqlx::query("UPDATE labels SET slug = ? WHERE id = ?")
            .bind(slug)
            .bind(label_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn assign_labels(&self, entity_id: i64, label_ids: &[i64]) -> SyncResult<()> {
        sqlx::query("DELETE FROM entity_labels WHERE entity_id = ?")
            .bind(entity_id)
            .execute(&*self.pool)
            .await?;
        for label_id in label_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO entity_labels (entity_id, label_id) VALUES (?, ?)",
            )
            .bind(entity_id)
            .bind(label_id)
            .execute(&*self.pool)
            .await?;
        }
        Ok(())
    }

    async fn labels_for_entity(&self, entity_id: i64) -> SyncResult<Vec<Label>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.taxonomy, l.name, l.slug, l.parent_id
            FROM labels l
            JOIN entity_labels el ON el.label_id = l.id
            WHERE el.entity_id = ?
            ORDER BY l.id
            "#,
        )
        .bind(entity_id)
        .fetch_all(&*self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| Label {
                id: r.get("id"),
                taxonomy: r.get("taxonomy"),
                name: r.get("name"),
                slug: r.get("slug"),
                parent_id: r.get("parent_id"),
            })
            .collect())
    }

    async fn attach_image(&self, entity_id: i64, image: &ImageDraft) -> SyncResult<i64> {
        let result = sqlx::query(
            "INSERT INTO attachments (entity_id, kind, file_path, position) VALUES (?, ?, ?, ?)",
        )
        .bind(entity_id)
        .bind(image.kind.as_str())
        .bind(&image.file_path)
        .bind(image.position)
        .execute(&*self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_images(&self, entity_id: i64) -> SyncResult<Vec<CaseImage>> {
        let rows = sqlx::query(
            "SELECT id, entity_id, kind, file_path, position FROM attachments \
             WHERE entity_id = ? ORDER BY kind, position",
        )
        .bind(entity_id)
        .fetch_all(&*self.pool)
        .await?;
        rows.iter().map(Self::image_from_row).collect()
    }

    async fn remove_images(&self, entity_id: i64) -> SyncResult<()> {
        sqlx::query("DELETE FROM attachments WHERE entity_id = ?")
            .bind(entity_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> SyncResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn set_setting(&self, key: &str, value: &str) -> SyncResult<()> {
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> SyncResult<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn settings_with_prefix(&self, prefix: &str) -> SyncResult<BTreeMap<String, String>> {
        let pattern = format!("{}%", prefix.replace('%', "").replace('_', r"\_"));
        let rows = sqlx::query(
            r"SELECT key, value FROM settings WHERE key LIKE ? ESCAPE '\' ORDER BY key",
        )
        .bind(pattern)
        .fetch_all(&*self.pool)
        .await?;
        Ok(rows.iter().map(|r| (r.get("key"), r.get("value"))).collect())
    }

    async fn cache_get(&self, key: &str) -> SyncResult<Option<String>> {
        let row = sqlx::query(
            "SELECT value FROM cache_entries WHERE key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(Utc::now())
        .fetch_optional(&*self.pool)
        .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn cache_set(&self, key: &str, value: &str, ttl: Duration) -> SyncResult<()> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
        sqlx::query(
            "INSERT OR REPLACE INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn cache_clear(&self) -> SyncResult<()> {
        sqlx::query("DELETE FROM cache_entries").execute(&*self.pool).await?;
        Ok(())
    }

    async fn record_sync_run(&self, record: &SyncRunRecord) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_log
            (run_id, stage, started_at, finished_at, status, created, updated, failed, error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.run_id)
        .bind(&record.stage)
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(&record.status)
        .bind(record.created)
        .bind(record.updated)
        .bind(record.failed)
        .bind(&record.error)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn sync_log_available(&self) -> SyncResult<bool> {
        let row = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'sync_log'",
        )
        .fetch_optional(&*self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn list_sync_runs(&self, limit: u32) -> SyncResult<Vec<SyncRunRecord>> {
        let rows = sqlx::query(
            "SELECT run_id, stage, started_at, finished_at, status, created, updated, failed, error \
             FROM sync_log ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&*self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| SyncRunRecord {
                run_id: r.get("run_id"),
                stage: r.get("stage"),
                started_at: r.get("started_at"),
                finished_at: r.get("finished_at"),
                status: r.get("status"),
                created: r.get("created"),
                updated: r.get("updated"),
                failed: r.get("failed"),
                error: r.get("error"),
            })
            .collect())
    }

    async fn map_case(&self, case_id: &str, entity_id: i64) -> SyncResult<()> {
        sqlx::query("INSERT OR REPLACE INTO case_map (case_id, entity_id) VALUES (?, ?)")
            .bind(case_id)
            .bind(entity_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn entity_for_case(&self, case_id: &str) -> SyncResult<Option<i64>> {
        let row = sqlx::query("SELECT entity_id FROM case_map WHERE case_id = ?")
            .bind(case_id)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.map(|r| r.get("entity_id")))
    }

    async fn list_case_mappings(&self) -> SyncResult<Vec<(String, i64)>> {
        let rows = sqlx::query("SELECT case_id, entity_id FROM case_map ORDER BY case_id")
            .fetch_all(&*self.pool)
            .await?;
        Ok(rows.iter().map(|r| (r.get("case_id"), r.get("entity_id"))).collect())
    }

    async fn unmap_case(&self, case_id: &str) -> SyncResult<()> {
        sqlx::query("DELETE FROM case_map WHERE case_id = ?")
            .bind(case_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> SyncResult<()> {
        sqlx::query("SELECT 1").execute(&*self.pool).await?;
        Ok(())
    }

    async fn begin_bulk(&self) -> SyncResult<()> {
        sqlx::query("PRAGMA synchronous = OFF").execute(&*self.pool).await?;
        sqlx::query("PRAGMA defer_foreign_keys = ON").execute(&*self.pool).await?;
        Ok(())
    }

    async fn end_bulk(&self) -> SyncResult<()> {
        sqlx::query("PRAGMA defer_foreign_keys = OFF").execute(&*self.pool).await?;
        sqlx::query("PRAGMA synchronous = FULL").execute(&*self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::CASE_ENTITY_TYPE;
    use crate::infrastructure::database_connection::DatabaseConnection;

    async fn store() -> SqliteContentStore {
        let db = DatabaseConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        SqliteContentStore::new(db.pool().clone())
    }

    fn draft(title: &str, slug: &str) -> EntityDraft {
        EntityDraft {
            entity_type: CASE_ENTITY_TYPE.to_string(),
            title: title.to_string(),
            slug: slug.to_string(),
            body: "body".to_string(),
            status: EntityStatus::Published,
        }
    }

    #[tokio::test]
    async fn entity_round_trip_with_associations() {
        let store = store().await;
        let id = store.create_entity(&draft("Case 100", "case-100")).await.unwrap();

        store.set_meta(id, "remote_case_id", "100").await.unwrap();
        let upsert = store.upsert_label("gallery_procedure", "Facelift", "facelift", None).await.unwrap();
        assert!(upsert.created);
        store.assign_labels(id, &[upsert.id]).await.unwrap();
        store
            .attach_image(
                id,
                &ImageDraft { kind: ImageKind::Primary, file_path: "/tmp/x.jpg".into(), position: 0 },
            )
            .await
            .unwrap();

        let entity = store.get_entity(id).await.unwrap().unwrap();
        assert_eq!(entity.title, "Case 100");
        assert_eq!(store.labels_for_entity(id).await.unwrap().len(), 1);
        assert_eq!(store.list_images(id).await.unwrap().len(), 1);

        store.delete_entity(id).await.unwrap();
        assert!(store.get_entity(id).await.unwrap().is_none());
        assert!(store.list_meta(id).await.unwrap().is_empty());
        assert!(store.labels_for_entity(id).await.unwrap().is_empty());
        assert!(store.list_images(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn label_upsert_is_idempotent_by_slug() {
        let store = store().await;
        let first = store.upsert_label("gallery_procedure", "Tummy Tuck", "tummy-tuck", None).await.unwrap();
        let second = store.upsert_label("gallery_procedure", "Tummy Tuck 2024", "tummy-tuck", None).await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        let labels = store.list_labels("gallery_procedure").await.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].name, "Tummy Tuck 2024");
    }

    #[tokio::test]
    async fn cache_honors_ttl_and_clear() {
        let store = store().await;
        store.cache_set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.cache_get("k").await.unwrap().as_deref(), Some("v"));
        store.cache_clear().await.unwrap();
        assert!(store.cache_get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn settings_prefix_scan() {
        let store = store().await;
        store.set_setting("gallery_mode", "api").await.unwrap();
        store.set_setting("gallery_token", "t").await.unwrap();
        store.set_setting("other", "x").await.unwrap();
        let scoped = store.settings_with_prefix("gallery_").await.unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(!scoped.contains_key("other"));
    }

    #[tokio::test]
    async fn case_map_round_trip() {
        let store = store().await;
        let id = store.create_entity(&draft("Case 7", "case-7")).await.unwrap();
        store.map_case("7", id).await.unwrap();
        assert_eq!(store.entity_for_case("7").await.unwrap(), Some(id));
        store.unmap_case("7").await.unwrap();
        assert!(store.entity_for_case("7").await.unwrap().is_none());
    }
}
