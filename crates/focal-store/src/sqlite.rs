//! SQLite-backed resource store.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};
use uuid::Uuid;

use focal_core::{AccessType, ResourceType, SessionResource};

use crate::gateway::{ResourceStore, Result, StoreError};

/// SQLite-backed resource store.
///
/// The connection is wrapped in a mutex for thread safety; WAL mode keeps
/// concurrent readers cheap.
pub struct SqliteResourceStore {
    conn: Mutex<Connection>,
}

impl SqliteResourceStore {
    /// Create a store rooted at `base_dir`.
    ///
    /// Creates the directory and database and runs migrations if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;

        let db_path = base_dir.join("resources.db");
        let conn = Connection::open(&db_path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open the store at the default data directory.
    pub fn open_default() -> Result<Self> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| StoreError::PathError("could not find data directory".into()))?
            .join("focal");
        Self::new(data_dir)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < 1 {
            let migration = include_str!("../migrations/001_initial.sql");
            conn.execute_batch(migration)?;
        }

        Ok(())
    }

    fn parse_datetime(s: &str) -> DateTime<Utc> {
        match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                warn!(raw = s, "malformed stored timestamp, substituting current time: {e}");
                Utc::now()
            }
        }
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }
}

#[async_trait]
impl ResourceStore for SqliteResourceStore {
    async fn create_session(
        &self,
        token_budget: u64,
        summary: &str,
        parent_session: Option<&str>,
    ) -> Result<String> {
        if token_budget == 0 {
            return Err(StoreError::InvalidInput(
                "token_budget must be greater than 0".into(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO sessions (id, token_budget, summary, created_at, parent_session)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                id,
                token_budget as i64,
                summary,
                Self::format_datetime(&Utc::now()),
                parent_session,
            ],
        )?;

        debug!(session_id = %id, token_budget, "created session");
        Ok(id)
    }

    async fn upsert_resource(
        &self,
        path: &str,
        resource_type: ResourceType,
        size_bytes: Option<u64>,
        modified: bool,
        last_accessed: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();

        let id: i64 = conn.query_row(
            r#"
            INSERT INTO resources (path, type, size, last_accessed, access_count, modified, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)
            ON CONFLICT(path) DO UPDATE SET
                access_count = access_count + 1,
                size = COALESCE(excluded.size, size),
                modified = MAX(modified, excluded.modified),
                last_accessed = excluded.last_accessed,
                type = excluded.type
            RETURNING id
            "#,
            params![
                path,
                resource_type.as_str(),
                size_bytes.map(|s| s as i64),
                Self::format_datetime(&last_accessed),
                modified as i64,
                Self::format_datetime(&Utc::now()),
            ],
            |row| row.get(0),
        )?;

        Ok(id)
    }

    async fn find_resource(&self, path: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let id = conn
            .query_row(
                "SELECT id FROM resources WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    async fn append_access_log(
        &self,
        resource_id: i64,
        session_id: &str,
        access_type: AccessType,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO resource_access_logs (resource_ref, session_ref, access_type, timestamp)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                resource_id,
                session_id,
                access_type.as_str(),
                Self::format_datetime(&timestamp),
            ],
        )?;
        Ok(())
    }

    async fn set_importance(&self, session_id: &str, resource_id: i64, score: f64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO session_resources (session_ref, resource_ref, importance_score)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(session_ref, resource_ref) DO UPDATE SET
                importance_score = excluded.importance_score
            "#,
            params![session_id, resource_id, score],
        )?;
        Ok(())
    }

    async fn set_included(&self, session_id: &str, resource_id: i64, included: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO session_resources (session_ref, resource_ref, included_in_context)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(session_ref, resource_ref) DO UPDATE SET
                included_in_context = excluded.included_in_context
            "#,
            params![session_id, resource_id, included as i64],
        )?;
        Ok(())
    }

    async fn query_session_resources(&self, session_id: &str) -> Result<Vec<SessionResource>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT r.path, r.type, r.size, r.access_count, r.last_accessed, r.modified,
                   sr.importance_score, sr.included_in_context
            FROM session_resources sr
            JOIN resources r ON r.id = sr.resource_ref
            WHERE sr.session_ref = ?1
            ORDER BY sr.importance_score DESC, r.path ASC
            "#,
        )?;

        let rows = stmt.query_map(params![session_id], |row| {
            Ok(SessionResource {
                path: row.get(0)?,
                resource_type: ResourceType::parse(&row.get::<_, String>(1)?),
                size_bytes: row.get::<_, Option<i64>>(2)?.map(|s| s as u64),
                access_count: row.get::<_, i64>(3)? as u64,
                last_accessed: Self::parse_datetime(&row.get::<_, String>(4)?),
                modified: row.get::<_, i64>(5)? != 0,
                importance_score: row.get(6)?,
                included_in_context: row.get::<_, i64>(7)? != 0,
            })
        })?;

        let resources: Vec<SessionResource> = rows.filter_map(|r| r.ok()).collect();
        Ok(resources)
    }

    async fn remove_resource(&self, path: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM resources WHERE path = ?1", params![path])?;
        if rows == 0 {
            return Err(StoreError::NotFound(path.to_string()));
        }
        debug!(path, "removed resource");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteResourceStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteResourceStore::new(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_parse_datetime_round_trips_and_survives_garbage() {
        let now = Utc::now();
        let parsed =
            SqliteResourceStore::parse_datetime(&SqliteResourceStore::format_datetime(&now));
        assert_eq!(parsed, now);

        // Malformed input falls back to a current timestamp rather than
        // failing the whole row read.
        let fallback = SqliteResourceStore::parse_datetime("not a timestamp");
        assert!(fallback >= now);
    }

    #[tokio::test]
    async fn test_create_session() {
        let (store, _tmp) = create_test_store();

        let id = store.create_session(50_000, "test run", None).await.unwrap();
        assert!(!id.is_empty());

        let child = store
            .create_session(20_000, "continued", Some(&id))
            .await
            .unwrap();
        assert_ne!(child, id);
    }

    #[tokio::test]
    async fn test_create_session_rejects_zero_budget() {
        let (store, _tmp) = create_test_store();
        let result = store.create_session(0, "", None).await;
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_upsert_merge_semantics() {
        let (store, _tmp) = create_test_store();
        let now = Utc::now();

        let id1 = store
            .upsert_resource("/a.rs", ResourceType::Code, Some(100), false, now)
            .await
            .unwrap();
        // Second access: no size supplied, marks modified.
        let id2 = store
            .upsert_resource("/a.rs", ResourceType::Code, None, true, now)
            .await
            .unwrap();
        assert_eq!(id1, id2);
        // Third access: modified=false must not revert the flag.
        store
            .upsert_resource("/a.rs", ResourceType::Code, None, false, now)
            .await
            .unwrap();

        let session = store.create_session(1000, "", None).await.unwrap();
        store.set_importance(&session, id1, 50.0).await.unwrap();

        let rows = store.query_session_resources(&session).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].access_count, 3);
        assert_eq!(rows[0].size_bytes, Some(100)); // preserved across None
        assert!(rows[0].modified); // OR-ed, sticky
    }

    #[tokio::test]
    async fn test_find_resource() {
        let (store, _tmp) = create_test_store();

        assert!(store.find_resource("/missing").await.unwrap().is_none());

        let id = store
            .upsert_resource("/b.md", ResourceType::Documentation, None, false, Utc::now())
            .await
            .unwrap();
        assert_eq!(store.find_resource("/b.md").await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_importance_and_inclusion_are_upserts() {
        let (store, _tmp) = create_test_store();
        let session = store.create_session(1000, "", None).await.unwrap();
        let id = store
            .upsert_resource("/c.rs", ResourceType::Code, Some(10), false, Utc::now())
            .await
            .unwrap();

        store.set_importance(&session, id, 80.0).await.unwrap();
        store.set_included(&session, id, true).await.unwrap();
        // A later run recomputes both; nothing is merged.
        store.set_importance(&session, id, 12.5).await.unwrap();
        store.set_included(&session, id, false).await.unwrap();

        let rows = store.query_session_resources(&session).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].importance_score - 12.5).abs() < f64::EPSILON);
        assert!(!rows[0].included_in_context);
    }

    #[tokio::test]
    async fn test_access_log_append() {
        let (store, _tmp) = create_test_store();
        let session = store.create_session(1000, "", None).await.unwrap();
        let id = store
            .upsert_resource("/d.rs", ResourceType::Code, None, false, Utc::now())
            .await
            .unwrap();

        store
            .append_access_log(id, &session, AccessType::View, Utc::now())
            .await
            .unwrap();
        store
            .append_access_log(id, &session, AccessType::Edit, Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_resource() {
        let (store, _tmp) = create_test_store();
        store
            .upsert_resource("/e.rs", ResourceType::Code, None, false, Utc::now())
            .await
            .unwrap();

        store.remove_resource("/e.rs").await.unwrap();
        assert!(store.find_resource("/e.rs").await.unwrap().is_none());

        let result = store.remove_resource("/e.rs").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_query_orders_by_importance() {
        let (store, _tmp) = create_test_store();
        let session = store.create_session(1000, "", None).await.unwrap();

        for (path, score) in [("/low.rs", 10.0), ("/high.rs", 90.0), ("/mid.rs", 50.0)] {
            let id = store
                .upsert_resource(path, ResourceType::Code, Some(10), false, Utc::now())
                .await
                .unwrap();
            store.set_importance(&session, id, score).await.unwrap();
        }

        let rows = store.query_session_resources(&session).await.unwrap();
        let paths: Vec<&str> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/high.rs", "/mid.rs", "/low.rs"]);
    }
}
