//! Local SQLite storage for cookie records, the domain index and profiles.
//!
//! Records are kept document-style: the cookie list is a JSON column,
//! keyed by (owner, domain). Queries run on the blocking pool so a slow
//! disk never stalls the async workers.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::application::ports::{CookieRecordRepository, DomainIndex, UserRepository};
use crate::domain::{AppError, CookieEntry, CookieRecord, Result, UserProfile};

/// Local storage repository using SQLite.
pub struct LocalStorage {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStorage {
    /// Opens or creates the local storage database.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or schema creation fails.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create storage directory", e))?;
        }

        let conn = Connection::open(path).map_err(AppError::database)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(AppError::database)?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.init_schema()?;

        tracing::debug!(path = %path.display(), "Opened cookie database");

        Ok(storage)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(
                r"
            -- One row per (user, domain) snapshot
            CREATE TABLE IF NOT EXISTS cookie_records (
                owner_user_id TEXT NOT NULL,
                domain TEXT NOT NULL,
                cookies TEXT NOT NULL DEFAULT '[]',
                cookie_count INTEGER NOT NULL DEFAULT 0,
                saved_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (owner_user_id, domain)
            );

            -- Secondary per-user domain index
            CREATE TABLE IF NOT EXISTS user_domains (
                user_id TEXT NOT NULL,
                domain TEXT NOT NULL,
                added_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, domain)
            );

            -- Account profiles
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                email TEXT,
                display_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
            )
            .map_err(AppError::database)?;

        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&*conn.lock()))
            .await
            .map_err(|e| AppError::storage(format!("Storage task failed: {e}")))?
    }

    /// Convert a row to a `CookieRecord`.
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<CookieRecord> {
        let cookies_json: String = row.get(2)?;
        let cookies: Vec<CookieEntry> = serde_json::from_str(&cookies_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(CookieRecord {
            owner_user_id: row.get(0)?,
            domain: row.get(1)?,
            cookie_count: cookies.len(),
            cookies,
            saved_at: timestamp_column(row, 3)?,
            updated_at: timestamp_column(row, 4)?,
        })
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<UserProfile> {
        Ok(UserProfile {
            user_id: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            created_at: timestamp_column(row, 3)?,
            updated_at: timestamp_column(row, 4)?,
        })
    }

    fn find_record(conn: &Connection, owner: &str, domain: &str) -> Result<Option<CookieRecord>> {
        conn.query_row(
            r"
            SELECT owner_user_id, domain, cookies, saved_at, updated_at
            FROM cookie_records WHERE owner_user_id = ?1 AND domain = ?2
            ",
            [owner, domain],
            Self::row_to_record,
        )
        .optional()
        .map_err(AppError::database)
    }

    fn find_profile_row(conn: &Connection, user_id: &str) -> Result<Option<UserProfile>> {
        conn.query_row(
            "SELECT user_id, email, display_name, created_at, updated_at FROM users WHERE user_id = ?1",
            [user_id],
            Self::row_to_profile,
        )
        .optional()
        .map_err(AppError::database)
    }

    /// Single-column string query with optional bound arguments.
    async fn query_strings(&self, sql: &'static str, args: Vec<String>) -> Result<Vec<String>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(sql).map_err(AppError::database)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                    row.get::<_, String>(0)
                })
                .map_err(AppError::database)?;

            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(AppError::database)
        })
        .await
    }
}

/// Read an RFC 3339 timestamp column.
fn timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[async_trait]
impl CookieRecordRepository for LocalStorage {
    async fn save(&self, record: CookieRecord) -> Result<CookieRecord> {
        let cookies_json = serde_json::to_string(&record.cookies).map_err(AppError::json_parse)?;

        self.with_conn(move |conn| {
            conn.execute(
                r"
            INSERT INTO cookie_records
                (owner_user_id, domain, cookies, cookie_count, saved_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(owner_user_id, domain) DO UPDATE SET
                cookies = excluded.cookies,
                cookie_count = excluded.cookie_count,
                updated_at = excluded.updated_at
            ",
                params![
                    &record.owner_user_id,
                    &record.domain,
                    cookies_json,
                    record.cookie_count as i64,
                    record.saved_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .map_err(AppError::database)?;

            Self::find_record(conn, &record.owner_user_id, &record.domain)?
                .ok_or_else(|| AppError::storage("Record vanished after write"))
        })
        .await
    }

    async fn find(&self, owner: &str, domain: &str) -> Result<Option<CookieRecord>> {
        let (owner, domain) = (owner.to_string(), domain.to_string());
        self.with_conn(move |conn| Self::find_record(conn, &owner, &domain))
            .await
    }

    async fn delete(&self, owner: &str, domain: &str) -> Result<bool> {
        let (owner, domain) = (owner.to_string(), domain.to_string());
        let deleted = self
            .with_conn(move |conn| {
                conn.execute(
                    "DELETE FROM cookie_records WHERE owner_user_id = ?1 AND domain = ?2",
                    [&owner, &domain],
                )
                .map_err(AppError::database)
            })
            .await?;

        Ok(deleted > 0)
    }

    async fn list_for_owner(&self, owner: &str) -> Result<Vec<CookieRecord>> {
        let owner = owner.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    r"
            SELECT owner_user_id, domain, cookies, saved_at, updated_at
            FROM cookie_records WHERE owner_user_id = ?1
            ORDER BY domain
            ",
                )
                .map_err(AppError::database)?;

            let rows = stmt
                .query_map([&owner], Self::row_to_record)
                .map_err(AppError::database)?;

            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(AppError::database)
        })
        .await
    }

    async fn owners(&self) -> Result<Vec<String>> {
        self.query_strings(
            "SELECT DISTINCT owner_user_id FROM cookie_records ORDER BY owner_user_id",
            Vec::new(),
        )
        .await
    }
}

#[async_trait]
impl DomainIndex for LocalStorage {
    async fn add(&self, user_id: &str, domain: &str) -> Result<()> {
        let (user_id, domain) = (user_id.to_string(), domain.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO user_domains (user_id, domain) VALUES (?1, ?2)",
                [&user_id, &domain],
            )
            .map_err(AppError::database)?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, user_id: &str, domain: &str) -> Result<()> {
        let (user_id, domain) = (user_id.to_string(), domain.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM user_domains WHERE user_id = ?1 AND domain = ?2",
                [&user_id, &domain],
            )
            .map_err(AppError::database)?;
            Ok(())
        })
        .await
    }

    async fn list(&self, user_id: &str) -> Result<Vec<String>> {
        self.query_strings(
            "SELECT domain FROM user_domains WHERE user_id = ?1 ORDER BY domain",
            vec![user_id.to_string()],
        )
        .await
    }

    async fn users(&self) -> Result<Vec<String>> {
        self.query_strings(
            "SELECT DISTINCT user_id FROM user_domains ORDER BY user_id",
            Vec::new(),
        )
        .await
    }
}

#[async_trait]
impl UserRepository for LocalStorage {
    async fn upsert_profile(&self, profile: UserProfile) -> Result<UserProfile> {
        self.with_conn(move |conn| {
            conn.execute(
                r"
            INSERT INTO users (user_id, email, display_name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                email = COALESCE(excluded.email, email),
                display_name = COALESCE(excluded.display_name, display_name),
                updated_at = excluded.updated_at
            ",
                params![
                    &profile.user_id,
                    &profile.email,
                    &profile.display_name,
                    profile.created_at.to_rfc3339(),
                    profile.updated_at.to_rfc3339(),
                ],
            )
            .map_err(AppError::database)?;

            Self::find_profile_row(conn, &profile.user_id)?
                .ok_or_else(|| AppError::storage("Profile vanished after write"))
        })
        .await
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| Self::find_profile_row(conn, &user_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SameSite;
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, LocalStorage) {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::open(&dir.path().join("test.db")).unwrap();
        (dir, storage)
    }

    fn entry(name: &str) -> CookieEntry {
        CookieEntry {
            name: name.to_string(),
            value: "abc".to_string(),
            domain: ".example.com".to_string(),
            path: "/".to_string(),
            expires_at: DateTime::from_timestamp(1_900_000_000, 500_000_000),
            http_only: true,
            secure: false,
            same_site: SameSite::None,
        }
    }

    #[test]
    fn test_open_creates_schema() {
        let (_dir, storage) = open_temp();

        let count: i64 = storage
            .conn
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert!(count >= 3);
    }

    #[tokio::test]
    async fn test_record_roundtrip_keeps_cookie_fields() {
        let (_dir, storage) = open_temp();
        let record = CookieRecord::new("u1", "example.com", vec![entry("sid")], Utc::now());

        storage.save(record.clone()).await.unwrap();
        let loaded = storage.find("u1", "example.com").await.unwrap().unwrap();

        assert_eq!(loaded.cookies, record.cookies);
        assert_eq!(loaded.cookie_count, 1);
    }

    #[tokio::test]
    async fn test_save_merges_saved_at() {
        let (_dir, storage) = open_temp();
        let first = Utc::now() - chrono::Duration::hours(5);

        storage
            .save(CookieRecord::new("u1", "a.com", vec![entry("x")], first))
            .await
            .unwrap();
        let second = storage
            .save(CookieRecord::new("u1", "a.com", vec![], Utc::now()))
            .await
            .unwrap();

        assert_eq!(second.saved_at, first);
        assert!(second.updated_at > first);
        assert_eq!(second.cookie_count, 0);
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let (_dir, storage) = open_temp();
        storage
            .save(CookieRecord::new("u1", "a.com", vec![], Utc::now()))
            .await
            .unwrap();

        assert!(storage.delete("u1", "a.com").await.unwrap());
        assert!(!storage.delete("u1", "a.com").await.unwrap());
        assert!(storage.owners().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_is_a_set() {
        let (_dir, storage) = open_temp();
        storage.add("u1", "b.com").await.unwrap();
        storage.add("u1", "a.com").await.unwrap();
        storage.add("u1", "a.com").await.unwrap();
        storage.remove("u1", "zzz.com").await.unwrap();

        assert_eq!(storage.list("u1").await.unwrap(), vec!["a.com", "b.com"]);
        assert_eq!(DomainIndex::users(&storage).await.unwrap(), vec!["u1"]);
    }

    #[tokio::test]
    async fn test_profile_keeps_created_at() {
        let (_dir, storage) = open_temp();
        let created = Utc::now() - chrono::Duration::days(1);
        let profile = UserProfile {
            user_id: "u1".into(),
            email: Some("a@example.com".into()),
            display_name: None,
            created_at: created,
            updated_at: created,
        };
        storage.upsert_profile(profile.clone()).await.unwrap();

        let again = storage
            .upsert_profile(UserProfile {
                display_name: Some("Ada".into()),
                email: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                ..profile
            })
            .await
            .unwrap();

        assert_eq!(again.created_at, created);
        assert_eq!(again.email.as_deref(), Some("a@example.com"));
        assert_eq!(again.display_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_unreadable_timestamp_is_an_error() {
        let (_dir, storage) = open_temp();
        storage
            .save(CookieRecord::new("u1", "a.com", vec![], Utc::now()))
            .await
            .unwrap();
        storage
            .conn
            .lock()
            .execute("UPDATE cookie_records SET saved_at = 'yesterday'", [])
            .unwrap();

        let err = storage.find("u1", "a.com").await.unwrap_err();
        assert!(matches!(err, AppError::Storage { .. }));
    }
}
