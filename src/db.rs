use crate::error::Result;
use crate::models::SessionUser;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

const CURRENT_DB_VERSION: u32 = 1;

pub const SESSION_USER_KEY: &str = "usuario";
pub const BOOK_ADDED_KEY: &str = "livroAdicionado";

/// Key/value storage shared by every screen (and every process) of the app.
/// Best-effort, never authoritative: the backend owns books and records.
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|err| crate::error::BibliotecaError::Config {
                    message: format!("failed to create storage dir {}: {}", dir.display(), err),
                })?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT
            )",
            [],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
            params![CURRENT_DB_VERSION.to_string()],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(LocalStore { conn })
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Unparseable values read as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                log::warn!("[storage] unreadable value key={} error={}", key, err);
                Ok(None)
            }
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|err| crate::error::BibliotecaError::Config {
            message: format!("failed to encode {}: {}", key, err),
        })?;
        self.set_raw(key, &raw)
    }

    pub fn session_user(&self) -> Result<Option<SessionUser>> {
        self.get_json(SESSION_USER_KEY)
    }

    pub fn set_session_user(&self, user: &SessionUser) -> Result<()> {
        self.set_json(SESSION_USER_KEY, user)
    }

    pub fn clear_session_user(&self) -> Result<()> {
        self.remove(SESSION_USER_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::{LocalStore, SESSION_USER_KEY};
    use crate::models::{RecordId, SessionUser};

    #[test]
    fn values_round_trip_and_can_be_removed() {
        let store = LocalStore::open_in_memory().expect("store");
        assert_eq!(store.get_raw("k").unwrap(), None);
        store.set_raw("k", "1").unwrap();
        store.set_raw("k", "2").unwrap();
        assert_eq!(store.get_raw("k").unwrap().as_deref(), Some("2"));
        store.remove("k").unwrap();
        assert_eq!(store.get_raw("k").unwrap(), None);
    }

    #[test]
    fn session_written_by_the_login_page_is_readable() {
        let store = LocalStore::open_in_memory().expect("store");
        store
            .set_raw(SESSION_USER_KEY, r#"{"userId": 7, "nome": "Ana"}"#)
            .unwrap();
        let user = store.session_user().unwrap().expect("session");
        assert_eq!(user.resolved_id(), Some(&RecordId::from(7)));

        store.clear_session_user().unwrap();
        assert!(store.session_user().unwrap().is_none());
    }

    #[test]
    fn corrupt_json_reads_as_absent() {
        let store = LocalStore::open_in_memory().expect("store");
        store.set_raw(SESSION_USER_KEY, "{not json").unwrap();
        assert!(store.session_user().unwrap().is_none());
    }

    #[test]
    fn file_backed_store_is_shared_between_handles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("storage.db");
        let writer = LocalStore::open(&path).expect("writer");
        let reader = LocalStore::open(&path).expect("reader");

        writer
            .set_session_user(&SessionUser::with_id(RecordId::from(9)))
            .unwrap();
        let user = reader.session_user().unwrap().expect("session");
        assert_eq!(user.resolved_id(), Some(&RecordId::from(9)));
    }
}
