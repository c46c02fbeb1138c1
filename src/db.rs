use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::cache::{CacheError, KeyValueStore};
use crate::utils;

/// SQLite-backed [`KeyValueStore`] living next to the app config.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open_default() -> rusqlite::Result<Self> {
        let path = utils::database_path();
        utils::ensure_parent(&path);
        Self::open(&path)
    }

    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Storage("store mutex poisoned".to_string()))
    }
}

impl KeyValueStore for Store {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at_utc)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at_utc = excluded.updated_at_utc",
            params![key, value, Utc::now()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv", [])?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at_utc TEXT NOT NULL
        );",
    )
}
