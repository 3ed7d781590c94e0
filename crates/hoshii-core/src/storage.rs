//! Durable key/value storage.
//!
//! A local-storage analogue: string keys map to string values, every write
//! is committed before `set` returns. The SQLite-backed [`Storage`] is the
//! production backend; anything implementing [`KeyValueStore`] can stand in.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::HoshiiError;

const SCHEMA_V1: &str = include_str!("../../../migrations/001_initial.sql");

/// Synchronous string key/value store.
pub trait KeyValueStore: Send {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, HoshiiError>;

    /// Replace the value stored under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<(), HoshiiError>;
}

/// SQLite-backed key/value storage.
pub struct Storage {
    conn: Connection,
    quota: Option<usize>,
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, HoshiiError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self { conn, quota: None })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, HoshiiError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn, quota: None })
    }

    /// Reject writes whose value is larger than `quota` bytes.
    pub fn with_quota(mut self, quota: Option<usize>) -> Self {
        self.quota = quota;
        self
    }
}

impl KeyValueStore for Storage {
    fn get(&self, key: &str) -> Result<Option<String>, HoshiiError> {
        self.conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| HoshiiError::StorageRead(e.to_string()))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HoshiiError> {
        if let Some(quota) = self.quota {
            if value.len() > quota {
                return Err(HoshiiError::QuotaExceeded {
                    size: value.len(),
                    quota,
                });
            }
        }
        self.conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value],
            )
            .map_err(|e| HoshiiError::StorageWrite(e.to_string()))?;
        Ok(())
    }
}

fn run_migrations(conn: &Connection) -> Result<(), HoshiiError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}
