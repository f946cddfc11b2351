//! Key-value slot repository contracts and implementations.
//!
//! # Responsibility
//! - Persist opaque string values under fixed keys.
//! - Keep SQL details inside the repository boundary.
//!
//! # Invariants
//! - A write replaces the whole value for its key.
//! - `SqliteSlotRepository` only accepts fully migrated connections.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SlotRepoResult<T> = Result<T, SlotRepoError>;

/// Errors from slot repository operations.
#[derive(Debug)]
pub enum SlotRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for SlotRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "slot repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "slot repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "slot repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for SlotRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SlotRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SlotRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable key-value storage for serialized values.
pub trait SlotRepository {
    /// Loads the value stored under `key`, if any.
    fn read_slot(&self, key: &str) -> SlotRepoResult<Option<String>>;
    /// Inserts or replaces the value stored under `key`.
    fn write_slot(&self, key: &str, value: &str) -> SlotRepoResult<()>;
    /// Removes `key`. Returns whether a value existed.
    fn delete_slot(&self, key: &str) -> SlotRepoResult<bool>;
}

impl<R: SlotRepository + ?Sized> SlotRepository for &R {
    fn read_slot(&self, key: &str) -> SlotRepoResult<Option<String>> {
        (**self).read_slot(key)
    }

    fn write_slot(&self, key: &str, value: &str) -> SlotRepoResult<()> {
        (**self).write_slot(key, value)
    }

    fn delete_slot(&self, key: &str) -> SlotRepoResult<bool> {
        (**self).delete_slot(key)
    }
}

/// SQLite-backed slot repository over the `kv_slots` table.
pub struct SqliteSlotRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSlotRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> SlotRepoResult<Self> {
        ensure_slot_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SlotRepository for SqliteSlotRepository<'_> {
    fn read_slot(&self, key: &str) -> SlotRepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT slot_value
                 FROM kv_slots
                 WHERE slot_key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_slot(&self, key: &str, value: &str) -> SlotRepoResult<()> {
        self.conn.execute(
            "INSERT INTO kv_slots (slot_key, slot_value)
             VALUES (?1, ?2)
             ON CONFLICT(slot_key) DO UPDATE
             SET slot_value = excluded.slot_value,
                 updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete_slot(&self, key: &str) -> SlotRepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM kv_slots WHERE slot_key = ?1;", [key])?;
        Ok(changed > 0)
    }
}

/// Process-local slot repository.
///
/// Backs ephemeral hosts and tests; nothing survives the value being dropped.
#[derive(Debug, Default)]
pub struct MemorySlotRepository {
    slots: RefCell<BTreeMap<String, String>>,
}

impl MemorySlotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotRepository for MemorySlotRepository {
    fn read_slot(&self, key: &str) -> SlotRepoResult<Option<String>> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn write_slot(&self, key: &str, value: &str) -> SlotRepoResult<()> {
        self.slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_slot(&self, key: &str) -> SlotRepoResult<bool> {
        Ok(self.slots.borrow_mut().remove(key).is_some())
    }
}

fn ensure_slot_connection_ready(conn: &Connection) -> SlotRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(SlotRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "kv_slots")? {
        return Err(SlotRepoError::MissingRequiredTable("kv_slots"));
    }
    for column in ["slot_key", "slot_value", "updated_at"] {
        if !table_has_column(conn, "kv_slots", column)? {
            return Err(SlotRepoError::MissingRequiredColumn {
                table: "kv_slots",
                column,
            });
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> SlotRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> SlotRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
