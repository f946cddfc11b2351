//! Store configuration.
//!
//! # Responsibility
//! - Name the persisted slot and database file used by the note store.
//! - Reject configurations that would address an unusable slot.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Slot key the forest is persisted under.
pub const DEFAULT_SLOT_KEY: &str = "meronotes/storage";
/// File name of the SQLite database inside the host data directory.
pub const DEFAULT_DB_FILE_NAME: &str = "meronotes.sqlite3";

/// Configuration validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    BlankSlotKey,
    BlankDbFileName,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankSlotKey => write!(f, "slot key must not be blank"),
            Self::BlankDbFileName => write!(f, "database file name must not be blank"),
        }
    }
}

impl Error for ConfigError {}

/// Settings for one note store instance.
///
/// Deserializable so hosts can forward their own settings object; missing
/// fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    slot_key: String,
    db_file_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            slot_key: DEFAULT_SLOT_KEY.to_string(),
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
        }
    }
}

impl StoreConfig {
    /// Replaces the slot key. Surrounding whitespace is trimmed.
    pub fn with_slot_key(mut self, slot_key: impl Into<String>) -> Result<Self, ConfigError> {
        self.slot_key = slot_key.into().trim().to_string();
        self.validate()?;
        Ok(self)
    }

    /// Replaces the database file name. Surrounding whitespace is trimmed.
    pub fn with_db_file_name(mut self, file_name: impl Into<String>) -> Result<Self, ConfigError> {
        self.db_file_name = file_name.into().trim().to_string();
        self.validate()?;
        Ok(self)
    }

    pub fn slot_key(&self) -> &str {
        &self.slot_key
    }

    pub fn db_file_name(&self) -> &str {
        &self.db_file_name
    }

    /// Resolves the database path under a host-provided data directory.
    pub fn db_path(&self, data_dir: impl AsRef<Path>) -> PathBuf {
        data_dir.as_ref().join(&self.db_file_name)
    }

    /// Checks the invariants a deserialized config may have skipped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_key.trim().is_empty() {
            return Err(ConfigError::BlankSlotKey);
        }
        if self.db_file_name.trim().is_empty() {
            return Err(ConfigError::BlankDbFileName);
        }
        Ok(())
    }
}
