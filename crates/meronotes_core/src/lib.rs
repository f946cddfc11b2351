//! Core logic for MeroNotes: a persisted, hierarchical todo/done note store.
//! Host panels render projections of the store and call its mutation API.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig, DEFAULT_DB_FILE_NAME, DEFAULT_SLOT_KEY};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use model::note::{move_within, Cascade, Forest, ForestIssue, Note, NoteId, NotePath};
pub use repo::slot_repo::{
    MemorySlotRepository, SlotRepoError, SlotRepoResult, SlotRepository, SqliteSlotRepository,
};
pub use service::note_store::{ForestVersion, NoteStore, NoteStoreError, StoreResult};
pub use service::view::{ViewFilter, ViewItem};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
