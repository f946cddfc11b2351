//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the durable key-value slot contract used by the note store.
//! - Isolate SQLite query details from service orchestration.

pub mod slot_repo;
