//! Domain model for the note forest.
//!
//! # Responsibility
//! - Define the persisted note record and the forest that owns it.
//! - Keep completion-cascade rules next to the data they protect.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - Children are owned by exactly one parent; parents are referenced by id.

pub mod note;
