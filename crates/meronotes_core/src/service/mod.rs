//! Core use-case services.
//!
//! # Responsibility
//! - Own the note forest and expose its mutation API.
//! - Project the forest into the todo/done views consumed by host adapters.

pub mod note_store;
pub mod view;
