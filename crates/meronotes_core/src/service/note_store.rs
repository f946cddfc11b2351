//! Note store: sole owner and mutator of the persisted note forest.
//!
//! # Responsibility
//! - Load the forest from its slot, apply one change, write it back.
//! - Notify subscribers after every committed change.
//! - Report missing notes as `None`/`false` instead of errors.
//!
//! # Invariants
//! - The whole forest is the unit of durability; there are no partial writes.
//! - Subscribers are notified only after the slot write succeeded.
//! - A lookup miss never changes state and never notifies.
//! - Note contents are never written to logs.

use crate::config::{ConfigError, StoreConfig};
use crate::model::note::{move_within, Cascade, Forest, ForestIssue, Note, NoteId};
use crate::repo::slot_repo::{SlotRepoError, SlotRepository};
use crate::service::view::{self, ViewFilter};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{channel, Receiver, Sender};

const EMPTY_FOREST: &str = "[]";

pub type StoreResult<T> = Result<T, NoteStoreError>;

/// Errors from note store operations.
///
/// Only configuration, persistence and malformed-forest faults appear here;
/// a missing note is an ordinary outcome.
#[derive(Debug)]
pub enum NoteStoreError {
    Config(ConfigError),
    /// Slot read/write failure.
    Repo(SlotRepoError),
    /// Slot content is not a valid serialized forest.
    CorruptSlot {
        slot_key: String,
        source: serde_json::Error,
    },
    Serialize(serde_json::Error),
    /// Caller-supplied forest breaks the ownership invariants.
    InvalidForest { issue: ForestIssue },
}

impl Display for NoteStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid store config: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::CorruptSlot { slot_key, source } => {
                write!(f, "slot `{slot_key}` does not hold a note forest: {source}")
            }
            Self::Serialize(err) => write!(f, "failed to serialize note forest: {err}"),
            Self::InvalidForest { issue } => write!(f, "refusing to persist forest: {issue}"),
        }
    }
}

impl Error for NoteStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::CorruptSlot { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::InvalidForest { issue } => Some(issue),
        }
    }
}

impl From<ConfigError> for NoteStoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<SlotRepoError> for NoteStoreError {
    fn from(value: SlotRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Token sent to subscribers after each committed change.
///
/// Carries no forest data; receivers re-read the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForestVersion(u64);

impl ForestVersion {
    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Persisted note forest with change notification.
///
/// Construct once at startup with the host's slot repository and share it
/// with the view adapters.
pub struct NoteStore<R: SlotRepository> {
    repo: R,
    slot_key: String,
    version: ForestVersion,
    subscribers: Vec<Sender<ForestVersion>>,
}

impl<R: SlotRepository> NoteStore<R> {
    /// Binds a store to `repo`, initializing the slot to an empty forest
    /// on first use.
    ///
    /// # Errors
    /// - `Config` when the config fails validation.
    /// - `Repo` when the slot cannot be read or initialized.
    /// - `CorruptSlot` when an existing slot does not parse.
    pub fn open(repo: R, config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let slot_key = config.slot_key().to_string();

        let initialized = repo.read_slot(&slot_key)?.is_none();
        if initialized {
            repo.write_slot(&slot_key, EMPTY_FOREST)?;
        }

        let store = Self {
            repo,
            slot_key,
            version: ForestVersion::default(),
            subscribers: Vec::new(),
        };
        let forest = store.forest()?;
        info!(
            "event=store_open module=store status=ok slot_initialized={} roots={} notes={}",
            initialized,
            forest.len(),
            forest.total_len()
        );
        Ok(store)
    }

    pub fn slot_key(&self) -> &str {
        &self.slot_key
    }

    /// Version of the last committed change; `0` before any mutation.
    pub fn version(&self) -> ForestVersion {
        self.version
    }

    /// Registers a change listener.
    ///
    /// Dropping the receiver unsubscribes it on the next change.
    pub fn subscribe(&mut self) -> Receiver<ForestVersion> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Reads the full forest from the slot.
    ///
    /// A slot removed behind the store's back reads as an empty forest.
    pub fn forest(&self) -> StoreResult<Forest> {
        match self.repo.read_slot(&self.slot_key)? {
            None => Ok(Forest::new()),
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|source| NoteStoreError::CorruptSlot {
                    slot_key: self.slot_key.clone(),
                    source,
                })
            }
        }
    }

    /// Depth-first lookup by id.
    pub fn get(&self, id: NoteId) -> StoreResult<Option<Note>> {
        Ok(self.forest()?.get(id).cloned())
    }

    /// Flat index of a root-level note.
    pub fn index_of(&self, id: NoteId) -> StoreResult<Option<usize>> {
        Ok(self.forest()?.index_of(id))
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.forest()?.is_empty())
    }

    /// Whether the todo view has anything to show at root level.
    pub fn has_todo_items(&self) -> StoreResult<bool> {
        let forest = self.forest()?;
        let pending = view::roots(&forest, ViewFilter::Todo).len();
        Ok(pending > 0)
    }

    /// Appends a new root-level note.
    pub fn add(&mut self, contents: impl Into<String>) -> StoreResult<Note> {
        let note = Note::new(contents);
        let mut forest = self.forest()?;
        forest.push_root(note.clone());
        self.commit(&forest)?;
        info!("event=note_add module=store status=ok note_id={}", note.id);
        Ok(note)
    }

    /// Appends a new note under `parent_id`.
    ///
    /// Returns `None` without writing when the parent does not exist.
    pub fn add_child(
        &mut self,
        parent_id: NoteId,
        contents: impl Into<String>,
    ) -> StoreResult<Option<Note>> {
        let mut forest = self.forest()?;
        let child = match forest.push_child(parent_id, Note::new_child(parent_id, contents)) {
            Some(child) => child.clone(),
            None => {
                warn!(
                    "event=note_add_child module=store status=noop reason=parent_not_found parent_id={parent_id}"
                );
                return Ok(None);
            }
        };
        self.commit(&forest)?;
        info!(
            "event=note_add_child module=store status=ok note_id={} parent_id={parent_id}",
            child.id
        );
        Ok(Some(child))
    }

    /// Replaces the contents of one note.
    pub fn edit(&mut self, id: NoteId, contents: impl Into<String>) -> StoreResult<Option<Note>> {
        let mut forest = self.forest()?;
        let edited = match forest.get_mut(id) {
            Some(note) => {
                note.contents = contents.into();
                note.clone()
            }
            None => {
                warn!("event=note_edit module=store status=noop reason=not_found note_id={id}");
                return Ok(None);
            }
        };
        self.commit(&forest)?;
        info!("event=note_edit module=store status=ok note_id={id}");
        Ok(Some(edited))
    }

    /// Removes one note and its whole subtree from the owning sequence.
    pub fn delete(&mut self, id: NoteId) -> StoreResult<Option<Note>> {
        let mut forest = self.forest()?;
        let Some(removed) = forest.remove(id) else {
            warn!("event=note_delete module=store status=noop reason=not_found note_id={id}");
            return Ok(None);
        };
        self.commit(&forest)?;
        info!(
            "event=note_delete module=store status=ok note_id={id} removed={}",
            removed.subtree_len()
        );
        Ok(Some(removed))
    }

    /// Empties the forest, returning how many notes were removed.
    ///
    /// An already empty forest is left untouched and not re-notified.
    pub fn delete_all(&mut self) -> StoreResult<usize> {
        let mut forest = self.forest()?;
        if forest.is_empty() {
            info!("event=note_delete_all module=store status=noop reason=empty");
            return Ok(0);
        }
        let removed = forest.clear();
        self.commit(&forest)?;
        info!("event=note_delete_all module=store status=ok removed={removed}");
        Ok(removed)
    }

    /// Moves the root-level note at `from` to `to` (splice semantics).
    ///
    /// Returns `false` without writing when `from` is out of range.
    pub fn move_root(&mut self, to: usize, from: usize) -> StoreResult<bool> {
        let mut forest = self.forest()?;
        let len = forest.len();
        if !move_within(forest.roots_mut(), to, from) {
            warn!(
                "event=note_move module=store status=noop reason=index_out_of_range from={from} len={len}"
            );
            return Ok(false);
        }
        self.commit(&forest)?;
        info!("event=note_move module=store status=ok from={from} to={to}");
        Ok(true)
    }

    /// Moves a child of `parent_id` from `from` to `to` (splice semantics).
    pub fn move_child(&mut self, parent_id: NoteId, to: usize, from: usize) -> StoreResult<bool> {
        let mut forest = self.forest()?;
        let moved = match forest.get_mut(parent_id) {
            Some(parent) => move_within(&mut parent.children, to, from),
            None => {
                warn!(
                    "event=note_move_child module=store status=noop reason=parent_not_found parent_id={parent_id}"
                );
                return Ok(false);
            }
        };
        if !moved {
            warn!(
                "event=note_move_child module=store status=noop reason=index_out_of_range parent_id={parent_id} from={from}"
            );
            return Ok(false);
        }
        self.commit(&forest)?;
        info!(
            "event=note_move_child module=store status=ok parent_id={parent_id} from={from} to={to}"
        );
        Ok(true)
    }

    /// Marks a note and all its descendants done; promotes the direct parent
    /// once every sibling is done.
    pub fn done(&mut self, id: NoteId) -> StoreResult<Option<Cascade>> {
        self.apply_cascade("note_done", id, Forest::mark_done)
    }

    /// Marks a note and all its descendants undone; demotes the direct parent.
    pub fn redo(&mut self, id: NoteId) -> StoreResult<Option<Cascade>> {
        self.apply_cascade("note_redo", id, Forest::mark_undone)
    }

    /// Marks every note done, returning how many notes were visited.
    pub fn mark_all_done(&mut self) -> StoreResult<usize> {
        let mut forest = self.forest()?;
        if forest.is_empty() {
            info!("event=note_done_all module=store status=noop reason=empty");
            return Ok(0);
        }
        let touched = forest.set_all_done(true);
        self.commit(&forest)?;
        info!("event=note_done_all module=store status=ok touched={touched}");
        Ok(touched)
    }

    /// Persists a caller-edited forest.
    ///
    /// Entry point for adapters that reorder nested children in place.
    ///
    /// # Errors
    /// - `InvalidForest` when an id repeats or a `parent` does not match
    ///   the owning note; nothing is written and nobody is notified.
    pub fn replace_forest(&mut self, forest: Forest) -> StoreResult<ForestVersion> {
        if let Err(issue) = forest.validate() {
            warn!("event=forest_replace module=store status=error reason=invalid_forest error={issue}");
            return Err(NoteStoreError::InvalidForest { issue });
        }
        let version = self.commit(&forest)?;
        info!(
            "event=forest_replace module=store status=ok roots={} version={}",
            forest.len(),
            version.get()
        );
        Ok(version)
    }

    fn apply_cascade(
        &mut self,
        event: &'static str,
        id: NoteId,
        apply: fn(&mut Forest, NoteId) -> Option<Cascade>,
    ) -> StoreResult<Option<Cascade>> {
        let mut forest = self.forest()?;
        let Some(cascade) = apply(&mut forest, id) else {
            warn!("event={event} module=store status=noop reason=not_found note_id={id}");
            return Ok(None);
        };
        self.commit(&forest)?;
        match cascade.parent_flipped {
            Some(parent_id) => info!(
                "event={event} module=store status=ok note_id={id} touched={} parent_flipped={parent_id}",
                cascade.touched
            ),
            None => info!(
                "event={event} module=store status=ok note_id={id} touched={}",
                cascade.touched
            ),
        }
        Ok(Some(cascade))
    }

    fn commit(&mut self, forest: &Forest) -> StoreResult<ForestVersion> {
        let payload = serde_json::to_string(forest).map_err(NoteStoreError::Serialize)?;
        if let Err(err) = self.repo.write_slot(&self.slot_key, &payload) {
            error!(
                "event=store_persist module=store status=error version={} error={err}",
                self.version.get()
            );
            return Err(err.into());
        }

        self.version = self.version.next();
        let version = self.version;
        self.subscribers.retain(|tx| tx.send(version).is_ok());
        debug!(
            "event=store_persist module=store status=ok version={} subscribers={}",
            version.get(),
            self.subscribers.len()
        );
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::{NoteStore, NoteStoreError};
    use crate::config::StoreConfig;
    use crate::repo::slot_repo::{
        MemorySlotRepository, SlotRepoError, SlotRepoResult, SlotRepository,
    };
    use std::cell::Cell;

    /// Memory repository whose writes can be switched off.
    #[derive(Default)]
    struct FlakyRepo {
        inner: MemorySlotRepository,
        fail_writes: Cell<bool>,
    }

    impl SlotRepository for FlakyRepo {
        fn read_slot(&self, key: &str) -> SlotRepoResult<Option<String>> {
            self.inner.read_slot(key)
        }

        fn write_slot(&self, key: &str, value: &str) -> SlotRepoResult<()> {
            if self.fail_writes.get() {
                return Err(SlotRepoError::MissingRequiredTable("kv_slots"));
            }
            self.inner.write_slot(key, value)
        }

        fn delete_slot(&self, key: &str) -> SlotRepoResult<bool> {
            self.inner.delete_slot(key)
        }
    }

    #[test]
    fn failed_write_surfaces_error_and_skips_notification() {
        let repo = FlakyRepo::default();
        let mut store = NoteStore::open(&repo, &StoreConfig::default()).unwrap();
        let rx = store.subscribe();
        store.add("kept").unwrap();
        assert_eq!(rx.try_recv().unwrap().get(), 1);

        repo.fail_writes.set(true);
        let err = store.add("lost").unwrap_err();
        assert!(matches!(err, NoteStoreError::Repo(_)));
        assert!(rx.try_recv().is_err());
        assert_eq!(store.version().get(), 1);

        repo.fail_writes.set(false);
        let forest = store.forest().unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.roots()[0].contents, "kept");
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let mut store =
            NoteStore::open(MemorySlotRepository::new(), &StoreConfig::default()).unwrap();
        let kept = store.subscribe();
        drop(store.subscribe());

        store.add("one").unwrap();
        assert_eq!(store.subscribers.len(), 1);
        assert_eq!(kept.try_recv().unwrap().get(), 1);
    }

    #[test]
    fn corrupt_slot_is_reported() {
        let repo = MemorySlotRepository::new();
        repo.write_slot("meronotes/storage", "{not json").unwrap();
        let err = NoteStore::open(&repo, &StoreConfig::default())
            .err()
            .expect("corrupt slot should fail to open");
        assert!(matches!(err, NoteStoreError::CorruptSlot { .. }));
    }
}
