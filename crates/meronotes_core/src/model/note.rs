//! Note and forest domain model.
//!
//! # Responsibility
//! - Define the record stored in the persisted slot.
//! - Provide depth-first lookup and index-path addressed mutation.
//! - Implement the done/undone cascade over one forest snapshot.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - A note lives in exactly one sequence: the root list or one parent's
//!   `children`. `parent` is `None` exactly for root-level notes.
//! - Marking a note done or undone always reaches every descendant.
//! - Promotion/demotion of ancestors only re-checks the direct parent.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every note in the forest.
pub type NoteId = Uuid;

/// Child indexes from the root sequence down to one note.
///
/// `[2, 0]` addresses the first child of the third root-level note.
pub type NotePath = Vec<usize>;

/// One todo/done item with ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Assigned at creation, never changed.
    pub id: NoteId,
    /// Opaque display text. Non-emptiness is enforced by the input layer.
    pub contents: String,
    /// Completion flag.
    pub done: bool,
    /// Owned children; order is display and reorder order.
    #[serde(default)]
    pub children: Vec<Note>,
    /// Owning note id, absent for root-level notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NoteId>,
}

impl Note {
    /// Creates a root-level note with a fresh id.
    pub fn new(contents: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), None, contents)
    }

    /// Creates a note that will be appended under `parent`.
    pub fn new_child(parent: NoteId, contents: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), Some(parent), contents)
    }

    /// Creates a note with a caller-provided id.
    pub fn with_id(id: NoteId, parent: Option<NoteId>, contents: impl Into<String>) -> Self {
        Self {
            id,
            contents: contents.into(),
            done: false,
            children: Vec::new(),
            parent,
        }
    }

    /// Number of notes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Note::subtree_len).sum::<usize>()
    }

    /// Sets `done` on this note and every descendant.
    ///
    /// Returns the number of notes visited.
    pub fn set_done_recursive(&mut self, done: bool) -> usize {
        self.done = done;
        1 + self
            .children
            .iter_mut()
            .map(|child| child.set_done_recursive(done))
            .sum::<usize>()
    }

    /// Calls `visit` for this note and every descendant in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Note)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Result of one cascading completion change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cascade {
    /// Note the change was requested for.
    pub target: NoteId,
    /// Target plus descendants whose flag was assigned.
    pub touched: usize,
    /// Direct parent whose flag flipped as a consequence, if any.
    pub parent_flipped: Option<NoteId>,
}

/// Structural defect that makes a forest unsafe to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForestIssue {
    /// The same id appears more than once.
    DuplicateId(NoteId),
    /// A note's `parent` does not name the note that owns it.
    ParentMismatch {
        id: NoteId,
        owner: Option<NoteId>,
        recorded: Option<NoteId>,
    },
}

impl Display for ForestIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "note id appears more than once: {id}"),
            Self::ParentMismatch {
                id,
                owner,
                recorded,
            } => write!(
                f,
                "note {id} is owned by {} but records parent {}",
                describe_parent(*owner),
                describe_parent(*recorded)
            ),
        }
    }
}

impl Error for ForestIssue {}

fn describe_parent(parent: Option<NoteId>) -> String {
    parent.map_or_else(|| "root".to_string(), |id| id.to_string())
}

/// Ordered root-level notes and everything nested below them.
///
/// Serialized as a bare JSON array so the slot layout stays a plain list
/// of note records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Forest {
    roots: Vec<Note>,
}

impl Forest {
    /// Creates an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roots(roots: Vec<Note>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[Note] {
        &self.roots
    }

    /// Mutable root sequence for callers that reorder in place before
    /// handing the forest back to the store.
    pub fn roots_mut(&mut self) -> &mut Vec<Note> {
        &mut self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of root-level notes.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Number of notes at every depth.
    pub fn total_len(&self) -> usize {
        self.roots.iter().map(Note::subtree_len).sum()
    }

    /// Calls `visit` for every note in depth-first pre-order.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a Note)) {
        for root in &self.roots {
            root.walk(&mut visit);
        }
    }

    /// Checks the ownership invariants in one depth-first pass.
    ///
    /// Every id must be unique and every `parent` must name the note whose
    /// `children` hold it (`None` in the root sequence).
    pub fn validate(&self) -> Result<(), ForestIssue> {
        let mut seen = HashSet::new();
        validate_sequence(&self.roots, None, &mut seen)
    }

    /// Depth-first search for `id`, returning its index path.
    pub fn path_of(&self, id: NoteId) -> Option<NotePath> {
        let mut path = Vec::new();
        if find_path(&self.roots, id, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    /// Depth-first lookup by id.
    pub fn get(&self, id: NoteId) -> Option<&Note> {
        let path = self.path_of(id)?;
        self.note_at(&path)
    }

    pub fn get_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        let path = self.path_of(id)?;
        self.note_at_mut(&path)
    }

    /// Flat index of a root-level note. Nested notes return `None`.
    pub fn index_of(&self, id: NoteId) -> Option<usize> {
        self.roots.iter().position(|note| note.id == id)
    }

    pub fn note_at(&self, path: &[usize]) -> Option<&Note> {
        let (first, rest) = path.split_first()?;
        let mut current = self.roots.get(*first)?;
        for index in rest {
            current = current.children.get(*index)?;
        }
        Some(current)
    }

    pub fn note_at_mut(&mut self, path: &[usize]) -> Option<&mut Note> {
        let (first, rest) = path.split_first()?;
        let mut current = self.roots.get_mut(*first)?;
        for index in rest {
            current = current.children.get_mut(*index)?;
        }
        Some(current)
    }

    /// Sequence owning the notes addressed by `parent_path + [i]`.
    ///
    /// An empty path addresses the root sequence.
    pub fn sequence_mut(&mut self, parent_path: &[usize]) -> Option<&mut Vec<Note>> {
        if parent_path.is_empty() {
            return Some(&mut self.roots);
        }
        self.note_at_mut(parent_path).map(|note| &mut note.children)
    }

    /// Appends a root-level note, clearing any stale parent reference.
    pub fn push_root(&mut self, mut note: Note) {
        note.parent = None;
        self.roots.push(note);
    }

    /// Appends `note` under `parent_id`.
    ///
    /// Returns the stored child, or `None` when the parent does not exist.
    pub fn push_child(&mut self, parent_id: NoteId, mut note: Note) -> Option<&Note> {
        let parent = self.get_mut(parent_id)?;
        note.parent = Some(parent_id);
        parent.children.push(note);
        parent.children.last()
    }

    /// Removes the note with `id` from whichever sequence owns it.
    ///
    /// The whole subtree leaves with it; siblings keep their relative order.
    pub fn remove(&mut self, id: NoteId) -> Option<Note> {
        let path = self.path_of(id)?;
        let (last, parent_path) = path.split_last()?;
        let sequence = self.sequence_mut(parent_path)?;
        Some(sequence.remove(*last))
    }

    /// Clears all notes, returning how many were removed at every depth.
    pub fn clear(&mut self) -> usize {
        let removed = self.total_len();
        self.roots.clear();
        removed
    }

    /// Sets `done` on every note unconditionally.
    pub fn set_all_done(&mut self, done: bool) -> usize {
        self.roots
            .iter_mut()
            .map(|note| note.set_done_recursive(done))
            .sum()
    }

    /// Marks `id` and its descendants done, then promotes the direct parent
    /// when all of its children are done.
    pub fn mark_done(&mut self, id: NoteId) -> Option<Cascade> {
        self.cascade(id, true)
    }

    /// Marks `id` and its descendants undone, then demotes the direct
    /// parent, which can no longer have every child done.
    pub fn mark_undone(&mut self, id: NoteId) -> Option<Cascade> {
        self.cascade(id, false)
    }

    fn cascade(&mut self, id: NoteId, done: bool) -> Option<Cascade> {
        let path = self.path_of(id)?;
        let touched = self.note_at_mut(&path)?.set_done_recursive(done);

        let parent_path = &path[..path.len() - 1];
        let mut parent_flipped = None;
        if !parent_path.is_empty() {
            let parent = self.note_at_mut(parent_path)?;
            let settled = if done {
                parent.children.iter().all(|child| child.done)
            } else {
                parent.children.iter().any(|child| !child.done)
            };
            if settled && parent.done != done {
                parent.done = done;
                parent_flipped = Some(parent.id);
            }
        }

        Some(Cascade {
            target: id,
            touched,
            parent_flipped,
        })
    }
}

/// Moves the element at `from` to `to` with splice semantics.
///
/// `to` is clamped to the sequence end after removal. Returns `false` and
/// leaves the sequence untouched when `from` is out of range.
pub fn move_within(notes: &mut Vec<Note>, to: usize, from: usize) -> bool {
    if from >= notes.len() {
        return false;
    }
    let note = notes.remove(from);
    let to = to.min(notes.len());
    notes.insert(to, note);
    true
}

fn validate_sequence(
    notes: &[Note],
    owner: Option<NoteId>,
    seen: &mut HashSet<NoteId>,
) -> Result<(), ForestIssue> {
    for note in notes {
        if !seen.insert(note.id) {
            return Err(ForestIssue::DuplicateId(note.id));
        }
        if note.parent != owner {
            return Err(ForestIssue::ParentMismatch {
                id: note.id,
                owner,
                recorded: note.parent,
            });
        }
        validate_sequence(&note.children, Some(note.id), seen)?;
    }
    Ok(())
}

fn find_path(notes: &[Note], id: NoteId, path: &mut NotePath) -> bool {
    for (index, note) in notes.iter().enumerate() {
        path.push(index);
        if note.id == id || find_path(&note.children, id, path) {
            return true;
        }
        path.pop();
    }
    false
}
