//! Todo/done projections of the note forest.
//!
//! Host tree views render these read-only snapshots and re-fetch them on
//! every store notification.

use crate::model::note::{Forest, Note, NoteId};

/// Which of the two panel views a projection is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewFilter {
    /// Notes still to do (`done == false`).
    Todo,
    /// Completed notes (`done == true`).
    Done,
}

impl ViewFilter {
    pub fn matches(self, note: &Note) -> bool {
        match self {
            Self::Todo => !note.done,
            Self::Done => note.done,
        }
    }

    /// Context value hosts attach to rendered items for menu routing.
    pub fn context_value(self) -> &'static str {
        match self {
            Self::Todo => "meronote/todo",
            Self::Done => "meronote/done",
        }
    }
}

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewItem<'a> {
    pub id: NoteId,
    pub label: &'a str,
    pub parent: Option<NoteId>,
    pub checked: bool,
    /// Shown expanded when the note has children of any state; never in the done view.
    pub expanded: bool,
    pub context_value: &'static str,
}

impl<'a> ViewItem<'a> {
    pub fn new(note: &'a Note, filter: ViewFilter) -> Self {
        Self {
            id: note.id,
            label: note.contents.as_str(),
            parent: note.parent,
            checked: note.done,
            expanded: filter == ViewFilter::Todo && !note.children.is_empty(),
            context_value: filter.context_value(),
        }
    }
}

/// Root-level notes matching `filter`, in stored order.
pub fn roots(forest: &Forest, filter: ViewFilter) -> Vec<ViewItem<'_>> {
    project(forest.roots(), filter)
}

/// Children of `parent_id` matching `filter`; empty when the parent is gone.
///
/// The done view is flat: completed notes are listed at root level only.
pub fn children(forest: &Forest, parent_id: NoteId, filter: ViewFilter) -> Vec<ViewItem<'_>> {
    if filter == ViewFilter::Done {
        return Vec::new();
    }
    forest
        .get(parent_id)
        .map(|parent| project(&parent.children, filter))
        .unwrap_or_default()
}

fn project(notes: &[Note], filter: ViewFilter) -> Vec<ViewItem<'_>> {
    notes
        .iter()
        .filter(|note| filter.matches(note))
        .map(|note| ViewItem::new(note, filter))
        .collect()
}
