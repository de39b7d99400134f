use serde::{Deserialize, Serialize};

use crate::exam::model::Section;

/// Position of the displayed question, relative to its section's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct Cursor {
    pub(crate) section: Section,
    pub(crate) index: usize,
}

impl Cursor {
    pub(crate) fn new(section: Section, index: usize) -> Self {
        Self { section, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum NavigationRequest {
    Next,
    Previous,
    Select {
        #[serde(alias = "questionId")]
        question_id: String,
    },
}

/// Section sizes; MCQs come first in the combined order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Layout {
    pub(crate) mcq: usize,
    pub(crate) coding: usize,
}

impl Layout {
    fn total(self) -> usize {
        self.mcq + self.coding
    }

    fn position(self, cursor: Cursor) -> usize {
        match cursor.section {
            Section::Mcq => cursor.index,
            Section::Coding => self.mcq + cursor.index,
        }
    }

    fn cursor_at(self, position: usize) -> Cursor {
        if position < self.mcq {
            Cursor::new(Section::Mcq, position)
        } else {
            Cursor::new(Section::Coding, position - self.mcq)
        }
    }

    pub(crate) fn contains(self, cursor: Cursor) -> bool {
        match cursor.section {
            Section::Mcq => cursor.index < self.mcq,
            Section::Coding => cursor.index < self.coding,
        }
    }
}

/// Finds the next unlocked question after `from` in `direction`.
///
/// Forward scans the rest of the current section, then the other section from its
/// start, then wraps back through the current section. Backward mirrors this and
/// enters the other section at its end. Returns `None` when every question is
/// locked. Without a starting cursor the scan covers the whole combined order.
pub(crate) fn step(
    layout: Layout,
    from: Option<Cursor>,
    direction: Direction,
    is_locked: impl Fn(Cursor) -> bool,
) -> Option<Cursor> {
    let total = layout.total();
    if total == 0 {
        return None;
    }

    let origin = from.filter(|cursor| layout.contains(*cursor)).map(|cursor| layout.position(cursor));

    (1..=total)
        .map(|offset| match (origin, direction) {
            (Some(origin), Direction::Forward) => (origin + offset) % total,
            (Some(origin), Direction::Backward) => (origin + total - offset % total) % total,
            (None, Direction::Forward) => offset - 1,
            (None, Direction::Backward) => total - offset,
        })
        .map(|position| layout.cursor_at(position))
        .find(|cursor| !is_locked(*cursor))
}
