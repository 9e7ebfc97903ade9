//! Forward-only cursors over sorted id streams.
//!
//! Every cursor implements [`Cursor`]: `advance` moves to the next matching
//! id, `advance_to` moves to the first matching id at or after a target.
//! Both return 0 once the stream is exhausted, and an exhausted cursor stays
//! exhausted. `advance_to` with a target at or below the current id is a
//! no-op returning the current id.
//!
//! Cursors compose: [`AndCursor`] intersects, [`OrCursor`] unions,
//! [`NotCursor`] subtracts, [`PhraseCursor`] intersects with positional
//! adjacency and [`FilterCursor`] applies position/frequency predicates.
//! None of them allocate per step beyond their position windows, perform
//! I/O, or lock anything.

mod and;
mod filter;
mod not;
mod or;
mod phrase;

pub use and::AndCursor;
pub use filter::{filter, FilterCursor, PositionPredicate};
pub use not::NotCursor;
pub use or::OrCursor;
pub use phrase::{find_phrases, PhraseCursor};

use crate::types::DocId;

/// Variant tag of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Empty,
    Term,
    And,
    Or,
    PositionalOr,
    WildcardOr,
    Not,
    Phrase,
    Filter,
    Range,
    Single,
}

impl CursorKind {
    /// Whether cursors of this kind expose a meaningful position window
    pub fn has_positions(self) -> bool {
        matches!(
            self,
            CursorKind::Term
                | CursorKind::PositionalOr
                | CursorKind::WildcardOr
                | CursorKind::Phrase
                | CursorKind::Filter
        )
    }
}

/// The cursor protocol
pub trait Cursor {
    fn kind(&self) -> CursorKind;

    /// The id the cursor is positioned on, 0 before the first move or after exhaustion
    fn current(&self) -> DocId;

    /// Move to the next matching id, 0 when exhausted
    fn advance(&mut self) -> DocId;

    /// Move to the first matching id `>= id`, 0 when exhausted
    fn advance_to(&mut self, id: DocId) -> DocId;

    /// Sorted positions matched at the current id
    fn positions(&self) -> &[u16] {
        &[]
    }
}

/// Boxed cursor borrowing from its source for `'a`
pub type BoxCursor<'a> = Box<dyn Cursor + 'a>;

impl<C: Cursor + ?Sized> Cursor for Box<C> {
    fn kind(&self) -> CursorKind {
        (**self).kind()
    }

    fn current(&self) -> DocId {
        (**self).current()
    }

    fn advance(&mut self) -> DocId {
        (**self).advance()
    }

    fn advance_to(&mut self, id: DocId) -> DocId {
        (**self).advance_to(id)
    }

    fn positions(&self) -> &[u16] {
        (**self).positions()
    }
}

/// Iterator adapter yielding ids until the cursor exhausts
pub struct Ids<C> {
    cursor: C,
}

impl<C: Cursor> Iterator for Ids<C> {
    type Item = DocId;

    fn next(&mut self) -> Option<DocId> {
        match self.cursor.advance() {
            0 => None,
            id => Some(id),
        }
    }
}

/// Iterate a cursor's remaining ids
pub fn ids<C: Cursor>(cursor: C) -> Ids<C> {
    Ids { cursor }
}

/// Drain a cursor into a vector
pub fn collect_ids<C: Cursor>(cursor: C) -> Vec<DocId> {
    ids(cursor).collect()
}

/// A cursor that matches nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyCursor;

impl Cursor for EmptyCursor {
    fn kind(&self) -> CursorKind {
        CursorKind::Empty
    }

    fn current(&self) -> DocId {
        0
    }

    fn advance(&mut self) -> DocId {
        0
    }

    fn advance_to(&mut self, _id: DocId) -> DocId {
        0
    }
}

/// Every id in `[start, end)`
#[derive(Debug, Clone)]
pub struct RangeCursor {
    next: DocId,
    end: DocId,
    current: DocId,
}

impl RangeCursor {
    pub fn new(start: DocId, end: DocId) -> Self {
        Self {
            next: start.max(1),
            end,
            current: 0,
        }
    }

    fn exhaust(&mut self) -> DocId {
        self.next = self.end;
        self.current = 0;
        0
    }
}

impl Cursor for RangeCursor {
    fn kind(&self) -> CursorKind {
        CursorKind::Range
    }

    fn current(&self) -> DocId {
        self.current
    }

    fn advance(&mut self) -> DocId {
        if self.next >= self.end {
            return self.exhaust();
        }
        self.current = self.next;
        self.next += 1;
        self.current
    }

    fn advance_to(&mut self, id: DocId) -> DocId {
        if self.current != 0 && id <= self.current {
            return self.current;
        }
        self.next = self.next.max(id);
        self.advance()
    }
}

/// Exactly one id
#[derive(Debug, Clone)]
pub struct SingleIdCursor {
    id: DocId,
    current: DocId,
    done: bool,
}

impl SingleIdCursor {
    pub fn new(id: DocId) -> Self {
        Self {
            id,
            current: 0,
            done: id == 0,
        }
    }
}

impl Cursor for SingleIdCursor {
    fn kind(&self) -> CursorKind {
        CursorKind::Single
    }

    fn current(&self) -> DocId {
        self.current
    }

    fn advance(&mut self) -> DocId {
        if self.done || self.current != 0 {
            self.done = true;
            self.current = 0;
            return 0;
        }
        self.current = self.id;
        self.current
    }

    fn advance_to(&mut self, id: DocId) -> DocId {
        if self.done {
            return 0;
        }
        if self.current != 0 && id <= self.current {
            return self.current;
        }
        if id <= self.id && self.current == 0 {
            return self.advance();
        }
        self.done = true;
        self.current = 0;
        0
    }
}

/// Collapse a list of per-term cursors into one wildcard union
pub fn wildcard<'a>(mut cursors: Vec<BoxCursor<'a>>) -> BoxCursor<'a> {
    match cursors.len() {
        0 => Box::new(EmptyCursor),
        1 => cursors.remove(0),
        _ => Box::new(OrCursor::wildcard(cursors)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory cursor over a fixed list of (id, positions)
    pub struct VecCursor {
        entries: Vec<(DocId, Vec<u16>)>,
        idx: usize,
        current: DocId,
        done: bool,
    }

    impl VecCursor {
        pub fn new(ids: &[DocId]) -> Self {
            Self::with_positions(ids.iter().map(|&id| (id, Vec::new())).collect())
        }

        pub fn with_positions(entries: Vec<(DocId, Vec<u16>)>) -> Self {
            Self {
                entries,
                idx: 0,
                current: 0,
                done: false,
            }
        }

        pub fn boxed<'a>(ids: &[DocId]) -> BoxCursor<'a> {
            Box::new(Self::new(ids))
        }
    }

    impl Cursor for VecCursor {
        fn kind(&self) -> CursorKind {
            CursorKind::Term
        }

        fn current(&self) -> DocId {
            self.current
        }

        fn advance(&mut self) -> DocId {
            if self.done || self.idx >= self.entries.len() {
                self.done = true;
                self.current = 0;
                return 0;
            }
            self.current = self.entries[self.idx].0;
            self.idx += 1;
            self.current
        }

        fn advance_to(&mut self, id: DocId) -> DocId {
            if self.done {
                return 0;
            }
            if self.current != 0 && id <= self.current {
                return self.current;
            }
            loop {
                let next = self.advance();
                if next == 0 || next >= id {
                    return next;
                }
            }
        }

        fn positions(&self) -> &[u16] {
            if self.current == 0 {
                return &[];
            }
            &self.entries[self.idx - 1].1
        }
    }
}
