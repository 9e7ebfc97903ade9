use super::{BoxCursor, Cursor, CursorKind};
use crate::types::DocId;

/// Intersection of sub-cursors using a zigzag join.
///
/// The first sub-cursor proposes a candidate; every other sub-cursor is
/// advanced to it. Any overshoot becomes the new candidate and the round
/// restarts from the first sub-cursor.
pub struct AndCursor<'a> {
    subs: Vec<BoxCursor<'a>>,
    current: DocId,
    done: bool,
}

impl<'a> AndCursor<'a> {
    pub fn new() -> Self {
        Self {
            subs: Vec::new(),
            current: 0,
            done: false,
        }
    }

    pub fn from_cursors(subs: Vec<BoxCursor<'a>>) -> Self {
        Self {
            subs,
            current: 0,
            done: false,
        }
    }

    /// Add a sub-cursor; only meaningful before the first move
    pub fn add(&mut self, cursor: BoxCursor<'a>) {
        self.subs.push(cursor);
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    pub(crate) fn subs(&self) -> &[BoxCursor<'a>] {
        &self.subs
    }

    /// Align every sub-cursor on `id` or a larger common id
    pub(crate) fn align(&mut self, mut id: DocId) -> DocId {
        'round: loop {
            if id == 0 {
                return self.exhaust();
            }
            for i in 1..self.subs.len() {
                let got = self.subs[i].advance_to(id);
                if got != id {
                    if got == 0 {
                        return self.exhaust();
                    }
                    id = self.subs[0].advance_to(got);
                    continue 'round;
                }
            }
            self.current = id;
            return id;
        }
    }

    /// Advance the lead sub-cursor and realign
    pub(crate) fn step(&mut self) -> DocId {
        let id = self.subs[0].advance();
        self.align(id)
    }

    pub(crate) fn exhaust(&mut self) -> DocId {
        self.done = true;
        self.current = 0;
        0
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done || self.subs.is_empty()
    }
}

impl Default for AndCursor<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor for AndCursor<'_> {
    fn kind(&self) -> CursorKind {
        CursorKind::And
    }

    fn current(&self) -> DocId {
        self.current
    }

    fn advance(&mut self) -> DocId {
        if self.is_done() {
            return self.exhaust();
        }
        self.step()
    }

    fn advance_to(&mut self, id: DocId) -> DocId {
        if self.is_done() {
            return self.exhaust();
        }
        if self.current != 0 && id <= self.current {
            return self.current;
        }
        let id = self.subs[0].advance_to(id);
        self.align(id)
    }
}
