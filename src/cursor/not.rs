use super::{BoxCursor, Cursor, CursorKind};
use crate::types::DocId;

/// Ids of the positive cursor that the negative cursor does not contain.
///
/// Once the negative side exhausts, every remaining positive id passes
/// through without probing it again.
pub struct NotCursor<'a> {
    positive: BoxCursor<'a>,
    negative: BoxCursor<'a>,
    pass_through: bool,
    current: DocId,
    done: bool,
}

impl<'a> NotCursor<'a> {
    pub fn new(positive: BoxCursor<'a>, negative: BoxCursor<'a>) -> Self {
        Self {
            positive,
            negative,
            pass_through: false,
            current: 0,
            done: false,
        }
    }

    fn exclude(&mut self, mut id: DocId) -> DocId {
        loop {
            if id == 0 {
                self.done = true;
                self.current = 0;
                return 0;
            }
            if !self.pass_through {
                let neg = self.negative.advance_to(id);
                if neg == 0 {
                    self.pass_through = true;
                } else if neg == id {
                    id = self.positive.advance();
                    continue;
                }
            }
            self.current = id;
            return id;
        }
    }
}

impl Cursor for NotCursor<'_> {
    fn kind(&self) -> CursorKind {
        CursorKind::Not
    }

    fn current(&self) -> DocId {
        self.current
    }

    fn advance(&mut self) -> DocId {
        if self.done {
            return 0;
        }
        let id = self.positive.advance();
        self.exclude(id)
    }

    fn advance_to(&mut self, id: DocId) -> DocId {
        if self.done {
            return 0;
        }
        if self.current != 0 && id <= self.current {
            return self.current;
        }
        let id = self.positive.advance_to(id);
        self.exclude(id)
    }

    fn positions(&self) -> &[u16] {
        self.positive.positions()
    }
}
