use super::{AndCursor, BoxCursor, Cursor, CursorKind};
use crate::types::DocId;

/// Scan the windows of a phrase's terms in lock-step.
///
/// Pushes every start position `p` such that window `i` contains `p + i` for
/// each term `i`, and returns whether any phrase was found. Windows must be
/// sorted ascending.
pub fn find_phrases(windows: &[&[u16]], out: &mut Vec<u16>) -> bool {
    out.clear();
    let Some((first, rest)) = windows.split_first() else {
        return false;
    };
    let mut idx = vec![0usize; rest.len()];
    let mut lead = 0usize;

    'candidate: loop {
        let Some(&start) = first.get(lead) else {
            return !out.is_empty();
        };
        let mut min_pos = start as u32;
        let mut i = 0;
        while i < rest.len() {
            let window = rest[i];
            let target = min_pos + i as u32 + 1;
            while idx[i] < window.len() && (window[idx[i]] as u32) < target {
                idx[i] += 1;
            }
            let Some(&pos) = window.get(idx[i]) else {
                return !out.is_empty();
            };
            let pos = pos as u32;
            if pos > target {
                min_pos = pos - (i as u32 + 1);
                while first.get(lead).is_some_and(|&p| (p as u32) < min_pos) {
                    lead += 1;
                }
                continue 'candidate;
            }
            i += 1;
        }
        out.push(min_pos as u16);
        lead += 1;
    }
}

/// Ids where the sub-cursors' positions line up as consecutive offsets.
///
/// Matching ids are found the way [`AndCursor`] finds them; an id whose
/// windows hold no aligned run is skipped. The window of a phrase cursor is
/// the list of phrase start positions at the current id.
pub struct PhraseCursor<'a> {
    inner: AndCursor<'a>,
    starts: Vec<u16>,
}

impl<'a> PhraseCursor<'a> {
    pub fn new() -> Self {
        Self {
            inner: AndCursor::new(),
            starts: Vec::new(),
        }
    }

    pub fn from_cursors(subs: Vec<BoxCursor<'a>>) -> Self {
        Self {
            inner: AndCursor::from_cursors(subs),
            starts: Vec::new(),
        }
    }

    /// Add the next term of the phrase; only meaningful before the first move
    pub fn add(&mut self, cursor: BoxCursor<'a>) {
        self.inner.add(cursor);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn settle(&mut self, mut id: DocId) -> DocId {
        loop {
            if id == 0 {
                self.starts.clear();
                return 0;
            }
            let windows: Vec<&[u16]> = self.inner.subs().iter().map(|c| c.positions()).collect();
            if find_phrases(&windows, &mut self.starts) {
                return id;
            }
            id = self.inner.step();
        }
    }
}

impl Default for PhraseCursor<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor for PhraseCursor<'_> {
    fn kind(&self) -> CursorKind {
        CursorKind::Phrase
    }

    fn current(&self) -> DocId {
        self.inner.current()
    }

    fn advance(&mut self) -> DocId {
        let id = self.inner.advance();
        self.settle(id)
    }

    fn advance_to(&mut self, id: DocId) -> DocId {
        let current = self.inner.current();
        if current != 0 && id <= current {
            return current;
        }
        let id = self.inner.advance_to(id);
        self.settle(id)
    }

    fn positions(&self) -> &[u16] {
        &self.starts
    }
}
