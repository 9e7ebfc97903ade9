use tracing::warn;

use super::format::{decode_entry, decode_group, decode_list};
use crate::cursor::{Cursor, CursorKind};
use crate::types::{group_of, DocId};

/// Cursor over one term of a loaded [`Image`](super::Image), decoding groups
/// straight from the mapped bytes.
///
/// Data that fails to decode exhausts the cursor with a warning.
pub struct ImageTermCursor<'a> {
    term: &'a str,
    data: &'a [u8],
    next_group: usize,
    group_base: DocId,
    entry_at: usize,
    group_end: usize,
    current: DocId,
    value: i32,
    positions: Vec<u16>,
    values: Vec<i32>,
    done: bool,
}

impl<'a> ImageTermCursor<'a> {
    pub(crate) fn new(term: &'a str, data: &'a [u8], max_term_size: u32) -> Self {
        let capacity = max_term_size as usize;
        Self {
            term,
            data,
            next_group: 0,
            group_base: 0,
            entry_at: 0,
            group_end: 0,
            current: 0,
            value: 0,
            positions: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            done: false,
        }
    }

    /// Value of the current entry; 0 for entries stored as position lists
    pub fn value(&self) -> i32 {
        self.value
    }

    /// Per-position values, parallel to [`Cursor::positions`]
    pub fn values(&self) -> &[i32] {
        &self.values
    }

    fn exhaust(&mut self) -> DocId {
        self.done = true;
        self.current = 0;
        self.value = 0;
        self.positions.clear();
        self.values.clear();
        0
    }

    fn corrupt(&mut self, at: usize) -> DocId {
        warn!(term = self.term, offset = at, "corrupt term data, cursor exhausted");
        self.exhaust()
    }

    fn open_group(&mut self) -> bool {
        match decode_group(self.data, self.next_group) {
            Some(header) => {
                self.group_base = (header.group as DocId) << 12;
                self.entry_at = header.start;
                self.group_end = header.end;
                self.next_group = header.end;
                true
            }
            None => false,
        }
    }
}

impl Cursor for ImageTermCursor<'_> {
    fn kind(&self) -> CursorKind {
        CursorKind::Term
    }

    fn current(&self) -> DocId {
        self.current
    }

    fn advance(&mut self) -> DocId {
        if self.done {
            return 0;
        }
        while self.entry_at >= self.group_end {
            if self.next_group >= self.data.len() {
                return self.exhaust();
            }
            if !self.open_group() {
                return self.corrupt(self.next_group);
            }
        }

        let at = self.entry_at;
        let Some(entry) = decode_entry(self.data, at, self.group_end) else {
            return self.corrupt(at);
        };
        let id = self.group_base | entry.sub_id as DocId;
        if id <= self.current {
            return self.corrupt(at);
        }
        if entry.list.is_empty() {
            self.positions.clear();
            self.values.clear();
        } else if !decode_list(entry.list, &mut self.positions, &mut self.values) {
            return self.corrupt(at);
        }
        self.entry_at = entry.next;
        self.value = entry.value;
        self.current = id;
        id
    }

    fn advance_to(&mut self, id: DocId) -> DocId {
        if self.done {
            return 0;
        }
        if self.current != 0 && id <= self.current {
            return self.current;
        }

        // skip whole groups below the target without decoding their entries
        let target = group_of(id) as DocId;
        if self.entry_at >= self.group_end || (self.group_base >> 12) < target {
            self.entry_at = self.group_end;
            while self.next_group < self.data.len() {
                let Some(header) = decode_group(self.data, self.next_group) else {
                    return self.corrupt(self.next_group);
                };
                if header.group as DocId >= target {
                    break;
                }
                self.next_group = header.end;
            }
        }

        loop {
            let next = self.advance();
            if next == 0 || next >= id {
                return next;
            }
        }
    }

    fn positions(&self) -> &[u16] {
        &self.positions
    }
}
