use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{BoxCursor, Cursor, CursorKind};
use crate::types::DocId;

/// Union of sub-cursors.
///
/// Sub-cursors that are not positioned on the current id wait in a min-heap
/// keyed on their current id. The ones tied on the current id form the
/// active set and are the only ones advanced on the next move.
///
/// The positional variants also merge the position windows of the active
/// set into one sorted, duplicate-free window.
pub struct OrCursor<'a> {
    kind: CursorKind,
    subs: Vec<BoxCursor<'a>>,
    heap: BinaryHeap<Reverse<(DocId, usize)>>,
    active: Vec<usize>,
    window: Vec<u16>,
    current: DocId,
    started: bool,
    done: bool,
}

impl<'a> OrCursor<'a> {
    fn with_kind(kind: CursorKind, subs: Vec<BoxCursor<'a>>) -> Self {
        Self {
            kind,
            heap: BinaryHeap::with_capacity(subs.len()),
            active: Vec::with_capacity(subs.len()),
            subs,
            window: Vec::new(),
            current: 0,
            started: false,
            done: false,
        }
    }

    /// Plain union without position windows
    pub fn new() -> Self {
        Self::with_kind(CursorKind::Or, Vec::new())
    }

    pub fn from_cursors(subs: Vec<BoxCursor<'a>>) -> Self {
        Self::with_kind(CursorKind::Or, subs)
    }

    /// Union that merges the position windows of tied sub-cursors
    pub fn with_positions(subs: Vec<BoxCursor<'a>>) -> Self {
        Self::with_kind(CursorKind::PositionalOr, subs)
    }

    /// Positional union over the terms matched by a prefix
    pub fn wildcard(subs: Vec<BoxCursor<'a>>) -> Self {
        Self::with_kind(CursorKind::WildcardOr, subs)
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

    fn positional(&self) -> bool {
        self.kind != CursorKind::Or
    }

    fn push(&mut self, idx: usize, id: DocId) {
        if id != 0 {
            self.heap.push(Reverse((id, idx)));
        }
    }

    /// Pop the minimum id and every sub-cursor tied with it
    fn pop_min(&mut self) -> DocId {
        self.active.clear();
        let Some(Reverse((id, idx))) = self.heap.pop() else {
            self.done = true;
            self.current = 0;
            self.window.clear();
            return 0;
        };
        self.active.push(idx);
        while let Some(&Reverse((next, idx))) = self.heap.peek() {
            if next != id {
                break;
            }
            self.heap.pop();
            self.active.push(idx);
        }
        self.current = id;
        if self.positional() {
            self.merge_windows();
        }
        id
    }

    fn merge_windows(&mut self) {
        self.window.clear();
        match self.active.as_slice() {
            [only] => self.window.extend_from_slice(self.subs[*only].positions()),
            [a, b] => merge_two(
                self.subs[*a].positions(),
                self.subs[*b].positions(),
                &mut self.window,
            ),
            many => {
                for &idx in many {
                    self.window.extend_from_slice(self.subs[idx].positions());
                }
                self.window.sort_unstable();
                self.window.dedup();
            }
        }
    }
}

/// Two-pointer merge of sorted windows, dropping duplicates
fn merge_two(a: &[u16], b: &[u16], out: &mut Vec<u16>) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            out.push(a[i]);
            i += 1;
        } else if b[j] < a[i] {
            out.push(b[j]);
            j += 1;
        } else {
            out.push(a[i]);
            i += 1;
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
}

impl Default for OrCursor<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor for OrCursor<'_> {
    fn kind(&self) -> CursorKind {
        self.kind
    }

    fn current(&self) -> DocId {
        self.current
    }

    fn advance(&mut self) -> DocId {
        if self.done {
            return 0;
        }
        if !self.started {
            self.started = true;
            for idx in 0..self.subs.len() {
                let id = self.subs[idx].advance();
                self.push(idx, id);
            }
        } else {
            let active = std::mem::take(&mut self.active);
            for &idx in &active {
                let id = self.subs[idx].advance();
                self.push(idx, id);
            }
            self.active = active;
        }
        self.pop_min()
    }

    fn advance_to(&mut self, target: DocId) -> DocId {
        if self.done {
            return 0;
        }
        if self.current != 0 && target <= self.current {
            return self.current;
        }
        if !self.started {
            self.started = true;
            for idx in 0..self.subs.len() {
                let id = self.subs[idx].advance_to(target);
                self.push(idx, id);
            }
        } else {
            let active = std::mem::take(&mut self.active);
            for &idx in &active {
                let id = self.subs[idx].advance_to(target);
                self.push(idx, id);
            }
            self.active = active;
            while let Some(&Reverse((id, idx))) = self.heap.peek() {
                if id >= target {
                    break;
                }
                self.heap.pop();
                let id = self.subs[idx].advance_to(target);
                self.push(idx, id);
            }
        }
        self.pop_min()
    }

    fn positions(&self) -> &[u16] {
        &self.window
    }
}
