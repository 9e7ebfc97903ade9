use super::{BoxCursor, Cursor, CursorKind};
use crate::types::DocId;

/// A test applied to the position window of the current id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionPredicate {
    /// Some position is at or after the bound
    MinPosition(u16),
    /// Some position is at or before the bound
    MaxPosition(u16),
    /// The exact position occurs
    Position(u16),
    /// Some position lies in the inclusive range
    PositionRange(u16, u16),
    /// At least this many positions
    MinFrequency(usize),
    /// At most this many positions
    MaxFrequency(usize),
    /// Exactly this many positions
    Frequency(usize),
    /// Position count within the inclusive range
    FrequencyRange(usize, usize),
}

impl PositionPredicate {
    pub fn matches(&self, window: &[u16]) -> bool {
        match *self {
            PositionPredicate::MinPosition(min) => window.last().is_some_and(|&p| p >= min),
            PositionPredicate::MaxPosition(max) => window.first().is_some_and(|&p| p <= max),
            PositionPredicate::Position(pos) => window.binary_search(&pos).is_ok(),
            PositionPredicate::PositionRange(lo, hi) => {
                let start = window.partition_point(|&p| p < lo);
                window.get(start).is_some_and(|&p| p <= hi)
            }
            PositionPredicate::MinFrequency(n) => window.len() >= n,
            PositionPredicate::MaxFrequency(n) => window.len() <= n,
            PositionPredicate::Frequency(n) => window.len() == n,
            PositionPredicate::FrequencyRange(lo, hi) => (lo..=hi).contains(&window.len()),
        }
    }
}

/// Ids of the inner cursor whose window satisfies every predicate
pub struct FilterCursor<'a> {
    inner: BoxCursor<'a>,
    predicates: Vec<PositionPredicate>,
    current: DocId,
    done: bool,
}

impl<'a> FilterCursor<'a> {
    pub fn new(inner: BoxCursor<'a>) -> Self {
        Self {
            inner,
            predicates: Vec::new(),
            current: 0,
            done: false,
        }
    }

    pub fn with(mut self, predicate: PositionPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Add a predicate; only meaningful before the first move
    pub fn push(&mut self, predicate: PositionPredicate) {
        self.predicates.push(predicate);
    }

    fn accept(&mut self, mut id: DocId) -> DocId {
        loop {
            if id == 0 {
                self.done = true;
                self.current = 0;
                return 0;
            }
            let window = self.inner.positions();
            if self.predicates.iter().all(|p| p.matches(window)) {
                self.current = id;
                return id;
            }
            id = self.inner.advance();
        }
    }
}

impl Cursor for FilterCursor<'_> {
    fn kind(&self) -> CursorKind {
        CursorKind::Filter
    }

    fn current(&self) -> DocId {
        self.current
    }

    fn advance(&mut self) -> DocId {
        if self.done {
            return 0;
        }
        let id = self.inner.advance();
        self.accept(id)
    }

    fn advance_to(&mut self, id: DocId) -> DocId {
        if self.done {
            return 0;
        }
        if self.current != 0 && id <= self.current {
            return self.current;
        }
        let id = self.inner.advance_to(id);
        self.accept(id)
    }

    fn positions(&self) -> &[u16] {
        self.inner.positions()
    }
}

/// Wrap a position-bearing cursor in a filter; other cursors come back unchanged
pub fn filter<'a>(cursor: BoxCursor<'a>, predicate: PositionPredicate) -> BoxCursor<'a> {
    if !cursor.kind().has_positions() {
        return cursor;
    }
    Box::new(FilterCursor::new(cursor).with(predicate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::testing::VecCursor;
    use crate::cursor::{collect_ids, RangeCursor};

    fn sample<'a>() -> BoxCursor<'a> {
        Box::new(VecCursor::with_positions(vec![
            (1, vec![2]),
            (2, vec![5, 9, 14]),
            (3, vec![]),
            (4, vec![1, 20]),
        ]))
    }

    #[test]
    fn test_predicates() {
        let window = [3, 8, 12];
        assert!(PositionPredicate::MinPosition(12).matches(&window));
        assert!(!PositionPredicate::MinPosition(13).matches(&window));
        assert!(PositionPredicate::MaxPosition(3).matches(&window));
        assert!(!PositionPredicate::MaxPosition(2).matches(&window));
        assert!(PositionPredicate::Position(8).matches(&window));
        assert!(!PositionPredicate::Position(9).matches(&window));
        assert!(PositionPredicate::PositionRange(9, 12).matches(&window));
        assert!(!PositionPredicate::PositionRange(9, 11).matches(&window));
        assert!(PositionPredicate::Frequency(3).matches(&window));
        assert!(PositionPredicate::FrequencyRange(1, 3).matches(&window));
        assert!(!PositionPredicate::MaxFrequency(2).matches(&window));
        assert!(!PositionPredicate::MinPosition(0).matches(&[]));
    }

    #[test]
    fn test_filter_cursor() {
        let c = filter(sample(), PositionPredicate::MinPosition(10));
        assert_eq!(c.kind(), CursorKind::Filter);
        assert_eq!(collect_ids(c), vec![2, 4]);

        let c = FilterCursor::new(sample())
            .with(PositionPredicate::MinFrequency(2))
            .with(PositionPredicate::MaxPosition(4));
        assert_eq!(collect_ids(c), vec![4]);
    }

    #[test]
    fn test_filter_advance_to() {
        let mut c = FilterCursor::new(sample()).with(PositionPredicate::MinFrequency(1));
        assert_eq!(c.advance_to(3), 4);
        assert_eq!(c.positions(), &[1, 20]);
        assert_eq!(c.advance(), 0);
    }

    #[test]
    fn test_filter_skips_non_positional() {
        let c = filter(Box::new(RangeCursor::new(1, 4)), PositionPredicate::Frequency(9));
        assert_eq!(c.kind(), CursorKind::Range);
        assert_eq!(collect_ids(c), vec![1, 2, 3]);
    }
}
