use super::codec::decode_entry;
use super::group::GroupBlock;
use crate::cursor::{Cursor, CursorKind};
use crate::types::{compose_id, decode_positions, group_of, DocId};

/// Walks the group blocks of one term in ascending id order.
///
/// The position window is the current payload read as little-endian u16
/// values, empty when the payload length is odd.
pub struct TermCursor<'a> {
    groups: &'a [GroupBlock],
    group_idx: usize,
    offset: usize,
    payload: &'a [u8],
    window: Vec<u16>,
    current: DocId,
    done: bool,
}

impl<'a> TermCursor<'a> {
    pub(crate) fn new(groups: &'a [GroupBlock]) -> Self {
        Self {
            groups,
            group_idx: 0,
            offset: 0,
            payload: &[],
            window: Vec::new(),
            current: 0,
            done: false,
        }
    }

    /// Payload stored for the current id
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    fn exhaust(&mut self) -> DocId {
        self.done = true;
        self.current = 0;
        self.payload = &[];
        self.window.clear();
        0
    }

    fn land(&mut self, group: u16, sub_id: u16, payload: &'a [u8]) -> DocId {
        self.current = compose_id(group, sub_id);
        self.payload = payload;
        decode_positions(payload, &mut self.window);
        self.current
    }

    fn next_group(&mut self) {
        self.group_idx += 1;
        self.offset = 0;
    }
}

impl Cursor for TermCursor<'_> {
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
        loop {
            let Some(block) = self.groups.get(self.group_idx) else {
                return self.exhaust();
            };
            match block {
                GroupBlock::Inline {
                    group,
                    sub_id,
                    len,
                    data,
                } => {
                    if self.offset == 0 {
                        self.offset = 1;
                        return self.land(*group, *sub_id, &data[..*len as usize]);
                    }
                }
                GroupBlock::External { group, bytes, .. } => {
                    if let Some(entry) = decode_entry(bytes, self.offset) {
                        self.offset = entry.next;
                        return self.land(*group, entry.sub_id, entry.payload);
                    }
                }
            }
            self.next_group();
        }
    }

    fn advance_to(&mut self, id: DocId) -> DocId {
        if self.done {
            return 0;
        }
        if self.current != 0 && id <= self.current {
            return self.current;
        }
        let target = group_of(id);
        let rest = &self.groups[self.group_idx.min(self.groups.len())..];
        let skip = rest.partition_point(|g| g.group() < target);
        if skip > 0 {
            self.group_idx += skip;
            self.offset = 0;
        }
        loop {
            let next = self.advance();
            if next == 0 || next >= id {
                return next;
            }
        }
    }

    fn positions(&self) -> &[u16] {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use crate::cursor::{collect_ids, Cursor};
    use crate::store::PostingStore;
    use crate::types::encode_positions;

    #[test]
    fn test_walks_groups_in_order() {
        let mut store = PostingStore::new();
        let ids = [0x3005, 1, 0x1000, 7, 0x3001, 4096 * 9 + 12];
        for id in ids {
            store.insert("t", id, &id.to_le_bytes()).unwrap();
        }
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        assert_eq!(collect_ids(store.term_cursor("t").unwrap()), sorted);
    }

    #[test]
    fn test_advance_to_across_groups() {
        let mut store = PostingStore::new();
        for id in [3, 9, 0x2001, 0x2002, 0x5000] {
            store.insert("t", id, b"").unwrap();
        }
        let mut c = store.term_cursor("t").unwrap();
        assert_eq!(c.advance_to(4), 9);
        assert_eq!(c.advance_to(0x1000), 0x2001);
        assert_eq!(c.advance_to(0x2002), 0x2002);
        assert_eq!(c.advance_to(0x2003), 0x5000);
        assert_eq!(c.advance_to(0x5001), 0);
        assert_eq!(c.advance(), 0);
    }

    #[test]
    fn test_payload_and_window() {
        let mut store = PostingStore::new();
        store.insert("t", 5, b"meow").unwrap();
        store.insert("t", 6, &encode_positions(&[4, 2, 30])).unwrap();

        let mut c = store.term_cursor("t").unwrap();
        assert_eq!(c.advance(), 5);
        assert_eq!(c.payload(), b"meow");
        assert_eq!(c.advance(), 6);
        assert_eq!(c.positions(), &[2, 4, 30]);
    }

    #[test]
    fn test_odd_payload_has_no_window() {
        let mut store = PostingStore::new();
        store.insert("t", 5, b"purr").unwrap();
        store.insert("t", 6, b"hiss!").unwrap();

        let mut c = store.term_cursor("t").unwrap();
        assert_eq!(c.advance(), 5);
        assert_eq!(c.positions().len(), 2);
        assert_eq!(c.advance(), 6);
        assert_eq!(c.payload(), b"hiss!");
        assert!(c.positions().is_empty());
    }
}
