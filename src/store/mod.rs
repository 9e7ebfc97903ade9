//! Mutable in-memory posting store.
//!
//! Maps term text to a sorted set of ids, each with a byte payload. Postings
//! are blocked per id group (see [`crate::types`]); every block comes from a
//! size-classed allocator private to the store.
//!
//! The store is not internally synchronized. Cursors borrow it immutably and
//! mutation needs `&mut`, so the borrow checker enforces single-writer access
//! within a thread. Use [`SharedPostingStore`] to share one store between
//! threads.

mod allocator;
mod codec;
mod cursor;
mod group;
mod shared;

pub use allocator::{BLOCK_UNIT, SIZE_CLASSES};
pub use codec::INLINE_CAPACITY;
pub use cursor::TermCursor;
pub use shared::SharedPostingStore;

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::cursor::{wildcard, BoxCursor, EmptyCursor};
use crate::error::Result;
use crate::query::CursorSource;
use crate::types::{encode_positions, group_of, sub_id_of, validate_id, DocId};
use group::{Pools, TermEntry};

/// Per-term accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermStats {
    /// Ids currently stored
    pub ids: usize,
    /// Id groups currently stored
    pub groups: usize,
    /// Encoded bytes across all groups
    pub bytes: usize,
    /// Largest encoded group seen
    pub max_bytes: usize,
}

/// Free-list occupancy of the store's allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorStats {
    pub free_blocks: usize,
    pub free_arrays: usize,
    pub reused: u64,
}

/// Term to posting map with pooled block storage
pub struct PostingStore {
    terms: BTreeMap<String, TermEntry>,
    pools: Pools,
}

impl PostingStore {
    pub fn new() -> Self {
        Self {
            terms: BTreeMap::new(),
            pools: Pools::new(),
        }
    }

    /// Store `payload` for `id` under `term`, replacing any previous payload.
    ///
    /// Term cursors read an even-length payload as little-endian u16
    /// positions, which phrase and filter cursors match on. Use
    /// [`insert_positions`](Self::insert_positions) for positional terms;
    /// odd-length payloads expose no positions.
    pub fn insert(&mut self, term: &str, id: DocId, payload: &[u8]) -> Result<()> {
        validate_id(id)?;
        self.pools.check_entry(term, payload.len())?;
        if !self.terms.contains_key(term) {
            self.terms.insert(term.to_string(), TermEntry::default());
        }
        let Some(entry) = self.terms.get_mut(term) else {
            return Ok(());
        };
        entry.insert(&mut self.pools, term, group_of(id), sub_id_of(id), payload)
    }

    /// Store a sorted position list for `id` under `term`
    pub fn insert_positions(&mut self, term: &str, id: DocId, positions: &[u16]) -> Result<()> {
        self.insert(term, id, &encode_positions(positions))
    }

    /// Remove `id` from `term`. The term entry itself stays even when it
    /// becomes empty. Returns whether anything was removed.
    pub fn erase(&mut self, term: &str, id: DocId) -> bool {
        if validate_id(id).is_err() {
            return false;
        }
        match self.terms.get_mut(term) {
            Some(entry) => entry.erase(&mut self.pools, group_of(id), sub_id_of(id)),
            None => false,
        }
    }

    /// Payload stored for `id` under `term`
    pub fn find(&self, term: &str, id: DocId) -> Option<&[u8]> {
        if validate_id(id).is_err() {
            return None;
        }
        self.terms.get(term)?.find(group_of(id), sub_id_of(id))
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Number of term entries, including emptied ones
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Bytes held by blocks and group arrays at their size-class capacity
    pub fn total_bytes(&self) -> usize {
        self.pools.total_bytes
    }

    pub fn term_stats(&self, term: &str) -> Option<TermStats> {
        self.terms.get(term).map(|entry| TermStats {
            ids: entry.ids,
            groups: entry.groups.len(),
            bytes: entry.bytes,
            max_bytes: entry.max_bytes,
        })
    }

    pub fn allocator_stats(&self) -> AllocatorStats {
        AllocatorStats {
            free_blocks: self.pools.blocks.free_count(),
            free_arrays: self.pools.arrays.free_count(),
            reused: self.pools.blocks.reused() + self.pools.arrays.reused(),
        }
    }

    /// Cursor over one term's postings, `None` for an unknown term
    pub fn term_cursor(&self, term: &str) -> Option<TermCursor<'_>> {
        self.terms
            .get(term)
            .map(|entry| TermCursor::new(&entry.groups))
    }

    /// Terms starting with `prefix`, in order
    pub fn terms_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.terms
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(term, _)| term.as_str())
            .take_while(move |term| term.starts_with(prefix))
    }

    /// Union over every term starting with `prefix`
    pub fn prefix_cursor(&self, prefix: &str) -> BoxCursor<'_> {
        let cursors = self
            .terms
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(term, _)| term.starts_with(prefix))
            .map(|(_, entry)| Box::new(TermCursor::new(&entry.groups)) as BoxCursor<'_>)
            .collect();
        wildcard(cursors)
    }

    /// Drop every term, keeping released blocks on the free lists
    pub fn clear(&mut self) {
        for entry in self.terms.values_mut() {
            entry.release_all(&mut self.pools);
        }
        self.terms.clear();
    }
}

impl Default for PostingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorSource for PostingStore {
    fn term_cursor(&self, term: &str) -> BoxCursor<'_> {
        match PostingStore::term_cursor(self, term) {
            Some(cursor) => Box::new(cursor),
            None => Box::new(EmptyCursor),
        }
    }

    fn prefix_cursor(&self, prefix: &str) -> BoxCursor<'_> {
        PostingStore::prefix_cursor(self, prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{collect_ids, Cursor, CursorKind};
    use crate::error::QuarryError;

    #[test]
    fn test_insert_find_erase() {
        let mut store = PostingStore::new();
        store.insert("cat", 5, b"meow").unwrap();
        store.insert("dog", 5, b"woof").unwrap();
        assert_eq!(store.find("cat", 5), Some(&b"meow"[..]));
        assert_eq!(store.find("dog", 5), Some(&b"woof"[..]));
        assert_eq!(store.find("cat", 6), None);
        assert_eq!(store.find("bird", 5), None);

        store.insert("cat", 5, b"purr purr").unwrap();
        assert_eq!(store.find("cat", 5), Some(&b"purr purr"[..]));

        assert!(store.erase("cat", 5));
        assert!(!store.erase("cat", 5));
        assert_eq!(store.find("cat", 5), None);
        assert!(store.contains_term("cat"));
        assert_eq!(store.term_stats("cat").unwrap().ids, 0);
    }

    #[test]
    fn test_rejects_bad_ids() {
        let mut store = PostingStore::new();
        assert!(matches!(
            store.insert("t", 0, b""),
            Err(QuarryError::InvalidId(0))
        ));
        assert!(store.insert("t", crate::types::MAX_ID + 1, b"").is_err());
        assert!(!store.contains_term("t"));
        assert!(!store.erase("t", 0));
        assert_eq!(store.find("t", 0), None);
    }

    #[test]
    fn test_many_ids_in_one_group() {
        let mut store = PostingStore::new();
        for id in (1..=600u32).rev() {
            store.insert("t", id, &id.to_le_bytes()[..(id % 9) as usize % 5]).unwrap();
        }
        for id in 1..=600u32 {
            let bytes = id.to_le_bytes();
            let expected = &bytes[..(id % 9) as usize % 5];
            assert_eq!(store.find("t", id), Some(expected), "id {}", id);
        }
        let stats = store.term_stats("t").unwrap();
        assert_eq!(stats.ids, 600);
        assert_eq!(stats.groups, 1);
        for id in (1..=600u32).step_by(2) {
            assert!(store.erase("t", id));
        }
        let ids = collect_ids(PostingStore::term_cursor(&store, "t").unwrap());
        assert_eq!(ids, (2..=600).step_by(2).collect::<Vec<_>>());
    }

    #[test]
    fn test_byte_accounting_is_per_store() {
        let mut a = PostingStore::new();
        let b = PostingStore::new();
        a.insert("t", 1, &[0u8; 40]).unwrap();
        assert!(a.total_bytes() > 0);
        assert_eq!(b.total_bytes(), 0);

        assert!(a.erase("t", 1));
        assert_eq!(a.total_bytes(), 0);
        assert_eq!(a.allocator_stats().free_blocks, 1);

        a.insert("u", 2, &[1u8; 40]).unwrap();
        assert_eq!(a.allocator_stats().reused, 2);
    }

    #[test]
    fn test_prefix_terms() {
        let mut store = PostingStore::new();
        for (term, id) in [("cat", 1), ("catalog", 2), ("dog", 3), ("ca", 4)] {
            store.insert(term, id, b"").unwrap();
        }
        let terms: Vec<&str> = store.terms_with_prefix("cat").collect();
        assert_eq!(terms, vec!["cat", "catalog"]);
        assert_eq!(collect_ids(store.prefix_cursor("cat")), vec![1, 2]);
        assert_eq!(store.prefix_cursor("d").kind(), CursorKind::Term);
        assert_eq!(store.prefix_cursor("x").kind(), CursorKind::Empty);
    }

    #[test]
    fn test_clear_recycles_blocks() {
        let mut store = PostingStore::new();
        store.insert("t", 1, &[7u8; 20]).unwrap();
        store.insert("t", 2, &[7u8; 20]).unwrap();
        store.clear();
        assert_eq!(store.term_count(), 0);
        assert_eq!(store.total_bytes(), 0);
        assert!(store.allocator_stats().free_blocks >= 1);
    }
}
