//! Group blocks and the per-term group array.

use std::mem;

use super::allocator::{SizeClassPool, BLOCK_UNIT};
use super::codec::{decode_entry, encode_entry, encoded_len, entries, INLINE_CAPACITY};
use crate::error::{QuarryError, Result};

/// Postings of one term for one id group.
///
/// A group holding a single entry whose payload fits in
/// [`INLINE_CAPACITY`] bytes lives directly in the group array. Anything
/// larger owns a pooled block of encoded entries in ascending sub-id order.
#[derive(Debug)]
pub(crate) enum GroupBlock {
    Inline {
        group: u16,
        sub_id: u16,
        len: u8,
        data: [u8; INLINE_CAPACITY],
    },
    External {
        group: u16,
        class: u8,
        bytes: Vec<u8>,
    },
}

impl GroupBlock {
    pub fn group(&self) -> u16 {
        match self {
            GroupBlock::Inline { group, .. } | GroupBlock::External { group, .. } => *group,
        }
    }

    fn inline(group: u16, sub_id: u16, payload: &[u8]) -> Self {
        let mut data = [0u8; INLINE_CAPACITY];
        data[..payload.len()].copy_from_slice(payload);
        GroupBlock::Inline {
            group,
            sub_id,
            len: payload.len() as u8,
            data,
        }
    }

    /// Bytes the group's entries occupy when encoded
    pub fn encoded_len(&self) -> usize {
        match self {
            GroupBlock::Inline { len, .. } => encoded_len(*len as usize),
            GroupBlock::External { bytes, .. } => bytes.len(),
        }
    }

    pub fn find(&self, sub_id: u16) -> Option<&[u8]> {
        match self {
            GroupBlock::Inline {
                sub_id: s,
                len,
                data,
                ..
            } => (*s == sub_id).then(|| &data[..*len as usize]),
            GroupBlock::External { bytes, .. } => entries(bytes)
                .map(|(_, e)| e)
                .take_while(|e| e.sub_id <= sub_id)
                .find(|e| e.sub_id == sub_id)
                .map(|e| e.payload),
        }
    }
}

/// Allocator state shared by every term of a store
pub(crate) struct Pools {
    pub blocks: SizeClassPool<u8>,
    pub arrays: SizeClassPool<GroupBlock>,
    pub total_bytes: usize,
}

impl Pools {
    pub fn new() -> Self {
        Self {
            blocks: SizeClassPool::new(BLOCK_UNIT),
            arrays: SizeClassPool::new(1),
            total_bytes: 0,
        }
    }

    fn block_class(&self, term: &str, bytes: usize) -> Result<u8> {
        self.blocks
            .class_for(bytes)
            .ok_or_else(|| QuarryError::PostingTooLarge {
                term: term.to_string(),
                bytes,
            })
    }

    fn alloc_block(&mut self, class: u8) -> Vec<u8> {
        self.total_bytes += self.blocks.capacity(class);
        self.blocks.alloc(class)
    }

    fn release_block(&mut self, class: u8, bytes: Vec<u8>) {
        self.total_bytes -= self.blocks.capacity(class);
        self.blocks.release(class, bytes);
    }

    /// Fail before any mutation when a single entry can never fit
    pub fn check_entry(&self, term: &str, payload_len: usize) -> Result<()> {
        self.block_class(term, encoded_len(payload_len)).map(|_| ())
    }

    fn new_group(&mut self, term: &str, group: u16, sub_id: u16, payload: &[u8]) -> Result<GroupBlock> {
        if payload.len() <= INLINE_CAPACITY {
            return Ok(GroupBlock::inline(group, sub_id, payload));
        }
        let class = self.block_class(term, encoded_len(payload.len()))?;
        let mut bytes = self.alloc_block(class);
        encode_entry(sub_id, payload, &mut bytes);
        Ok(GroupBlock::External {
            group,
            class,
            bytes,
        })
    }

    /// Merge one entry into an existing group. Returns true when the sub-id was new.
    fn merge(&mut self, term: &str, block: &mut GroupBlock, sub_id: u16, payload: &[u8]) -> Result<bool> {
        match block {
            GroupBlock::Inline {
                group,
                sub_id: existing,
                len,
                data,
            } => {
                let (group, existing) = (*group, *existing);
                if existing == sub_id {
                    *block = self.new_group(term, group, sub_id, payload)?;
                    return Ok(false);
                }
                let old = &data[..*len as usize];
                let total = encoded_len(old.len()) + encoded_len(payload.len());
                let class = self.block_class(term, total)?;
                let mut bytes = self.alloc_block(class);
                if existing < sub_id {
                    encode_entry(existing, old, &mut bytes);
                    encode_entry(sub_id, payload, &mut bytes);
                } else {
                    encode_entry(sub_id, payload, &mut bytes);
                    encode_entry(existing, old, &mut bytes);
                }
                *block = GroupBlock::External {
                    group,
                    class,
                    bytes,
                };
                Ok(true)
            }
            GroupBlock::External { class, bytes, .. } => {
                let mut start = bytes.len();
                let mut end = start;
                for (at, entry) in entries(bytes) {
                    if entry.sub_id >= sub_id {
                        start = at;
                        end = if entry.sub_id == sub_id { entry.next } else { at };
                        break;
                    }
                }
                let replaced = end > start;
                let new_len = bytes.len() - (end - start) + encoded_len(payload.len());
                let new_class = self.block_class(term, new_len)?;

                let mut entry = Vec::with_capacity(encoded_len(payload.len()));
                encode_entry(sub_id, payload, &mut entry);

                if new_class == *class {
                    bytes.splice(start..end, entry);
                } else {
                    let mut fresh = self.alloc_block(new_class);
                    fresh.extend_from_slice(&bytes[..start]);
                    fresh.extend_from_slice(&entry);
                    fresh.extend_from_slice(&bytes[end..]);
                    let old = mem::replace(bytes, fresh);
                    self.release_block(*class, old);
                    *class = new_class;
                }
                Ok(!replaced)
            }
        }
    }

    /// Remove one entry. Returns `None` when the sub-id was absent, otherwise
    /// whether the group is now empty.
    fn remove(&mut self, block: &mut GroupBlock, sub_id: u16) -> Option<bool> {
        match block {
            GroupBlock::Inline { sub_id: s, .. } => (*s == sub_id).then_some(true),
            GroupBlock::External {
                group,
                class,
                bytes,
            } => {
                let (start, end) = entries(bytes)
                    .take_while(|(_, e)| e.sub_id <= sub_id)
                    .find(|(_, e)| e.sub_id == sub_id)
                    .map(|(at, e)| (at, e.next))?;
                bytes.drain(start..end);

                if bytes.is_empty() {
                    return Some(true);
                }

                let single = decode_entry(bytes, 0)
                    .filter(|e| e.next == bytes.len() && e.payload.len() <= INLINE_CAPACITY)
                    .map(|e| GroupBlock::inline(*group, e.sub_id, e.payload));
                if let Some(inline) = single {
                    let old = mem::take(bytes);
                    self.release_block(*class, old);
                    *block = inline;
                    return Some(false);
                }

                if let Some(new_class) = self.blocks.class_for(bytes.len()) {
                    if new_class < *class {
                        let mut fresh = self.alloc_block(new_class);
                        fresh.extend_from_slice(bytes);
                        let old = mem::replace(bytes, fresh);
                        self.release_block(*class, old);
                        *class = new_class;
                    }
                }
                Some(false)
            }
        }
    }

    fn discard(&mut self, block: GroupBlock) {
        if let GroupBlock::External { class, bytes, .. } = block {
            self.release_block(class, bytes);
        }
    }
}

/// Postings of one term: a sorted array of group blocks
#[derive(Debug, Default)]
pub(crate) struct TermEntry {
    pub groups: Vec<GroupBlock>,
    array_class: u8,
    pub ids: usize,
    pub bytes: usize,
    pub max_bytes: usize,
}

impl TermEntry {
    pub fn find(&self, group: u16, sub_id: u16) -> Option<&[u8]> {
        let idx = self
            .groups
            .binary_search_by_key(&group, GroupBlock::group)
            .ok()?;
        self.groups[idx].find(sub_id)
    }

    pub fn insert(
        &mut self,
        pools: &mut Pools,
        term: &str,
        group: u16,
        sub_id: u16,
        payload: &[u8],
    ) -> Result<()> {
        let (idx, before, added) = match self.groups.binary_search_by_key(&group, GroupBlock::group) {
            Err(idx) => {
                let block = pools.new_group(term, group, sub_id, payload)?;
                self.insert_group(pools, idx, block);
                (idx, 0, true)
            }
            Ok(idx) => {
                let before = self.groups[idx].encoded_len();
                let added = pools.merge(term, &mut self.groups[idx], sub_id, payload)?;
                (idx, before, added)
            }
        };
        let after = self.groups[idx].encoded_len();
        self.bytes = self.bytes + after - before;
        self.max_bytes = self.max_bytes.max(after);
        if added {
            self.ids += 1;
        }
        Ok(())
    }

    pub fn erase(&mut self, pools: &mut Pools, group: u16, sub_id: u16) -> bool {
        let Ok(idx) = self.groups.binary_search_by_key(&group, GroupBlock::group) else {
            return false;
        };
        let before = self.groups[idx].encoded_len();
        let Some(emptied) = pools.remove(&mut self.groups[idx], sub_id) else {
            return false;
        };
        if emptied {
            self.remove_group(pools, idx);
            self.bytes -= before;
        } else {
            self.bytes = self.bytes + self.groups[idx].encoded_len() - before;
        }
        self.ids -= 1;
        true
    }

    fn insert_group(&mut self, pools: &mut Pools, idx: usize, block: GroupBlock) {
        let needed = self.groups.len() + 1;
        if needed > pools.arrays.capacity(self.array_class) {
            if let Some(class) = pools.arrays.class_for(needed) {
                self.migrate_array(pools, class);
            }
        }
        self.groups.insert(idx, block);
    }

    fn remove_group(&mut self, pools: &mut Pools, idx: usize) {
        let block = self.groups.remove(idx);
        pools.discard(block);
        if let Some(class) = pools.arrays.class_for(self.groups.len()) {
            if class < self.array_class {
                self.migrate_array(pools, class);
            }
        }
    }

    fn migrate_array(&mut self, pools: &mut Pools, class: u8) {
        let mut fresh = pools.arrays.alloc(class);
        fresh.extend(self.groups.drain(..));
        let old = mem::replace(&mut self.groups, fresh);
        pools.arrays.release(self.array_class, old);
        pools.total_bytes -= pools.arrays.capacity(self.array_class) * BLOCK_UNIT;
        pools.total_bytes += pools.arrays.capacity(class) * BLOCK_UNIT;
        self.array_class = class;
    }

    /// Hand every block back to the pools
    pub fn release_all(&mut self, pools: &mut Pools) {
        for block in self.groups.drain(..) {
            pools.discard(block);
        }
        let old = mem::take(&mut self.groups);
        pools.arrays.release(self.array_class, old);
        pools.total_bytes -= pools.arrays.capacity(self.array_class) * BLOCK_UNIT;
        self.array_class = 0;
        self.ids = 0;
        self.bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with(pools: &mut Pools, items: &[(u16, &[u8])]) -> TermEntry {
        let mut entry = TermEntry::default();
        for (sub_id, payload) in items {
            entry.insert(pools, "t", 0, *sub_id, payload).unwrap();
        }
        entry
    }

    #[test]
    fn test_inline_then_external() {
        let mut pools = Pools::new();
        let mut entry = entry_with(&mut pools, &[(3, b"abc")]);
        assert!(matches!(entry.groups[0], GroupBlock::Inline { .. }));
        assert_eq!(pools.total_bytes, pools.arrays.capacity(1) * BLOCK_UNIT);

        entry.insert(&mut pools, "t", 0, 1, b"x").unwrap();
        assert!(matches!(entry.groups[0], GroupBlock::External { .. }));
        assert_eq!(entry.find(0, 1), Some(&b"x"[..]));
        assert_eq!(entry.find(0, 3), Some(&b"abc"[..]));
        assert_eq!(entry.ids, 2);
        assert_eq!(entry.bytes, encoded_len(1) + encoded_len(3));
    }

    #[test]
    fn test_large_payload_is_external() {
        let mut pools = Pools::new();
        let entry = entry_with(&mut pools, &[(1, b"seven!!")]);
        assert!(matches!(entry.groups[0], GroupBlock::External { .. }));
        assert_eq!(entry.find(0, 1), Some(&b"seven!!"[..]));
    }

    #[test]
    fn test_overwrite_migrates_class() {
        let mut pools = Pools::new();
        let mut entry = entry_with(&mut pools, &[(1, b"a"), (2, b"b")]);
        let big = vec![9u8; 500];
        entry.insert(&mut pools, "t", 0, 1, &big).unwrap();
        assert_eq!(entry.ids, 2);
        assert_eq!(entry.find(0, 1), Some(&big[..]));
        assert_eq!(entry.find(0, 2), Some(&b"b"[..]));
        match &entry.groups[0] {
            GroupBlock::External { class, .. } => {
                assert_eq!(*class, pools.blocks.class_for(encoded_len(500) + 3).unwrap())
            }
            GroupBlock::Inline { .. } => panic!("expected external block"),
        }
    }

    #[test]
    fn test_erase_demotes_to_inline() {
        let mut pools = Pools::new();
        let mut entry = entry_with(&mut pools, &[(1, b"a"), (2, b"bb")]);
        assert!(entry.erase(&mut pools, 0, 1));
        assert!(matches!(
            entry.groups[0],
            GroupBlock::Inline { sub_id: 2, len: 2, .. }
        ));
        assert_eq!(pools.blocks.free_count(), 1);
        assert!(!entry.erase(&mut pools, 0, 1));
        assert!(entry.erase(&mut pools, 0, 2));
        assert!(entry.groups.is_empty());
        assert_eq!(entry.ids, 0);
        assert_eq!(entry.bytes, 0);
    }

    #[test]
    fn test_group_array_grows_through_classes() {
        let mut pools = Pools::new();
        let mut entry = TermEntry::default();
        for group in (0..40u16).rev() {
            entry.insert(&mut pools, "t", group, 1, b"").unwrap();
        }
        let order: Vec<u16> = entry.groups.iter().map(GroupBlock::group).collect();
        assert_eq!(order, (0..40).collect::<Vec<_>>());
        assert_eq!(entry.array_class, pools.arrays.class_for(40).unwrap());

        for group in 0..39u16 {
            assert!(entry.erase(&mut pools, group, 1));
        }
        assert_eq!(entry.array_class, 1);
        assert!(pools.arrays.free_count() > 0);
    }
}
