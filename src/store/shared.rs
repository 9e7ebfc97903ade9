use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::PostingStore;
use crate::error::Result;
use crate::types::DocId;

/// A posting store shared between threads behind a reader-writer lock.
///
/// Cursors borrow the read guard, so a query holds the read lock for as long
/// as its cursors live. Writers wait for every outstanding query.
#[derive(Clone, Default)]
pub struct SharedPostingStore {
    inner: Arc<RwLock<PostingStore>>,
}

impl SharedPostingStore {
    pub fn new(store: PostingStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Shared access for lookups and cursors
    pub fn read(&self) -> RwLockReadGuard<'_, PostingStore> {
        self.inner.read()
    }

    /// Exclusive access for batches of mutations
    pub fn write(&self) -> RwLockWriteGuard<'_, PostingStore> {
        self.inner.write()
    }

    pub fn insert(&self, term: &str, id: DocId, payload: &[u8]) -> Result<()> {
        self.inner.write().insert(term, id, payload)
    }

    pub fn erase(&self, term: &str, id: DocId) -> bool {
        self.inner.write().erase(term, id)
    }

    /// Copy of the payload; the lock is released before returning
    pub fn find(&self, term: &str, id: DocId) -> Option<Vec<u8>> {
        self.inner.read().find(term, id).map(<[u8]>::to_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::collect_ids;
    use std::thread;

    #[test]
    fn test_concurrent_readers_and_writer() {
        let shared = SharedPostingStore::default();
        let writer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for id in 1..=200u32 {
                    shared.insert("t", id, &id.to_le_bytes()).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let store = shared.read();
                        if let Some(cursor) = store.term_cursor("t") {
                            let ids = collect_ids(cursor);
                            assert!(ids.windows(2).all(|w| w[0] < w[1]));
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(shared.find("t", 200), Some(200u32.to_le_bytes().to_vec()));
        assert_eq!(shared.read().term_stats("t").unwrap().ids, 200);
    }
}
