//! Size-classed allocator with one free list per class.
//!
//! Every block handed out by the posting store rounds up to one of
//! [`SIZE_CLASSES`] units. Released blocks go back to the free list of their
//! class and are reused by later allocations; nothing is returned to the
//! system until the pool itself is dropped.

/// Size classes in allocation units, smallest first
pub const SIZE_CLASSES: [usize; 43] = [
    0, 1, 2, 3, 4, 5, 6, 7, 12, 24, 32, 48, 64, 96, 128, 196, 256, 512, 1024, 2048, 3072, 4096,
    12288, 16384, 24576, 32768, 49152, 65536, 98304, 131072, 196608, 262144, 524288, 786432,
    1048576, 1572864, 2097152, 3145728, 4194304, 6291456, 8388608, 12845056, 16777216,
];

/// Bytes per allocation unit for posting blocks (a packed group slot)
pub const BLOCK_UNIT: usize = 10;

/// Free-list pool of vectors bucketed by size class.
///
/// `unit` scales the class table: byte blocks use [`BLOCK_UNIT`], group
/// arrays count slots and use 1.
pub(crate) struct SizeClassPool<T> {
    unit: usize,
    free: Vec<Vec<Vec<T>>>,
    reused: u64,
}

impl<T> SizeClassPool<T> {
    pub fn new(unit: usize) -> Self {
        Self {
            unit,
            free: (0..SIZE_CLASSES.len()).map(|_| Vec::new()).collect(),
            reused: 0,
        }
    }

    /// Smallest class holding `len` elements, `None` past the largest class
    pub fn class_for(&self, len: usize) -> Option<u8> {
        let units = (len + self.unit - 1) / self.unit;
        let idx = SIZE_CLASSES.partition_point(|&c| c < units);
        if idx < SIZE_CLASSES.len() {
            Some(idx as u8)
        } else {
            None
        }
    }

    /// Element capacity of a class
    pub fn capacity(&self, class: u8) -> usize {
        SIZE_CLASSES[class as usize] * self.unit
    }

    /// Largest element count any class can hold
    pub fn max_len(&self) -> usize {
        SIZE_CLASSES[SIZE_CLASSES.len() - 1] * self.unit
    }

    /// Take an empty vector with room for the whole class
    pub fn alloc(&mut self, class: u8) -> Vec<T> {
        match self.free[class as usize].pop() {
            Some(v) => {
                self.reused += 1;
                v
            }
            None => Vec::with_capacity(self.capacity(class)),
        }
    }

    /// Return a vector to the free list of its class
    pub fn release(&mut self, class: u8, mut v: Vec<T>) {
        if class == 0 {
            return;
        }
        v.clear();
        self.free[class as usize].push(v);
    }

    /// Number of vectors parked on free lists
    pub fn free_count(&self) -> usize {
        self.free.iter().map(Vec::len).sum()
    }

    /// Allocations served from a free list instead of the system allocator
    pub fn reused(&self) -> u64 {
        self.reused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_rounding() {
        let pool: SizeClassPool<u8> = SizeClassPool::new(BLOCK_UNIT);
        assert_eq!(pool.class_for(0), Some(0));
        assert_eq!(pool.class_for(1), Some(1));
        assert_eq!(pool.class_for(10), Some(1));
        assert_eq!(pool.class_for(11), Some(2));
        assert_eq!(pool.class_for(71), Some(8));
        assert_eq!(pool.capacity(8), 120);
        assert_eq!(pool.class_for(pool.max_len()), Some(42));
        assert_eq!(pool.class_for(pool.max_len() + 1), None);
    }

    #[test]
    fn test_free_list_reuse() {
        let mut pool: SizeClassPool<u8> = SizeClassPool::new(BLOCK_UNIT);
        let class = pool.class_for(30).unwrap();
        let mut block = pool.alloc(class);
        block.extend_from_slice(&[1, 2, 3]);
        assert!(block.capacity() >= 30);

        pool.release(class, block);
        assert_eq!(pool.free_count(), 1);

        let block = pool.alloc(class);
        assert!(block.is_empty());
        assert_eq!(pool.reused(), 1);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_slot_pool() {
        let pool: SizeClassPool<u64> = SizeClassPool::new(1);
        assert_eq!(pool.class_for(8), Some(8));
        assert_eq!(pool.capacity(8), 12);
    }
}
