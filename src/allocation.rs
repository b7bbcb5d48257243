//! Per-family suffix allocation map with two-phase commit.
//!
//! A suffix index goes through up to three states:
//!
//! ```text
//!  free ── reserve() ──> reserved ── commit() ──> set
//!   ^                       │                      │
//!   └────── rollback() ─────┘                      │
//!   └─────────────────── release() ────────────────┘
//! ```
//!
//! Only committed indices are visible as set bits. A reserved index is not
//! handed out again, so a failure between `reserve()` and `commit()` cannot
//! leak a permanently used suffix, and cannot double-assign one either.
//!
//! # Usage
//!
//! ```rust,ignore
//! let reservation = map.reserve()?;
//! match create_node(reservation.index()) {
//!     Ok(()) => { map.commit(reservation); }
//!     Err(e) => { map.rollback(reservation); return Err(e); }
//! }
//! ```

use alloc::collections::BTreeSet;
use alloc::vec;
use alloc::vec::Vec;

use axerrno::{AxResult, ax_err};

/// Default number of suffix slots per family.
pub const DEFAULT_SUFFIX_CAPACITY: usize = 1024;

const WORD_BITS: usize = u64::BITS as usize;

/// A suffix index reserved but not yet committed.
///
/// Must be handed back through [`AllocationMap::commit`] or
/// [`AllocationMap::rollback`].
#[must_use = "a reservation must be committed or rolled back"]
#[derive(Debug, PartialEq, Eq)]
pub struct SuffixReservation {
    index: usize,
}

impl SuffixReservation {
    /// The reserved index.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Fixed-capacity bitmap of suffix indices in use.
pub struct AllocationMap {
    /// Committed bits, `WORD_BITS` per word.
    words: Vec<u64>,
    /// Number of usable slots.
    capacity: usize,
    /// Reserved, uncommitted indices.
    reserved: BTreeSet<usize>,
}

impl AllocationMap {
    /// Creates a map with `capacity` slots, all free.
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(WORD_BITS)],
            capacity,
            reserved: BTreeSet::new(),
        }
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns whether `index` is committed.
    #[inline]
    pub fn is_set(&self, index: usize) -> bool {
        index < self.capacity && self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    /// Returns whether `index` is reserved and not yet committed.
    #[inline]
    pub fn is_reserved(&self, index: usize) -> bool {
        self.reserved.contains(&index)
    }

    /// Number of committed slots.
    pub fn allocated_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Number of reserved, uncommitted slots.
    pub fn reserved_count(&self) -> usize {
        self.reserved.len()
    }

    /// Iterates committed indices in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity).filter(move |&index| self.is_set(index))
    }

    fn set(&mut self, index: usize, value: bool) {
        let mask = 1u64 << (index % WORD_BITS);
        let word = &mut self.words[index / WORD_BITS];
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Lowest index that is neither committed nor reserved.
    fn find_first_free(&self) -> Option<usize> {
        for (position, &word) in self.words.iter().enumerate() {
            if word == u64::MAX {
                continue;
            }
            let base = position * WORD_BITS;
            let mut candidates = !word;
            while candidates != 0 {
                let index = base + candidates.trailing_zeros() as usize;
                if index >= self.capacity {
                    return None;
                }
                if !self.reserved.contains(&index) {
                    return Some(index);
                }
                candidates &= candidates - 1;
            }
        }
        None
    }

    /// Reserves the lowest free index.
    ///
    /// # Errors
    ///
    /// `StorageFull` if every slot is committed or reserved.
    pub fn reserve(&mut self) -> AxResult<SuffixReservation> {
        let Some(index) = self.find_first_free() else {
            return ax_err!(StorageFull, "suffix allocation map exhausted");
        };
        self.reserved.insert(index);
        Ok(SuffixReservation { index })
    }

    /// Marks a reserved index as used and returns it.
    pub fn commit(&mut self, reservation: SuffixReservation) -> usize {
        let index = reservation.index;
        self.reserved.remove(&index);
        self.set(index, true);
        index
    }

    /// Returns a reserved index to the free pool.
    pub fn rollback(&mut self, reservation: SuffixReservation) {
        self.reserved.remove(&reservation.index);
    }

    /// Frees a committed index.
    ///
    /// Returns `false` if the index was not set.
    pub fn release(&mut self, index: usize) -> bool {
        if !self.is_set(index) {
            return false;
        }
        self.set(index, false);
        true
    }
}

impl core::fmt::Debug for AllocationMap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AllocationMap")
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocated_count())
            .field("reserved", &self.reserved.len())
            .finish()
    }
}

impl Default for AllocationMap {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIX_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axerrno::AxError;

    #[test]
    fn test_reserve_commit() {
        let mut map = AllocationMap::new(8);

        let r = map.reserve().unwrap();
        assert_eq!(r.index(), 0);
        assert!(!map.is_set(0)); // Not visible until committed
        assert!(map.is_reserved(0));

        assert_eq!(map.commit(r), 0);
        assert!(map.is_set(0));
        assert_eq!(map.allocated_count(), 1);
        assert_eq!(map.reserved_count(), 0);
    }

    #[test]
    fn test_rollback_frees_slot() {
        let mut map = AllocationMap::new(8);

        let r = map.reserve().unwrap();
        map.rollback(r);
        assert_eq!(map.allocated_count(), 0);
        assert_eq!(map.reserved_count(), 0);

        // Same slot comes back
        let r = map.reserve().unwrap();
        assert_eq!(r.index(), 0);
        map.rollback(r);
    }

    #[test]
    fn test_reserved_slot_not_handed_out_twice() {
        let mut map = AllocationMap::new(8);

        let first = map.reserve().unwrap();
        let second = map.reserve().unwrap();
        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);

        map.commit(second);
        map.rollback(first);
        assert_eq!(map.iter_set().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_lowest_free_policy() {
        let mut map = AllocationMap::new(8);
        for _ in 0..3 {
            let r = map.reserve().unwrap();
            map.commit(r);
        }
        assert!(map.release(1));
        assert!(!map.release(1));

        let r = map.reserve().unwrap();
        assert_eq!(r.index(), 1);
        map.commit(r);

        let r = map.reserve().unwrap();
        assert_eq!(r.index(), 3);
        map.rollback(r);
    }

    #[test]
    fn test_exhaustion() {
        let mut map = AllocationMap::new(3);
        for _ in 0..3 {
            let r = map.reserve().unwrap();
            map.commit(r);
        }
        assert_eq!(map.reserve().unwrap_err(), AxError::StorageFull);

        map.release(2);
        assert_eq!(map.reserve().unwrap().index(), 2);
    }

    #[test]
    fn test_capacity_across_words() {
        let mut map = AllocationMap::new(130);
        for expected in 0..130 {
            let r = map.reserve().unwrap();
            assert_eq!(r.index(), expected);
            map.commit(r);
        }
        assert!(map.reserve().is_err());
        assert_eq!(map.allocated_count(), 130);
        assert!(!map.is_set(130));
    }

    #[test]
    fn test_default_capacity() {
        let map = AllocationMap::default();
        assert_eq!(map.capacity(), DEFAULT_SUFFIX_CAPACITY);
        assert_eq!(map.allocated_count(), 0);
    }
}
