use alloc::vec::Vec;

use crate::error::Error;

/// Number of buckets tracked by a single occupancy word.
pub(crate) const GROUP_WIDTH: usize = 32;

#[inline(always)]
pub(crate) fn group_count(buckets: usize) -> usize {
    buckets.div_ceil(GROUP_WIDTH)
}

/// One bit per bucket. A set bit marks the bucket as empty, so a freshly
/// allocated bitset is all ones.
#[derive(Clone, Debug)]
pub(crate) struct Occupancy {
    words: Vec<u32>,
}

impl Occupancy {
    /// Allocates a bitset for `buckets` buckets, all of them empty.
    pub(crate) fn try_new(buckets: usize) -> Result<Self, Error> {
        let len = group_count(buckets);
        let mut words = Vec::new();
        words
            .try_reserve_exact(len)
            .map_err(|_| Error::AllocationFailure {
                bytes: len * core::mem::size_of::<u32>(),
            })?;
        words.resize(len, u32::MAX);

        Ok(Self { words })
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self, index: usize) -> bool {
        (self.words[index / GROUP_WIDTH] >> (index % GROUP_WIDTH)) & 1 == 1
    }

    #[inline(always)]
    pub(crate) fn set_occupied(&mut self, index: usize) {
        self.words[index / GROUP_WIDTH] &= !(1u32 << (index % GROUP_WIDTH));
    }

    #[inline(always)]
    pub(crate) fn set_empty(&mut self, index: usize) {
        self.words[index / GROUP_WIDTH] |= 1u32 << (index % GROUP_WIDTH);
    }

    /// Shrinks to `buckets` buckets and marks every one of them empty.
    ///
    /// Never allocates; the capacity is kept.
    pub(crate) fn reset(&mut self, buckets: usize) {
        self.words.truncate(group_count(buckets));
        self.words.fill(u32::MAX);
    }

    /// Number of occupied buckets.
    #[cfg(any(test, feature = "stats"))]
    pub(crate) fn occupied(&self) -> usize {
        self.words.iter().map(|w| w.count_zeros() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_bitset_is_all_empty() {
        let bits = Occupancy::try_new(64).unwrap();
        assert_eq!(bits.words.len(), 2);
        assert!((0..64).all(|i| bits.is_empty(i)));
        assert_eq!(bits.occupied(), 0);
    }

    #[test]
    fn set_and_clear_touch_single_bit() {
        let mut bits = Occupancy::try_new(64).unwrap();
        bits.set_occupied(0);
        bits.set_occupied(33);
        bits.set_occupied(63);

        assert!(!bits.is_empty(0));
        assert!(bits.is_empty(1));
        assert!(bits.is_empty(32));
        assert!(!bits.is_empty(33));
        assert!(!bits.is_empty(63));
        assert_eq!(bits.occupied(), 3);

        bits.set_empty(33);
        assert!(bits.is_empty(33));
        assert_eq!(bits.occupied(), 2);
    }

    #[test]
    fn reset_truncates_and_empties() {
        let mut bits = Occupancy::try_new(128).unwrap();
        for i in (0..128).step_by(3) {
            bits.set_occupied(i);
        }

        bits.reset(32);
        assert_eq!(bits.words.len(), 1);
        assert!(bits.words.capacity() >= 4);
        assert_eq!(bits.occupied(), 0);
    }

    #[test]
    fn partial_group_rounds_up() {
        assert_eq!(group_count(1), 1);
        assert_eq!(group_count(32), 1);
        assert_eq!(group_count(33), 2);
    }
}
