//! Bucket storage for one role (keys or values) of a table.
//!
//! Stores only hold bytes; whether a bucket is live is tracked by the
//! table's occupancy bitset. Slot contents of empty buckets are unspecified.

use alloc::vec::Vec;

use crate::error::Error;

/// Size of the little-endian length prefix in front of every byte record.
pub(crate) const LEN_PREFIX: usize = 2;

/// Storage primitives the rehash engine needs to move records in place.
pub trait SlotStore: Clone {
    /// Holding area for one record, large enough for the longest record the
    /// store accepts.
    type Scratch;

    /// Number of buckets currently addressable.
    fn buckets(&self) -> usize;

    /// Reserves room for `buckets` buckets without changing the addressable
    /// range. On failure the store is unchanged.
    fn try_reserve_buckets(&mut self, buckets: usize) -> Result<(), Error>;

    /// Grows or truncates the addressable range to `buckets`.
    ///
    /// Growing never allocates if `try_reserve_buckets` succeeded for at least
    /// as many buckets. Truncating keeps the capacity.
    fn set_buckets(&mut self, buckets: usize);

    /// Copies the record in `src` over the record in `dst`.
    fn copy_slot(&mut self, src: usize, dst: usize);

    /// Exchanges the records in `a` and `b`.
    fn swap_slots(&mut self, a: usize, b: usize);

    /// Allocates a scratch area for `save`/`restore`.
    fn try_scratch(&self) -> Result<Self::Scratch, Error>;

    /// Copies the record in `index` into `scratch`. Never allocates.
    fn save(&self, index: usize, scratch: &mut Self::Scratch);

    /// Writes the record held in `scratch` into `index`.
    fn restore(&mut self, index: usize, scratch: &Self::Scratch);
}

/// Dense array of fixed-width elements, one per bucket.
#[derive(Clone, Debug)]
pub struct FixedSlots<T> {
    slots: Vec<T>,
}

impl<T: Copy + Default> FixedSlots<T> {
    pub(crate) fn try_new(buckets: usize) -> Result<Self, Error> {
        let mut store = Self { slots: Vec::new() };
        store.try_reserve_buckets(buckets)?;
        store.set_buckets(buckets);
        Ok(store)
    }

    #[inline(always)]
    pub(crate) fn read(&self, index: usize) -> T {
        self.slots[index]
    }

    #[inline(always)]
    pub(crate) fn write(&mut self, index: usize, value: T) {
        self.slots[index] = value;
    }
}

impl<T: Copy + Default> SlotStore for FixedSlots<T> {
    type Scratch = T;

    fn buckets(&self) -> usize {
        self.slots.len()
    }

    fn try_reserve_buckets(&mut self, buckets: usize) -> Result<(), Error> {
        let additional = buckets.saturating_sub(self.slots.len());
        self.slots
            .try_reserve_exact(additional)
            .map_err(|_| Error::AllocationFailure {
                bytes: buckets * core::mem::size_of::<T>(),
            })
    }

    fn set_buckets(&mut self, buckets: usize) {
        if buckets < self.slots.len() {
            self.slots.truncate(buckets);
        } else {
            self.slots.resize(buckets, T::default());
        }
    }

    #[inline(always)]
    fn copy_slot(&mut self, src: usize, dst: usize) {
        self.slots[dst] = self.slots[src];
    }

    #[inline(always)]
    fn swap_slots(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
    }

    fn try_scratch(&self) -> Result<T, Error> {
        Ok(T::default())
    }

    #[inline(always)]
    fn save(&self, index: usize, scratch: &mut T) {
        *scratch = self.slots[index];
    }

    #[inline(always)]
    fn restore(&mut self, index: usize, scratch: &T) {
        self.slots[index] = *scratch;
    }
}

/// Byte arena holding one length-prefixed record per bucket.
///
/// Bucket `i` occupies `stride` bytes starting at `i * stride`: a `u16`
/// length followed by up to `max_len` payload bytes. Offsets never leave this
/// type; callers address records by bucket index.
#[derive(Clone, Debug)]
pub struct ByteArena {
    bytes: Vec<u8>,
    max_len: usize,
    stride: usize,
}

impl ByteArena {
    pub(crate) fn try_new(buckets: usize, max_len: usize) -> Result<Self, Error> {
        debug_assert!(max_len <= u16::MAX as usize);
        let mut arena = Self {
            bytes: Vec::new(),
            max_len,
            stride: max_len + LEN_PREFIX,
        };
        arena.try_reserve_buckets(buckets)?;
        arena.set_buckets(buckets);
        Ok(arena)
    }

    #[inline(always)]
    fn record_len(&self, index: usize) -> usize {
        let at = index * self.stride;
        u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]]) as usize
    }

    /// Returns the payload stored in bucket `index`.
    #[inline]
    pub fn read_record(&self, index: usize) -> &[u8] {
        let start = index * self.stride + LEN_PREFIX;
        &self.bytes[start..start + self.record_len(index)]
    }

    /// Stores `record` in bucket `index`.
    ///
    /// Records longer than the arena's maximum are rejected without touching
    /// the bucket.
    pub fn write_record(&mut self, index: usize, record: &[u8]) -> Result<(), Error> {
        if record.len() > self.max_len {
            return Err(Error::ValueTooLong {
                len: record.len(),
                max: self.max_len,
            });
        }

        let at = index * self.stride;
        self.bytes[at..at + LEN_PREFIX].copy_from_slice(&(record.len() as u16).to_le_bytes());
        self.bytes[at + LEN_PREFIX..at + LEN_PREFIX + record.len()].copy_from_slice(record);
        Ok(())
    }

    /// Longest payload a record may hold.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl SlotStore for ByteArena {
    /// Raw record bytes, length prefix included.
    type Scratch = Vec<u8>;

    fn buckets(&self) -> usize {
        self.bytes.len() / self.stride
    }

    fn try_reserve_buckets(&mut self, buckets: usize) -> Result<(), Error> {
        let bytes = buckets
            .checked_mul(self.stride)
            .ok_or(Error::AllocationFailure { bytes: usize::MAX })?;
        self.bytes
            .try_reserve_exact(bytes.saturating_sub(self.bytes.len()))
            .map_err(|_| Error::AllocationFailure { bytes })
    }

    fn set_buckets(&mut self, buckets: usize) {
        let len = buckets * self.stride;
        if len < self.bytes.len() {
            self.bytes.truncate(len);
        } else {
            self.bytes.resize(len, 0);
        }
    }

    fn copy_slot(&mut self, src: usize, dst: usize) {
        let used = LEN_PREFIX + self.record_len(src);
        let from = src * self.stride;
        self.bytes.copy_within(from..from + used, dst * self.stride);
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }

        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.bytes.split_at_mut(hi * self.stride);
        head[lo * self.stride..(lo + 1) * self.stride].swap_with_slice(&mut tail[..self.stride]);
    }

    fn try_scratch(&self) -> Result<Vec<u8>, Error> {
        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(self.stride)
            .map_err(|_| Error::AllocationFailure { bytes: self.stride })?;
        Ok(scratch)
    }

    fn save(&self, index: usize, scratch: &mut Vec<u8>) {
        let from = index * self.stride;
        scratch.clear();
        scratch.extend_from_slice(&self.bytes[from..from + LEN_PREFIX + self.record_len(index)]);
    }

    fn restore(&mut self, index: usize, scratch: &Vec<u8>) {
        let at = index * self.stride;
        self.bytes[at..at + scratch.len()].copy_from_slice(scratch);
    }
}
