//! Per-role encoding of keys and values into slot stores.
//!
//! A [`Table`](crate::Table) is written once against these traits and
//! instantiated with [`Fixed`] for scalar roles or [`Bytes`] for
//! length-bounded byte strings.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::marker::PhantomData;

use crate::error::Error;
use crate::hash;
use crate::slot_store::ByteArena;
use crate::slot_store::FixedSlots;
use crate::slot_store::SlotStore;

/// Largest maximum length a [`Bytes`] codec accepts.
pub const MAX_RECORD_LEN: usize = u16::MAX as usize;

/// Encoding of one role (key or value) of a table.
pub trait Codec: Clone {
    /// Borrowed form handed in by callers and read back out of the store.
    type Item<'a>: Copy + Debug;
    /// Detached form returned once the entry is no longer in the table.
    type Owned;
    /// Bucket storage for this role.
    type Store: SlotStore;

    /// Whether every record has the same size. Tables whose roles are all
    /// fixed-width rehash by pairwise swaps; others by path relocation.
    const FIXED_WIDTH: bool;

    /// Allocates a store addressing `buckets` buckets.
    fn new_store(&self, buckets: usize) -> Result<Self::Store, Error>;

    /// Checks `item` against the codec's limits without writing it.
    fn validate(&self, item: Self::Item<'_>) -> Result<(), Error>;

    /// Writes `item` into bucket `index`.
    fn encode(&self, store: &mut Self::Store, index: usize, item: Self::Item<'_>)
    -> Result<(), Error>;

    /// Reads the item in bucket `index`.
    fn decode<'a>(&self, store: &'a Self::Store, index: usize) -> Self::Item<'a>;

    /// Detaches `item` from the store it was read from.
    fn into_owned(&self, item: Self::Item<'_>) -> Self::Owned;
}

/// A [`Codec`] usable in the key role.
pub trait KeyCodec: Codec {
    /// Key equality.
    fn equals(&self, a: Self::Item<'_>, b: Self::Item<'_>) -> bool;

    /// Full 64-bit hash of `item`.
    fn hash(&self, item: Self::Item<'_>, seed: u64) -> u64;

    /// Bucket `item` maps to before any probing.
    #[inline(always)]
    fn home_bucket(&self, item: Self::Item<'_>, seed: u64, mask: usize) -> usize {
        self.hash(item, seed) as usize & mask
    }
}

/// Fixed-width scalar that can be stored by value.
pub trait Scalar: Copy + Default + Debug + PartialEq + 'static {}

impl Scalar for i32 {}
impl Scalar for i64 {}
impl Scalar for f32 {}
impl Scalar for f64 {}

/// Scalar usable as a key: total equality and an identity hash.
///
/// Floats are values only: `NaN` breaks equality and they have no identity
/// hash.
pub trait IntKey: Scalar + Eq {
    /// Sign-extends the key to 64 bits.
    fn widen(self) -> i64;
}

impl IntKey for i32 {
    #[inline(always)]
    fn widen(self) -> i64 {
        self as i64
    }
}

impl IntKey for i64 {
    #[inline(always)]
    fn widen(self) -> i64 {
        self
    }
}

/// Codec for fixed-width scalars, stored one element per bucket.
pub struct Fixed<T>(PhantomData<T>);

impl<T> Fixed<T> {
    /// Creates the codec.
    pub const fn new() -> Self {
        Fixed(PhantomData)
    }
}

impl<T> Default for Fixed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Fixed<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Fixed<T> {}

impl<T> Debug for Fixed<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Fixed<{}>", core::any::type_name::<T>())
    }
}

impl<T: Scalar> Codec for Fixed<T> {
    type Item<'a> = T;
    type Owned = T;
    type Store = FixedSlots<T>;

    const FIXED_WIDTH: bool = true;

    fn new_store(&self, buckets: usize) -> Result<FixedSlots<T>, Error> {
        FixedSlots::try_new(buckets)
    }

    #[inline(always)]
    fn validate(&self, _item: T) -> Result<(), Error> {
        Ok(())
    }

    #[inline(always)]
    fn encode(&self, store: &mut FixedSlots<T>, index: usize, item: T) -> Result<(), Error> {
        store.write(index, item);
        Ok(())
    }

    #[inline(always)]
    fn decode<'a>(&self, store: &'a FixedSlots<T>, index: usize) -> T {
        store.read(index)
    }

    #[inline(always)]
    fn into_owned(&self, item: T) -> T {
        item
    }
}

impl<T: IntKey> KeyCodec for Fixed<T> {
    #[inline(always)]
    fn equals(&self, a: T, b: T) -> bool {
        a == b
    }

    #[inline(always)]
    fn hash(&self, item: T, _seed: u64) -> u64 {
        hash::identity(item.widen())
    }
}

/// Codec for byte strings of at most `max_len` bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bytes {
    max_len: u16,
}

impl Bytes {
    /// Creates a codec accepting records of up to `max_len` bytes.
    ///
    /// `max_len` must be within `1..=65535`.
    pub fn new(max_len: usize) -> Result<Self, Error> {
        if max_len == 0 || max_len > MAX_RECORD_LEN {
            return Err(Error::InvalidLength(max_len));
        }

        Ok(Self {
            max_len: max_len as u16,
        })
    }

    /// Longest record this codec accepts.
    pub fn max_len(&self) -> usize {
        self.max_len as usize
    }
}

impl Codec for Bytes {
    type Item<'a> = &'a [u8];
    type Owned = Vec<u8>;
    type Store = ByteArena;

    const FIXED_WIDTH: bool = false;

    fn new_store(&self, buckets: usize) -> Result<ByteArena, Error> {
        ByteArena::try_new(buckets, self.max_len())
    }

    fn validate(&self, item: &[u8]) -> Result<(), Error> {
        if item.len() > self.max_len() {
            return Err(Error::ValueTooLong {
                len: item.len(),
                max: self.max_len(),
            });
        }
        Ok(())
    }

    fn encode(&self, store: &mut ByteArena, index: usize, item: &[u8]) -> Result<(), Error> {
        store.write_record(index, item)
    }

    #[inline]
    fn decode<'a>(&self, store: &'a ByteArena, index: usize) -> &'a [u8] {
        store.read_record(index)
    }

    fn into_owned(&self, item: &[u8]) -> Vec<u8> {
        item.to_vec()
    }
}

impl KeyCodec for Bytes {
    #[inline]
    fn equals(&self, a: &[u8], b: &[u8]) -> bool {
        a == b
    }

    #[inline]
    fn hash(&self, item: &[u8], seed: u64) -> u64 {
        hash::hash_bytes(item, seed)
    }
}
